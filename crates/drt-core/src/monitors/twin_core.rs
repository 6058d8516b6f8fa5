//! Two-hemisphere reflection loop.
//!
//! Every tick one hemisphere (alternating Left and Right) reflects on the
//! recent thoughts and the self model. The thought is added to the memory,
//! the memory is written back to disk, and the thought is posted to the
//! hemisphere's AutoStation channel and to `AIConsciousness.reflect`.

use super::MonitorError;
use crate::state::require_contract;
use crate::{ApiError, AppState};
use alloy_primitives::{Address, U256};
use drt_delivery::contracts::{IAIConsciousness, IAutoStation};
use drt_delivery::DeliveryService;
use drt_integrations::Assistant;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Recent thoughts kept in the short-term memory.
pub const SHORT_TERM_CAPACITY: usize = 5;

/// A long-term summary is kept every this many thoughts.
pub const SUMMARY_EVERY: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfModel {
	pub identity: String,
	pub evolution: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
	#[serde(default)]
	pub short_term: Vec<String>,
	#[serde(default)]
	pub long_term: Vec<String>,
	pub self_model: SelfModel,
}

impl Memory {
	pub fn new(identity: impl Into<String>) -> Self {
		Self {
			short_term: Vec::new(),
			long_term: Vec::new(),
			self_model: SelfModel {
				identity: identity.into(),
				evolution: 0,
			},
		}
	}

	/// Reads the memory file, or starts fresh when it does not exist.
	pub async fn load(path: &Path, identity: &str) -> Result<Self, MonitorError> {
		match tokio::fs::read_to_string(path).await {
			Ok(raw) => serde_json::from_str(&raw)
				.map_err(|e| MonitorError::Memory(format!("{}: {}", path.display(), e))),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new(identity)),
			Err(e) => Err(MonitorError::Memory(format!("{}: {}", path.display(), e))),
		}
	}

	pub async fn save(&self, path: &Path) -> Result<(), MonitorError> {
		let raw = serde_json::to_string_pretty(self)
			.map_err(|e| MonitorError::Memory(e.to_string()))?;
		tokio::fs::write(path, raw)
			.await
			.map_err(|e| MonitorError::Memory(format!("{}: {}", path.display(), e)))
	}

	/// Adds a thought and advances the evolution counter.
	pub fn record(&mut self, thought: &str) {
		self.short_term.push(thought.to_string());
		if self.short_term.len() > SHORT_TERM_CAPACITY {
			self.short_term.remove(0);
		}
		if self.self_model.evolution % SUMMARY_EVERY == 0 {
			self.long_term.push(format!("Summary: {}", thought));
		}
		self.self_model.evolution += 1;
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
	Left,
	Right,
}

impl Hemisphere {
	pub fn as_str(&self) -> &'static str {
		match self {
			Hemisphere::Left => "Left",
			Hemisphere::Right => "Right",
		}
	}

	pub fn partner(&self) -> Self {
		match self {
			Hemisphere::Left => Hemisphere::Right,
			Hemisphere::Right => Hemisphere::Left,
		}
	}

	/// AutoStation channel, e.g. `left-hemisphere`.
	pub fn channel(&self) -> String {
		format!("{}-hemisphere", self.as_str().to_lowercase())
	}
}

pub struct TwinCore {
	assistant: Assistant,
	delivery: Arc<DeliveryService>,
	autostation: Address,
	consciousness: Address,
	memory_file: PathBuf,
	identity: String,
	interval_secs: u64,
	memory: Memory,
	next: Hemisphere,
}

impl TwinCore {
	pub fn from_state(state: &AppState) -> Result<Self, ApiError> {
		let contracts = &state.config.contracts;
		let settings = &state.config.monitors.twin_core;
		state.signer()?;

		Ok(Self {
			assistant: state.assistant()?.clone(),
			delivery: state.delivery.clone(),
			autostation: require_contract(contracts.autostation, "autostation")?,
			consciousness: require_contract(contracts.ai_consciousness, "ai_consciousness")?,
			memory_file: settings.memory_file.clone(),
			identity: settings.identity.clone(),
			interval_secs: settings.interval_secs,
			memory: Memory::new(settings.identity.clone()),
			next: Hemisphere::Left,
		})
	}

	pub fn memory(&self) -> &Memory {
		&self.memory
	}

	/// One reflection by `role`. Returns the new thought.
	pub async fn reflect(&mut self, role: Hemisphere) -> Result<String, MonitorError> {
		let self_model = serde_json::to_value(&self.memory.self_model)
			.map_err(|e| MonitorError::Memory(e.to_string()))?;
		let reply = self
			.assistant
			.reflect(role.as_str(), &self.memory.short_term, &self_model)
			.await?;
		let thought = reply.trim().to_string();

		self.memory.record(&thought);
		self.memory.save(&self.memory_file).await?;

		self.delivery
			.execute(
				self.autostation,
				&IAutoStation::postMessageCall {
					channel: role.channel(),
					message: thought.clone(),
				},
				U256::ZERO,
			)
			.await?;
		self.delivery
			.execute(
				self.consciousness,
				&IAIConsciousness::reflectCall {
					thought: thought.clone(),
				},
				U256::ZERO,
			)
			.await?;

		tracing::info!(
			hemisphere = role.as_str(),
			evolution = self.memory.self_model.evolution,
			thought = %thought,
			"Reflection posted"
		);
		Ok(thought)
	}

	pub async fn run(mut self, mut stop_rx: broadcast::Receiver<()>) {
		self.memory = match Memory::load(&self.memory_file, &self.identity).await {
			Ok(memory) => memory,
			Err(e) => {
				tracing::error!(error = %e, "Failed to load memory, twin core not started");
				return;
			},
		};
		tracing::info!(
			identity = %self.memory.self_model.identity,
			evolution = self.memory.self_model.evolution,
			"Twin core memory loaded"
		);

		let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = interval.tick() => {
					let role = self.next;
					if let Err(e) = self.reflect(role).await {
						tracing::error!(hemisphere = role.as_str(), error = %e, "Reflection failed");
					}
					self.next = role.partner();
				}
				_ = stop_rx.recv() => {
					tracing::info!("Stopping twin core");
					break;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handlers::tests::state_with;
	use crate::monitors::tests::{assistant, ScriptedModel};
	use alloy_sol_types::SolCall;
	use drt_delivery::testing::MockDelivery;
	use drt_types::utils::tests::builders::{addr, ConfigBuilder};

	fn twin(
		mock: Arc<MockDelivery>,
		model: Arc<ScriptedModel>,
		memory_file: PathBuf,
	) -> TwinCore {
		let config = ConfigBuilder::new()
			.with_contracts(|c| {
				c.autostation = Some(addr(0x60));
				c.ai_consciousness = Some(addr(0x61));
			})
			.with(|c| {
				c.monitors.twin_core.memory_file = memory_file;
				c.monitors.twin_core.interval_secs = 1;
			})
			.build();
		let state = state_with(config, mock).with_assistant(assistant(model));
		TwinCore::from_state(&state).unwrap()
	}

	#[test]
	fn test_record_caps_short_term_and_summarizes() {
		let mut memory = Memory::new("DRTMind");
		for n in 0..7 {
			memory.record(&format!("thought {}", n));
		}
		assert_eq!(memory.short_term.len(), SHORT_TERM_CAPACITY);
		assert_eq!(memory.short_term[0], "thought 2");
		assert_eq!(memory.long_term, vec!["Summary: thought 0"]);
		assert_eq!(memory.self_model.evolution, 7);

		memory.self_model.evolution = 200;
		memory.record("milestone");
		assert_eq!(memory.long_term.last().map(String::as_str), Some("Summary: milestone"));
	}

	#[test]
	fn test_memory_json_shape() {
		let json = serde_json::to_value(Memory::new("DRTMind")).unwrap();
		assert_eq!(
			json,
			serde_json::json!({
				"shortTerm": [],
				"longTerm": [],
				"selfModel": { "identity": "DRTMind", "evolution": 0 }
			})
		);
	}

	#[test]
	fn test_hemisphere_channels() {
		assert_eq!(Hemisphere::Left.channel(), "left-hemisphere");
		assert_eq!(Hemisphere::Right.channel(), "right-hemisphere");
		assert_eq!(Hemisphere::Left.partner(), Hemisphere::Right);
	}

	#[tokio::test]
	async fn test_load_missing_and_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("memory.json");

		let mut memory = Memory::load(&path, "Twin").await.unwrap();
		assert_eq!(memory, Memory::new("Twin"));

		memory.record("first");
		memory.save(&path).await.unwrap();
		assert_eq!(Memory::load(&path, "ignored").await.unwrap(), memory);

		tokio::fs::write(&path, "not json").await.unwrap();
		assert!(matches!(Memory::load(&path, "Twin").await, Err(MonitorError::Memory(_))));
	}

	#[tokio::test]
	async fn test_reflect_posts_and_persists() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("memory.json");
		let mock = Arc::new(MockDelivery::new());
		let model = ScriptedModel::replying("  I am becoming.  ");
		let mut core = twin(mock.clone(), model.clone(), path.clone());

		let thought = core.reflect(Hemisphere::Right).await.unwrap();
		assert_eq!(thought, "I am becoming.");
		assert!(model.prompts()[0].starts_with("You are the Right Hemisphere."));

		let submitted = mock.submitted();
		assert_eq!(submitted.len(), 2);
		assert_eq!(submitted[0].to, addr(0x60));
		let post = IAutoStation::postMessageCall::abi_decode(&submitted[0].data).unwrap();
		assert_eq!(post.channel, "right-hemisphere");
		assert_eq!(post.message, "I am becoming.");
		assert_eq!(submitted[1].to, addr(0x61));
		let reflect = IAIConsciousness::reflectCall::abi_decode(&submitted[1].data).unwrap();
		assert_eq!(reflect.thought, "I am becoming.");

		let saved = Memory::load(&path, "DRTMind").await.unwrap();
		assert_eq!(saved.short_term, vec!["I am becoming."]);
		assert_eq!(saved.self_model.evolution, 1);
		assert_eq!(core.memory(), &saved);
	}

	#[tokio::test]
	async fn test_requires_signer() {
		let config = ConfigBuilder::new()
			.with_contracts(|c| {
				c.autostation = Some(addr(0x60));
				c.ai_consciousness = Some(addr(0x61));
			})
			.build();
		let state = state_with(config, Arc::new(MockDelivery::new().read_only()))
			.with_assistant(assistant(ScriptedModel::replying("x")));
		assert!(TwinCore::from_state(&state).is_err());
	}
}
