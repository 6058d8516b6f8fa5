//! Test helpers shared by downstream crates (enable the `testing` feature).

pub mod builders {
	use crate::config::{AliveAiConfig, Config, EmotionPoolConfig, PoolConfig};
	use alloy_primitives::Address;
	use std::collections::BTreeMap;

	/// Deterministic address derived from a single byte: `0x0101..01` for 1.
	pub fn addr(byte: u8) -> Address {
		Address::repeat_byte(byte)
	}

	/// Builds a [`Config`] without touching the filesystem or the environment.
	pub struct ConfigBuilder {
		config: Config,
	}

	impl Default for ConfigBuilder {
		fn default() -> Self {
			Self::new()
		}
	}

	impl ConfigBuilder {
		pub fn new() -> Self {
			let config: Config = r#"
[network]
chain_id = 1
rpc_url = "http://localhost:8545"
"#
			.parse()
			.expect("minimal config parses");
			Self { config }
		}

		pub fn with_contracts(mut self, f: impl FnOnce(&mut crate::ContractsConfig)) -> Self {
			f(&mut self.config.contracts);
			self
		}

		pub fn with_pool(mut self, address: Address, token_a: Address, token_b: Address) -> Self {
			self.config.mesh.pools.push(PoolConfig {
				address,
				token_a,
				token_b,
				fee: None,
			});
			self
		}

		pub fn with_max_hops(mut self, max_hops: usize) -> Self {
			self.config.mesh.max_hops = max_hops;
			self
		}

		/// Adds an AliveAI section with tokens `DRTv21..=DRTv36` at addresses
		/// `0x21..`, `0x22..` and pools pairing 21/22, 23/24 and so on.
		pub fn with_alive_ai(mut self) -> Self {
			let mut tokens = BTreeMap::new();
			for n in 21u8..=36 {
				tokens.insert(format!("DRTv{}", n), addr(n));
			}
			let pools = (21u8..=35)
				.step_by(2)
				.map(|n| EmotionPoolConfig {
					pair: [format!("DRTv{}", n), format!("DRTv{}", n + 1)],
					address: addr(n + 100),
				})
				.collect();
			self.config.alive_ai = Some(AliveAiConfig {
				wallet: addr(0xa1),
				contract: addr(0xa2),
				emotional_base: addr(0xa3),
				router: addr(0xa4),
				swap_deadline_secs: 60,
				reflection_history: 10,
				tokens,
				pools,
			});
			self
		}

		pub fn with(mut self, f: impl FnOnce(&mut Config)) -> Self {
			f(&mut self.config);
			self
		}

		pub fn build(self) -> Config {
			self.config
		}
	}
}
