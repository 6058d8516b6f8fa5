//! Text extraction from uploaded proof images.

use crate::IntegrationError;
use async_trait::async_trait;
use drt_types::ResourceConfig;
use std::path::Path;
use tokio::process::Command;

/// Extracts the text content of an image or document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
	async fn extract_text(&self, path: &Path) -> Result<String, IntegrationError>;
}

/// Runs the `tesseract` binary: `tesseract <file> stdout -l <lang>`.
pub struct TesseractOcr {
	command: String,
	language: String,
}

impl TesseractOcr {
	pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			language: language.into(),
		}
	}

	pub fn from_config(config: &ResourceConfig) -> Self {
		Self::new(config.ocr_command.clone(), config.ocr_language.clone())
	}
}

#[async_trait]
impl TextExtractor for TesseractOcr {
	async fn extract_text(&self, path: &Path) -> Result<String, IntegrationError> {
		let output = Command::new(&self.command)
			.arg(path)
			.arg("stdout")
			.arg("-l")
			.arg(&self.language)
			.output()
			.await
			.map_err(|e| IntegrationError::Ocr(format!("Failed to run {}: {}", self.command, e)))?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(IntegrationError::Ocr(format!(
				"{} exited with {}: {}",
				self.command,
				output.status,
				stderr.trim()
			)));
		}

		let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
		tracing::debug!(file = %path.display(), chars = text.len(), "Extracted text");
		Ok(text)
	}
}
