//! Conversion between human-readable token amounts and base units.

use alloy_primitives::utils::{format_units, parse_units};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Decimals used by DRTv1, DRTv2, sETH and ETH itself.
pub const TOKEN_DECIMALS: u8 = 18;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
	#[error("Amount is empty")]
	Empty,
	#[error("Amount cannot be negative: {0}")]
	Negative(String),
	#[error("Invalid amount {0}: {1}")]
	Invalid(String, String),
	#[error("Amount {0} has more than {1} decimals")]
	TooManyDecimals(String, u8),
}

/// Parses a decimal string such as `"1.5"` into base units.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, UnitsError> {
	let trimmed = amount.trim();
	if trimmed.is_empty() {
		return Err(UnitsError::Empty);
	}
	if trimmed.starts_with('-') {
		return Err(UnitsError::Negative(trimmed.to_string()));
	}
	if let Some((_, fraction)) = trimmed.split_once('.') {
		if fraction.len() > usize::from(decimals) {
			return Err(UnitsError::TooManyDecimals(trimmed.to_string(), decimals));
		}
	}
	let parsed = parse_units(trimmed, decimals)
		.map_err(|e| UnitsError::Invalid(trimmed.to_string(), e.to_string()))?;
	Ok(parsed.get_absolute())
}

/// Parses an integer string of base units, e.g. a wei amount.
pub fn parse_base_units(amount: &str) -> Result<U256, UnitsError> {
	let trimmed = amount.trim();
	if trimmed.is_empty() {
		return Err(UnitsError::Empty);
	}
	if trimmed.starts_with('-') {
		return Err(UnitsError::Negative(trimmed.to_string()));
	}
	trimmed
		.parse::<U256>()
		.map_err(|e| UnitsError::Invalid(trimmed.to_string(), e.to_string()))
}

/// Formats base units as a decimal string, e.g. `1500000000000000000` → `"1.5"`.
pub fn format_amount(amount: U256, decimals: u8) -> String {
	match format_units(amount, decimals) {
		Ok(s) => trim_fraction(s),
		Err(_) => amount.to_string(),
	}
}

fn trim_fraction(s: String) -> String {
	if !s.contains('.') {
		return s;
	}
	let trimmed = s.trim_end_matches('0').trim_end_matches('.');
	if trimmed.is_empty() {
		"0".to_string()
	} else {
		trimmed.to_string()
	}
}

/// An amount in a request body. Clients send either `"1.5"` or `1.5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
	Text(String),
	Number(serde_json::Number),
}

impl AmountInput {
	pub fn to_units(&self, decimals: u8) -> Result<U256, UnitsError> {
		parse_amount(&self.to_string(), decimals)
	}

	pub fn to_base_units(&self) -> Result<U256, UnitsError> {
		parse_base_units(&self.to_string())
	}
}

impl fmt::Display for AmountInput {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AmountInput::Text(s) => f.write_str(s.trim()),
			AmountInput::Number(n) => write!(f, "{}", n),
		}
	}
}

impl From<&str> for AmountInput {
	fn from(value: &str) -> Self {
		AmountInput::Text(value.to_string())
	}
}
