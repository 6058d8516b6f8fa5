//! Small helpers shared across crates.

use alloy_primitives::Address;
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(any(test, feature = "testing"))]
pub mod tests;

/// Seconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

/// Shortens a long identifier for log fields: `0x1234…cdef`.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 12 || !id.is_ascii() {
		return id.to_string();
	}
	format!("{}…{}", &id[..6], &id[id.len() - 4..])
}

/// Lowercase `0x`-prefixed hex form of an address.
pub fn format_address(address: &Address) -> String {
	format!("0x{}", alloy_primitives::hex::encode(address.as_slice()))
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("0xabcdef"), "0xabcdef");
		assert_eq!(
			truncate_id("0x1234567890abcdef1234567890abcdef"),
			"0x1234…cdef"
		);
	}
}
