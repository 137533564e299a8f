//! Device identity asserted by login frames

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{GatewayError, Result};

/// IMEI-like numeric identifier of a tracking device.
///
/// The login frame carries it as 8 bytes of packed BCD (`01 23 45 67 89 01 23 45`
/// for IMEI `123456789012345`). The leading zero nibble is padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentity(u64);

impl DeviceIdentity {
    /// Create an identity from its numeric value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Decode packed BCD digits, rejecting any nibble above 9.
    pub fn from_bcd(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > 9 {
            return Err(GatewayError::invalid_field(
                "device identity",
                format!("{} BCD bytes overflow a 64-bit identifier", bytes.len()),
            ));
        }

        let mut value = 0u64;
        for (index, byte) in bytes.iter().enumerate() {
            for nibble in [byte >> 4, byte & 0x0F] {
                if nibble > 9 {
                    return Err(GatewayError::invalid_field(
                        "device identity",
                        format!("byte {} ({:#04x}) is not a decimal digit pair", index, byte),
                    ));
                }
                value = value * 10 + u64::from(nibble);
            }
        }

        Ok(Self(value))
    }

    /// Get the numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_padded_imei() {
        let identity =
            DeviceIdentity::from_bcd(&[0x01, 0x23, 0x45, 0x67, 0x89, 0x01, 0x23, 0x45]).unwrap();
        assert_eq!(identity.value(), 123_456_789_012_345);
        assert_eq!(identity.to_string(), "123456789012345");
    }

    #[test]
    fn rejects_hex_nibbles() {
        let err = DeviceIdentity::from_bcd(&[0x01, 0x2A, 0x45, 0x67, 0x89, 0x01, 0x23, 0x45])
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidField { .. }));
    }

    #[test]
    fn all_zero_is_zero() {
        assert_eq!(DeviceIdentity::from_bcd(&[0; 8]).unwrap(), DeviceIdentity::new(0));
    }
}
