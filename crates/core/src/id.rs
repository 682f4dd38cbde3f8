//! Strongly-typed identifiers used across the domain.
//!
//! Identifiers are storage-assigned positive integers. Zero is never a valid
//! identity and is rejected at parse time.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a sales transaction header.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(i64);

/// Identifier of a single line item within a transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionItemId(i64);

/// Identifier of a product owned by the catalog service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

macro_rules! impl_serial_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw storage identifier without validation.
            ///
            /// Use `try_new` (or `FromStr`) for values coming from outside.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Validate and wrap a raw identifier (must be positive).
            pub fn try_new(raw: i64) -> Result<Self, DomainError> {
                if raw <= 0 {
                    return Err(DomainError::invalid_id(format!(
                        "{} must be positive, got {}",
                        $name, raw
                    )));
                }
                Ok(Self(raw))
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = i64::from_str(s.trim())
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Self::try_new(raw)
            }
        }
    };
}

impl_serial_newtype!(TransactionId, "TransactionId");
impl_serial_newtype!(TransactionItemId, "TransactionItemId");
impl_serial_newtype!(ProductId, "ProductId");
