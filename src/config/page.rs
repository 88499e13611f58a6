//! Page size policy and page request resolution.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

const MAX_ROWS: u64 = i64::MAX as u64;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const DEFAULT_PAGE_SIZES: [u64; 4] = [10, 20, 50, 100];

/// Which page sizes a pipeline accepts and what it falls back to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagePolicy {
    pub default_size: u64,
    pub sizes: Vec<u64>,
    /// Accept any positive size, ignoring `sizes`.
    pub allow_any: bool,
}

impl Default for PagePolicy {
    fn default() -> Self {
        PagePolicy {
            default_size: DEFAULT_PAGE_SIZE,
            sizes: DEFAULT_PAGE_SIZES.to_vec(),
            allow_any: false,
        }
    }
}

/// A resolved page: 1-based number and a size that passed the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub number: u64,
    pub size: u64,
}

impl PageRequest {
    /// Rows skipped before this page, capped at `i64::MAX`.
    pub fn offset(&self) -> u64 {
        (self.number - 1).saturating_mul(self.size).min(MAX_ROWS)
    }

    pub fn limit(&self) -> u64 {
        self.size.min(MAX_ROWS)
    }
}

impl PagePolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_size == 0 {
            return Err(ConfigError::PagePolicy("default_size must be positive".into()));
        }
        if self.sizes.iter().any(|s| *s == 0) {
            return Err(ConfigError::PagePolicy("page sizes must be positive".into()));
        }
        if !self.allow_any && self.sizes.is_empty() {
            return Err(ConfigError::PagePolicy(
                "at least one page size is required unless allow_any is set".into(),
            ));
        }
        Ok(())
    }

    pub fn allows(&self, size: u64) -> bool {
        size > 0 && (self.allow_any || self.sizes.contains(&size))
    }

    /// Coerce raw path integers: a non-positive number becomes page 1, and a non-positive or
    /// disallowed size becomes the default size.
    pub fn resolve(&self, number: i64, size: i64) -> PageRequest {
        let number = if number <= 0 { 1 } else { number as u64 };
        let size = match u64::try_from(size) {
            Ok(s) if self.allows(s) => s,
            _ => self.default_size,
        };
        PageRequest { number, size }
    }
}
