use crate::error::LedgerError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// A signed monetary amount in minor currency units (kopecks/cents).
///
/// The ledger never touches floating point or fractional values; any
/// user-facing decimal amount is converted at the boundary via
/// [`MinorAmount::from_major_str`] and rendered back via `Display`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct MinorAmount(pub i64);

impl MinorAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(minor: i64) -> Self {
        Self(minor)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// True for negative amounts (a debit against a balance).
    pub fn is_debit(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Converts a major-unit decimal (e.g. "150.00") into minor units by
    /// multiplying by 100 and truncating any sub-minor precision.
    pub fn from_decimal(major: Decimal) -> Result<Self, LedgerError> {
        let minor = (major * Decimal::ONE_HUNDRED).trunc();
        minor
            .to_i64()
            .map(Self)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("{major} out of range")))
    }

    /// Parses a user-supplied major-unit string such as "12.50".
    pub fn from_major_str(s: &str) -> Result<Self, LedgerError> {
        let major = Decimal::from_str(s.trim())
            .map_err(|e| LedgerError::InvalidAmount(format!("{s:?}: {e}")))?;
        Self::from_decimal(major)
    }
}

impl Add for MinorAmount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for MinorAmount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for MinorAmount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for MinorAmount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for MinorAmount {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl fmt::Display for MinorAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
