//! Fixed-point monetary amount backed by rust_decimal.
//!
//! All fund balances and commission values are carried as `Amount` and
//! quantized to 8 decimal places before persistence.

use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of decimal places carried by persisted monetary values.
pub const MONEY_SCALE: u32 = 8;

/// Lossless monetary amount for compensation arithmetic.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to JSON number (not string) by default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Amount {
    /// Create an Amount from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Amount(value)
    }

    /// Parse an Amount from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Amount)
    }

    /// Format the Amount as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Amount(RustDecimal::ZERO)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Truncate toward zero at the money scale (8 dp).
    ///
    /// Fan-out shares are truncated so the residual is never negative; the
    /// distributor adds the residual to the final level's share.
    pub fn truncate_money(&self) -> Self {
        Amount(
            self.0
                .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero),
        )
    }

    /// `pct` percent of this amount, truncated to the money scale.
    pub fn percent(&self, pct: u32) -> Self {
        let share = self.0 * RustDecimal::from(pct) / RustDecimal::ONE_HUNDRED;
        Amount(share).truncate_money()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Amount {
    fn from(value: RustDecimal) -> Self {
        Amount(value)
    }
}

impl From<Amount> for RustDecimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Amount {
    type Output = Amount;

    fn mul(self, rhs: Amount) -> Amount {
        Amount(self.0 * rhs.0)
    }
}

impl std::ops::Div for Amount {
    type Output = Amount;

    fn div(self, rhs: Amount) -> Amount {
        Amount(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}
