//! Money type
//!
//! Domain primitive for ledger amounts. Amounts travel through commands and
//! events as integer minor units (cents) and are only turned into decimals
//! for display.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places carried by the minor unit.
const MINOR_UNIT_SCALE: u32 = 2;

/// Money represents a signed amount in minor units.
///
/// Balances may legitimately go negative (overdrawn checking accounts), so
/// unlike a transfer amount this type performs no sign validation.
///
/// # Example
/// ```
/// use wallet_ledger::domain::Money;
///
/// let balance = Money::from_cents(1234);
/// assert_eq!(balance.to_string(), "12.34");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Create from minor units.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Zero balance.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Underlying minor units.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Decimal view (two decimal places).
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, MINOR_UNIT_SCALE)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// Add without wrapping; `None` when the sum leaves the `i64` range.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_neg(&self) -> Option<Money> {
        self.0.checked_neg().map(Money)
    }

    /// Clamping add, for folding history that was validated when written.
    pub fn saturating_add(&self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_decimal())
    }
}

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

/// Direction of a ledger movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementAction {
    Credit,
    Debit,
}

impl MovementAction {
    /// Signed effect of `amount` on a running balance.
    ///
    /// `None` only for a debit of `i64::MIN` cents, which has no negation.
    pub fn signed(&self, amount: Money) -> Option<Money> {
        match self {
            MovementAction::Credit => Some(amount),
            MovementAction::Debit => amount.checked_neg(),
        }
    }
}

impl fmt::Display for MovementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementAction::Credit => write!(f, "credit"),
            MovementAction::Debit => write!(f, "debit"),
        }
    }
}
