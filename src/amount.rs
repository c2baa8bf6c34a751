//! Exact integer arithmetic for charge amounts.
//!
//! Amounts are unsigned base units. All arithmetic the engine performs is
//! exact integer math: checked addition/subtraction and the floor-division
//! commission split. Subscription-grade amounts are nonzero multiples of 100
//! base units, which makes the 99/100 split close exactly with no residue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Commission denominator: one part in 100 of every charge routes to the
/// administrator.
pub const COMMISSION_DIVISOR: u64 = 100;

/// A quantity of an asset in base units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_base_units(units: u64) -> Self {
        Self(units)
    }

    pub const fn as_base_units(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Whether this amount is valid as a per-period charge: nonzero and a
    /// multiple of 100 base units.
    pub const fn is_subscription_grade(self) -> bool {
        self.0 > 0 && self.0 % COMMISSION_DIVISOR == 0
    }

    /// Split a gross charge into `(net, fee)` where `fee = amount / 100` and
    /// `net = amount - fee`. For subscription-grade amounts the two legs sum
    /// back to the gross amount exactly.
    pub const fn commission_split(self) -> (Amount, Amount) {
        let fee = self.0 / COMMISSION_DIVISOR;
        (Amount(self.0 - fee), Amount(fee))
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_exact_for_multiples_of_100() {
        let gross = Amount::from_base_units(200);
        let (net, fee) = gross.commission_split();
        assert_eq!(net.as_base_units(), 198);
        assert_eq!(fee.as_base_units(), 2);
        assert_eq!(net.checked_add(fee), Some(gross));
    }

    #[test]
    fn subscription_grade_requires_nonzero_multiple_of_100() {
        assert!(Amount::from_base_units(100).is_subscription_grade());
        assert!(Amount::from_base_units(100_000_000).is_subscription_grade());
        assert!(!Amount::ZERO.is_subscription_grade());
        assert!(!Amount::from_base_units(150).is_subscription_grade());
        assert!(!Amount::from_base_units(99).is_subscription_grade());
    }

    #[test]
    fn checked_math_catches_overflow_and_underflow() {
        let max = Amount::from_base_units(u64::MAX);
        assert_eq!(max.checked_add(Amount::from_base_units(1)), None);
        assert_eq!(Amount::ZERO.checked_sub(Amount::from_base_units(1)), None);
        assert_eq!(
            Amount::from_base_units(5).checked_sub(Amount::from_base_units(5)),
            Some(Amount::ZERO)
        );
    }

    #[test]
    fn serializes_as_bare_integer() {
        let amount = Amount::from_base_units(86400);
        assert_eq!(serde_json::to_string(&amount).unwrap(), "86400");
    }
}
