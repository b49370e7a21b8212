use serde::{Deserialize, Serialize};

/// A production cost.
///
/// Costs are non-negative figures of merit; lower is better. The all-ones
/// bit pattern is reserved as the "unreachable" sentinel, so additions that
/// would reach it saturate there and stay unreachable.
///
/// Guarantees:
/// - `Cost::INFINITE` is absorbing under `saturating_add`
/// - finite costs order by their numeric value, and every finite cost
///   is strictly less than `Cost::INFINITE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cost(u64);

impl Cost {
    /// The cost of a free production.
    pub const ZERO: Cost = Cost(0);

    /// The "no production exists" sentinel.
    pub const INFINITE: Cost = Cost(u64::MAX);

    /// Wrap a registration-time cost. Registration costs are `u32` so that
    /// summing them along a child tuple cannot overflow the `u64` lattice.
    pub fn new(raw: u32) -> Cost {
        Cost(raw as u64)
    }

    /// The raw value (for display and serialization).
    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_finite(self) -> bool {
        self != Cost::INFINITE
    }

    pub fn is_infinite(self) -> bool {
        self == Cost::INFINITE
    }

    /// Add two costs; infinity is absorbing.
    pub fn saturating_add(self, rhs: Cost) -> Cost {
        if self.is_infinite() || rhs.is_infinite() {
            Cost::INFINITE
        } else {
            Cost(self.0.saturating_add(rhs.0))
        }
    }
}

impl std::fmt::Display for Cost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_costs_order_numerically() {
        assert!(Cost::new(1) < Cost::new(2));
        assert!(Cost::ZERO < Cost::new(1));
    }

    #[test]
    fn every_finite_cost_is_below_infinite() {
        assert!(Cost::new(u32::MAX) < Cost::INFINITE);
        assert!(Cost::ZERO < Cost::INFINITE);
    }

    #[test]
    fn infinite_is_absorbing() {
        assert_eq!(Cost::INFINITE.saturating_add(Cost::ZERO), Cost::INFINITE);
        assert_eq!(Cost::new(3).saturating_add(Cost::INFINITE), Cost::INFINITE);
    }

    #[test]
    fn finite_addition_is_numeric() {
        assert_eq!(Cost::new(2).saturating_add(Cost::new(5)), Cost::new(7));
    }

    #[test]
    fn display_renders_sentinel() {
        assert_eq!(Cost::new(4).to_string(), "4");
        assert_eq!(Cost::INFINITE.to_string(), "inf");
    }
}
