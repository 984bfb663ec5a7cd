use ordered_float::NotNan;
use serde::Deserialize;

/// A non-NaN f64 value in the range [0, 100].
#[derive(Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "f64")]
pub struct Percentage(NotNan<f64>);

impl Percentage {
    pub const ZERO: Self = Self(unsafe { NotNan::new_unchecked(0.0) });
    pub const HUNDRED: Self = Self(unsafe { NotNan::new_unchecked(100.0) });

    pub fn new(value: f64) -> Option<Self> {
        let value = NotNan::new(value).ok()?;
        if value.is_sign_negative() || *value > 100.0 {
            return None;
        }
        Some(Self(value))
    }

    pub fn as_f64(&self) -> f64 {
        self.0.into_inner()
    }
}

impl TryFrom<f64> for Percentage {
    type Error = String;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("expected a percentage in [0, 100], got {value}"))
    }
}

impl std::cmp::PartialOrd for Percentage {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.0.cmp(&other.0))
    }
}

impl std::cmp::Ord for Percentage {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl std::fmt::Debug for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// A positive non-NaN f64 value
#[derive(Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "f64")]
pub struct Weight(NotNan<f64>);

impl Weight {
    pub const ZERO: Self = Self(unsafe { NotNan::new_unchecked(0.0) });
    pub const ONE: Self = Self(unsafe { NotNan::new_unchecked(1.0) });

    pub fn new(value: f64) -> Option<Self> {
        let value = NotNan::new(value).ok()?;
        if value.is_sign_negative() || value.is_infinite() {
            return None;
        }
        Some(Self(value))
    }

    pub fn as_inner(&self) -> NotNan<f64> {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0.into_inner()
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }
}

impl Default for Weight {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<f64> for Weight {
    type Error = String;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
            .ok_or_else(|| format!("expected a finite non-negative number, got {value}"))
    }
}

impl std::iter::Sum for Weight {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.into_iter().map(|w| w.0).sum())
    }
}

impl std::fmt::Debug for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the value only when it is a usable measurement. RUM telemetry reports gaps as NaN
/// or infinities just as often as it omits the value.
pub fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
#[track_caller]
pub fn assert_within(value: f64, expected: f64, tolerance: f64) {
    let diff = (value - expected).abs();
    assert!(
        diff <= tolerance,
        "Expected value of {expected} +- {tolerance} but got {value} which is off by {diff}",
    );
}

#[cfg(test)]
mod test {
    use super::{Percentage, Weight};

    #[test]
    fn percentage_limits() {
        assert!(Percentage::new(-0.1).is_none());
        assert!(Percentage::new(100.1).is_none());
        assert!(Percentage::new(f64::NAN).is_none());
        assert_eq!(Percentage::new(0.0), Some(Percentage::ZERO));
        assert_eq!(Percentage::new(100.0), Some(Percentage::HUNDRED));
    }

    #[test]
    fn weight_limits() {
        assert!(Weight::new(-1.0).is_none());
        assert!(Weight::new(f64::NAN).is_none());
        assert!(Weight::new(f64::INFINITY).is_none());
        assert!(Weight::new(0.0).unwrap().is_zero());
        let total: Weight = [50.0, 30.0, 20.0]
            .into_iter()
            .map(|w| Weight::new(w).unwrap())
            .sum();
        assert_eq!(total.as_f64(), 100.0);
    }

    #[test]
    fn deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Percentage>("101").is_err());
        assert!(serde_json::from_str::<Weight>("-3").is_err());
        assert_eq!(serde_json::from_str::<Weight>("2.5").unwrap().as_f64(), 2.5);
    }
}
