//! Durations measured in milliseconds, schedulable in whole ticks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A span of time.
///
/// The host only advances in ticks, so anything scheduled with a timespan is
/// rounded to the nearest tick.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timespan {
    millis: u64,
}

const UNITS: [(&str, u64); 4] = [
    ("day", 86_400_000),
    ("hour", 3_600_000),
    ("minute", 60_000),
    ("second", 1_000),
];

impl Timespan {
    /// Length of one host tick.
    pub const MILLIS_PER_TICK: u64 = 50;

    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    #[must_use]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self {
            millis: ticks * Self::MILLIS_PER_TICK,
        }
    }

    #[must_use]
    pub const fn from_seconds(seconds: u64) -> Self {
        Self {
            millis: seconds * 1_000,
        }
    }

    #[must_use]
    pub const fn millis(self) -> u64 {
        self.millis
    }

    /// Whole ticks, rounded to nearest.
    #[must_use]
    pub const fn ticks(self) -> u64 {
        (self.millis + Self::MILLIS_PER_TICK / 2) / Self::MILLIS_PER_TICK
    }

    /// Parse `"5 ticks"`, `"a second"`, `"1.5 minutes"` or
    /// `"2 minutes and 30 seconds"`.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let lower = input.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }

        let mut total = 0.0_f64;
        for part in lower.split([',']).flat_map(|p| p.split(" and ")) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (amount, unit) = part.split_once(' ')?;
            let amount = match amount {
                "a" | "an" | "one" => 1.0,
                n => n.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)?,
            };
            total += amount * unit_millis(unit.trim())? as f64;
        }

        Some(Self::from_millis(total.round() as u64))
    }
}

fn unit_millis(unit: &str) -> Option<u64> {
    let unit = unit.strip_prefix("minecraft ").unwrap_or(unit);
    let singular = unit.strip_suffix('s').unwrap_or(unit);
    match singular {
        "tick" => Some(Timespan::MILLIS_PER_TICK),
        "millisecond" => Some(1),
        _ => UNITS
            .iter()
            .find(|(name, _)| *name == singular)
            .map(|(_, millis)| *millis),
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, size) in UNITS {
            if self.millis >= size && self.millis % size == 0 {
                return f.write_str(&plural(self.millis / size, name));
            }
        }
        if self.millis % Self::MILLIS_PER_TICK == 0 {
            return f.write_str(&plural(self.millis / Self::MILLIS_PER_TICK, "tick"));
        }
        f.write_str(&plural(self.millis, "millisecond"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_round_to_nearest() {
        assert_eq!(Timespan::from_millis(0).ticks(), 0);
        assert_eq!(Timespan::from_millis(24).ticks(), 0);
        assert_eq!(Timespan::from_millis(25).ticks(), 1);
        assert_eq!(Timespan::from_millis(1_000).ticks(), 20);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Timespan::parse("a tick"), Some(Timespan::from_ticks(1)));
        assert_eq!(Timespan::parse("5 ticks"), Some(Timespan::from_ticks(5)));
        assert_eq!(
            Timespan::parse("2 minutes and 30 seconds"),
            Some(Timespan::from_seconds(150))
        );
        assert_eq!(
            Timespan::parse("1.5 seconds"),
            Some(Timespan::from_millis(1_500))
        );
        assert_eq!(Timespan::parse("three ticks"), None);
        assert_eq!(Timespan::parse("5 parsecs"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Timespan::from_ticks(1).to_string(), "1 tick");
        assert_eq!(Timespan::from_ticks(3).to_string(), "3 ticks");
        assert_eq!(Timespan::from_seconds(120).to_string(), "2 minutes");
        assert_eq!(Timespan::from_millis(10).to_string(), "10 milliseconds");
    }
}
