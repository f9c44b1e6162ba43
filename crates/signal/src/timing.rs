use std::time::Duration;

use thiserror::Error;

/// Thresholds and hold durations for the signal cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignalTiming {
    /// Minimum vehicle count that turns red into green.
    pub green_threshold: usize,
    /// Minimum vehicle count that turns red into yellow.
    pub yellow_threshold: usize,
    /// Hold applied whenever the signal lands on red.
    pub red_hold: Duration,
    pub green_hold: Duration,
    /// Hold for yellow entered straight from red (moderate traffic).
    pub yellow_after_red_hold: Duration,
    /// Hold for yellow entered from green.
    pub yellow_after_green_hold: Duration,
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            green_threshold: 10,
            yellow_threshold: 5,
            red_hold: Duration::from_secs(15),
            green_hold: Duration::from_secs(15),
            yellow_after_red_hold: Duration::from_secs(10),
            yellow_after_green_hold: Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimingError {
    #[error("yellow threshold {yellow} exceeds green threshold {green}")]
    ThresholdOrder { yellow: usize, green: usize },
    #[error("{0} hold must be longer than zero")]
    ZeroHold(&'static str),
}

impl SignalTiming {
    pub fn validate(&self) -> Result<(), TimingError> {
        if self.yellow_threshold > self.green_threshold {
            return Err(TimingError::ThresholdOrder {
                yellow: self.yellow_threshold,
                green: self.green_threshold,
            });
        }
        for (name, hold) in [
            ("red", self.red_hold),
            ("green", self.green_hold),
            ("yellow-after-red", self.yellow_after_red_hold),
            ("yellow-after-green", self.yellow_after_green_hold),
        ] {
            if hold.is_zero() {
                return Err(TimingError::ZeroHold(name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SignalTiming::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let timing = SignalTiming {
            yellow_threshold: 12,
            ..SignalTiming::default()
        };
        assert_eq!(
            timing.validate(),
            Err(TimingError::ThresholdOrder {
                yellow: 12,
                green: 10
            })
        );
    }

    #[test]
    fn rejects_zero_hold() {
        let timing = SignalTiming {
            yellow_after_green_hold: Duration::ZERO,
            ..SignalTiming::default()
        };
        assert_eq!(
            timing.validate(),
            Err(TimingError::ZeroHold("yellow-after-green"))
        );
    }
}
