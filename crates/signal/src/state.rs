use std::time::{Duration, Instant};

use crate::{SignalColor, SignalTiming};

/// Color change reported by [`SignalState::advance`].
///
/// `from == to` is possible: a red hold that expires with light traffic stays
/// red but restarts its timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: SignalColor,
    pub to: SignalColor,
    pub hold: Duration,
}

/// Look up the color and hold that follow `current` once its hold expires.
pub fn next_color(
    current: SignalColor,
    vehicle_count: usize,
    timing: &SignalTiming,
) -> (SignalColor, Duration) {
    match current {
        SignalColor::Red if vehicle_count >= timing.green_threshold => {
            (SignalColor::Green, timing.green_hold)
        }
        SignalColor::Red if vehicle_count >= timing.yellow_threshold => {
            (SignalColor::Yellow, timing.yellow_after_red_hold)
        }
        SignalColor::Red => (SignalColor::Red, timing.red_hold),
        SignalColor::Green => (SignalColor::Yellow, timing.yellow_after_green_hold),
        SignalColor::Yellow => (SignalColor::Red, timing.red_hold),
    }
}

/// Current signal color plus the hold timer guarding the next change.
#[derive(Clone, Debug)]
pub struct SignalState {
    color: SignalColor,
    hold: Duration,
    last_change: Instant,
    timing: SignalTiming,
}

impl SignalState {
    /// Start red, holding for `timing.red_hold` from `start`.
    pub fn new(timing: SignalTiming, start: Instant) -> Self {
        Self {
            color: SignalColor::Red,
            hold: timing.red_hold,
            last_change: start,
            timing,
        }
    }

    pub fn color(&self) -> SignalColor {
        self.color
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }

    pub fn last_change(&self) -> Instant {
        self.last_change
    }

    pub fn timing(&self) -> &SignalTiming {
        &self.timing
    }

    /// Time left before the current hold expires.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.hold
            .saturating_sub(now.saturating_duration_since(self.last_change))
    }

    /// Apply at most one step of the cycle.
    ///
    /// Nothing changes until `hold` has elapsed since the last change. Once it
    /// has, the next color is picked from `vehicle_count` and the timer
    /// restarts at `now`.
    pub fn advance(&mut self, now: Instant, vehicle_count: usize) -> Option<Transition> {
        let elapsed = now.saturating_duration_since(self.last_change);
        if elapsed < self.hold {
            return None;
        }

        let from = self.color;
        let (to, hold) = next_color(from, vehicle_count, &self.timing);
        self.color = to;
        self.hold = hold;
        self.last_change = now;

        Some(Transition { from, to, hold })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn starts_red_with_red_hold() {
        let start = Instant::now();
        let state = SignalState::new(SignalTiming::default(), start);
        assert_eq!(state.color(), SignalColor::Red);
        assert_eq!(state.hold(), secs(15));
        assert_eq!(state.remaining(start + secs(5)), secs(10));
    }

    #[test]
    fn holds_until_timer_expires() {
        let start = Instant::now();
        let mut state = SignalState::new(SignalTiming::default(), start);
        assert_eq!(state.advance(start + secs(14), 50), None);
        assert_eq!(state.color(), SignalColor::Red);
        assert_eq!(state.last_change(), start);
    }

    #[test]
    fn earlier_instant_counts_as_no_elapsed_time() {
        let start = Instant::now() + secs(60);
        let mut state = SignalState::new(SignalTiming::default(), start);
        assert_eq!(state.advance(start - secs(30), 50), None);
        assert_eq!(state.remaining(start - secs(30)), secs(15));
    }

    #[test]
    fn table_lookup_for_red() {
        let timing = SignalTiming::default();
        assert_eq!(
            next_color(SignalColor::Red, 4, &timing),
            (SignalColor::Red, secs(15))
        );
        assert_eq!(
            next_color(SignalColor::Red, 5, &timing),
            (SignalColor::Yellow, secs(10))
        );
        assert_eq!(
            next_color(SignalColor::Red, 9, &timing),
            (SignalColor::Yellow, secs(10))
        );
        assert_eq!(
            next_color(SignalColor::Red, 10, &timing),
            (SignalColor::Green, secs(15))
        );
    }

    #[test]
    fn green_and_yellow_ignore_count() {
        let timing = SignalTiming::default();
        for count in [0, 7, 40] {
            assert_eq!(
                next_color(SignalColor::Green, count, &timing),
                (SignalColor::Yellow, secs(4))
            );
            assert_eq!(
                next_color(SignalColor::Yellow, count, &timing),
                (SignalColor::Red, secs(15))
            );
        }
    }
}
