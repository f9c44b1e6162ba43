use std::time::{Duration, Instant};

use traffic_signal::{SignalColor, SignalState, SignalTiming, Transition};

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[test]
fn heavy_traffic_runs_full_cycle() {
    let start = Instant::now();
    let mut state = SignalState::new(SignalTiming::default(), start);

    let t1 = start + secs(15);
    assert_eq!(
        state.advance(t1, 12),
        Some(Transition {
            from: SignalColor::Red,
            to: SignalColor::Green,
            hold: secs(15),
        })
    );

    assert_eq!(state.advance(t1 + secs(14), 12), None);

    let t2 = t1 + secs(15);
    let step = state.advance(t2, 0).expect("green expires");
    assert_eq!((step.from, step.to, step.hold), (SignalColor::Green, SignalColor::Yellow, secs(4)));

    let t3 = t2 + secs(4);
    let step = state.advance(t3, 30).expect("yellow expires");
    assert_eq!((step.from, step.to, step.hold), (SignalColor::Yellow, SignalColor::Red, secs(15)));
    assert_eq!(state.last_change(), t3);
}

#[test]
fn moderate_traffic_goes_yellow_for_ten_seconds() {
    let start = Instant::now();
    let mut state = SignalState::new(SignalTiming::default(), start);

    let step = state.advance(start + secs(16), 7).expect("red expires");
    assert_eq!(step.to, SignalColor::Yellow);
    assert_eq!(step.hold, secs(10));

    assert_eq!(state.advance(start + secs(25), 7), None);
    let step = state.advance(start + secs(26), 7).expect("yellow expires");
    assert_eq!(step.to, SignalColor::Red);
}

#[test]
fn light_traffic_restarts_red_timer() {
    let start = Instant::now();
    let mut state = SignalState::new(SignalTiming::default(), start);

    let t1 = start + secs(20);
    let step = state.advance(t1, 3).expect("red expires");
    assert_eq!(step.from, SignalColor::Red);
    assert_eq!(step.to, SignalColor::Red);
    assert_eq!(state.last_change(), t1);

    // The new hold is measured from the reset, not from the original start.
    assert_eq!(state.advance(start + secs(30), 20), None);
    assert_eq!(state.advance(t1 + secs(15), 20).map(|t| t.to), Some(SignalColor::Green));
}

#[test]
fn long_gap_advances_only_one_step() {
    let start = Instant::now();
    let mut state = SignalState::new(SignalTiming::default(), start);

    state.advance(start + secs(15), 10);
    assert_eq!(state.color(), SignalColor::Green);

    let step = state.advance(start + secs(600), 10).expect("green expires");
    assert_eq!(step.to, SignalColor::Yellow);
    assert_eq!(state.color(), SignalColor::Yellow);
}

#[test]
fn custom_thresholds_are_respected() {
    let timing = SignalTiming {
        green_threshold: 3,
        yellow_threshold: 1,
        ..SignalTiming::default()
    };
    let start = Instant::now();
    let mut state = SignalState::new(timing, start);
    assert_eq!(state.advance(start + secs(15), 3).map(|t| t.to), Some(SignalColor::Green));
}
