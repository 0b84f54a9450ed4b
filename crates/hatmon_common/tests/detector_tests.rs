//! Hold-duration detector behaviour over simulated time.

use hatmon_common::{HardwareError, HoldDetector, InputLine, PinConfig, Polarity, Pull, Sample};
use std::time::{Duration, Instant};

struct NoLine;

impl InputLine for NoLine {
    fn read_level(&mut self) -> Result<bool, HardwareError> {
        Ok(false)
    }
}

fn detector(min_hold_ms: u64) -> HoldDetector<NoLine> {
    let cfg = PinConfig {
        pin_id: 22,
        polarity: Polarity::ActiveHigh,
        pull: Pull::None,
        min_hold_ms,
    };
    HoldDetector::new(NoLine, &cfg)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Feed `(offset_ms, level)` samples and collect the classifications.
fn run(det: &mut HoldDetector<NoLine>, t0: Instant, samples: &[(u64, bool)]) -> Vec<Sample> {
    samples
        .iter()
        .map(|&(at, level)| det.observe(level, t0 + ms(at)))
        .collect()
}

#[test]
fn test_inactive_sample_always_reports_inactive() {
    let mut det = detector(600);
    let t0 = Instant::now();

    let histories: [&[(u64, bool)]; 3] = [
        &[(0, true), (20, true), (700, true)],
        &[(0, true), (5, false), (10, true)],
        &[],
    ];
    for history in histories {
        run(&mut det, t0, history);
        assert_eq!(det.observe(false, t0 + ms(10_000)), Sample::Inactive);
        assert_eq!(det.state().active_since, None);
        assert!(!det.state().is_active);
    }
}

#[test]
fn test_held_exactly_at_min_hold() {
    let mut det = detector(600);
    let t0 = Instant::now();

    let samples: Vec<(u64, bool)> = (0..=30).map(|i| (i * 20, true)).collect();
    let results = run(&mut det, t0, &samples);

    let (last, earlier) = results.split_last().unwrap();
    assert_eq!(*last, Sample::ActiveHeld, "sample at 600ms must be held");
    assert!(earlier.iter().all(|s| *s == Sample::ActiveNotYetHeld));
}

#[test]
fn test_held_reported_on_first_sample_past_boundary() {
    let mut det = detector(600);
    let t0 = Instant::now();

    // Coarse 250ms steps straddle the boundary.
    let results = run(&mut det, t0, &[(0, true), (250, true), (500, true), (750, true)]);
    assert_eq!(
        results,
        vec![
            Sample::ActiveNotYetHeld,
            Sample::ActiveNotYetHeld,
            Sample::ActiveNotYetHeld,
            Sample::ActiveHeld,
        ]
    );
}

#[test]
fn test_single_inactive_sample_resets_hold_timer() {
    let mut det = detector(600);
    let t0 = Instant::now();

    let mut samples = vec![(0, true), (599, true), (600, false)];
    samples.extend([(601, true), (900, true), (1200, true)]);
    let results = run(&mut det, t0, &samples);

    assert!(!results.contains(&Sample::ActiveHeld));
    assert_eq!(results[2], Sample::Inactive);
}

#[test]
fn test_bounce_scenario_waits_for_second_span() {
    let mut det = detector(600);
    let t0 = Instant::now();

    // active 0..300, inactive 300..305, active from 305 for 650ms, sampled every 5ms.
    let mut first_held = None;
    let mut t = 0;
    while t <= 955 {
        let level = !(300..305).contains(&t);
        let sample = det.observe(level, t0 + ms(t));
        if sample == Sample::ActiveHeld && first_held.is_none() {
            first_held = Some(t);
        }
        t += 5;
    }

    assert_eq!(first_held, Some(905));
}

#[test]
fn test_held_stays_held_while_line_stays_active() {
    let mut det = detector(100);
    let t0 = Instant::now();
    let results = run(&mut det, t0, &[(0, true), (100, true), (120, true), (5_000, true)]);
    assert_eq!(&results[1..], &[Sample::ActiveHeld; 3]);
}

#[test]
fn test_sample_rate_does_not_change_outcome() {
    let t0 = Instant::now();
    for step in [1u64, 20, 100, 600] {
        let mut det = detector(600);
        let mut held_at = None;
        let mut t = 0;
        while t <= 1_200 && held_at.is_none() {
            if det.observe(true, t0 + ms(t)) == Sample::ActiveHeld {
                held_at = Some(t);
            }
            t += step;
        }
        let held_at = held_at.expect("continuous hold must be detected");
        assert!(held_at >= 600 && held_at < 600 + step, "step {step}: held at {held_at}");
    }
}
