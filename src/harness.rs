//! Running a scenario many times and counting the runs that went wrong.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;
use std::thread;

use crate::affinity::{pin_current_thread, CpuPair};

/// Trial count every example program runs with.
pub const DEFAULT_TRIALS: usize = 100_000;

const GATE_SPINS: u32 = 1_000;

/// A few lines of shared state poked at by two threads.
///
/// `left` and `right` run concurrently on two fresh threads. `outcome` and
/// `is_valid` are called only after both threads have been joined, so they
/// may read whatever the two operations recorded without further
/// synchronization.
pub trait Scenario: Sync {
    /// What one trial observed, e.g. the two values read by the workers.
    type Outcome: Ord + fmt::Display;

    const NAME: &'static str;

    fn left(&self);
    fn right(&self);
    fn outcome(&self) -> Self::Outcome;
    fn is_valid(&self) -> bool;
}

#[derive(Clone, Debug)]
pub struct TrialConfig {
    trials: usize,
    start_gate: bool,
    pin_threads: bool,
}

impl TrialConfig {
    pub fn new(trials: usize) -> Self {
        Self {
            trials,
            start_gate: true,
            pin_threads: true,
        }
    }

    pub fn trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    /// Hold both workers until both exist, then let them go together.
    pub fn start_gate(mut self, enabled: bool) -> Self {
        self.start_gate = enabled;
        self
    }

    /// Run `left` and `right` on two different CPUs when there are two.
    pub fn pin_threads(mut self, enabled: bool) -> Self {
        self.pin_threads = enabled;
        self
    }

    pub fn trial_count(&self) -> usize {
        self.trials
    }
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TRIALS)
    }
}

/// How often one outcome was seen, and whether it is allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tally {
    pub count: usize,
    pub valid: bool,
}

/// The result of one harness run.
#[derive(Debug)]
pub struct Report<O> {
    name: &'static str,
    total: usize,
    invalid: usize,
    outcomes: BTreeMap<O, Tally>,
}

impl<O: Ord + fmt::Display> Report<O> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            total: 0,
            invalid: 0,
            outcomes: BTreeMap::new(),
        }
    }

    fn record(&mut self, outcome: O, valid: bool) {
        self.total += 1;
        if !valid {
            self.invalid += 1;
        }
        self.outcomes
            .entry(outcome)
            .or_insert(Tally { count: 0, valid })
            .count += 1;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn invalid(&self) -> usize {
        self.invalid
    }

    /// `(invalid, total)`
    pub fn counts(&self) -> (usize, usize) {
        (self.invalid, self.total)
    }

    /// Share of invalid trials, 0 when nothing ran.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.invalid as f64 / self.total as f64
        }
    }

    /// Every distinct outcome seen, in outcome order.
    pub fn outcomes(&self) -> impl Iterator<Item = (&O, Tally)> {
        self.outcomes.iter().map(|(outcome, tally)| (outcome, *tally))
    }

    /// The invalid outcome seen most often. Ties go to the smaller outcome.
    pub fn most_common_invalid(&self) -> Option<&O> {
        self.outcomes
            .iter()
            .filter(|(_, tally)| !tally.valid)
            .fold(None, |best: Option<(&O, usize)>, (outcome, tally)| match best {
                Some((_, count)) if count >= tally.count => best,
                _ => Some((outcome, tally.count)),
            })
            .map(|(outcome, _)| outcome)
    }

    pub fn log_outcomes(&self) {
        for (outcome, tally) in self.outcomes() {
            tracing::info!(
                scenario = self.name,
                count = tally.count,
                valid = tally.valid,
                "{outcome}"
            );
        }
    }
}

impl<O: Ord + fmt::Display> fmt::Display for Report<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid: {} / {} ({:.4}%)",
            self.invalid,
            self.total,
            self.ratio() * 100.0
        )?;
        if let Some(example) = self.most_common_invalid() {
            write!(f, ", e.g. {example}")?;
        }
        Ok(())
    }
}

/// Runs `trials` fresh scenarios with the default settings.
pub fn run_trials<S, F>(factory: F, trials: usize) -> io::Result<Report<S::Outcome>>
where
    S: Scenario,
    F: FnMut() -> S,
{
    run_trials_with(factory, &TrialConfig::new(trials))
}

pub fn run_trials_with<S, F>(mut factory: F, config: &TrialConfig) -> io::Result<Report<S::Outcome>>
where
    S: Scenario,
    F: FnMut() -> S,
{
    let cpus = if config.pin_threads {
        let cpus = CpuPair::detect();
        if cpus.is_none() {
            tracing::warn!(
                scenario = S::NAME,
                "no two CPUs to pin workers to, races may rarely show"
            );
        }
        cpus
    } else {
        None
    };

    tracing::debug!(scenario = S::NAME, trials = config.trials, ?cpus, "starting trials");

    let mut report = Report::new(S::NAME);
    for _ in 0..config.trials {
        // Never reused: leftovers from the previous trial would leak into this one.
        let scenario = factory();
        run_one(&scenario, config.start_gate, cpus)?;
        report.record(scenario.outcome(), scenario.is_valid());
    }

    tracing::debug!(
        scenario = S::NAME,
        invalid = report.invalid,
        total = report.total,
        "trials finished"
    );
    Ok(report)
}

/// Runs `left` and `right` of one scenario on two threads and joins them.
fn run_one<S: Scenario>(scenario: &S, start_gate: bool, cpus: Option<CpuPair>) -> io::Result<()> {
    // Relaxed is enough: the gate is only about timing. An Acquire here
    // would not order left against right anyway, since neither writes it.
    let go = AtomicBool::new(!start_gate);
    let go = &go;

    let worker = |cpu: Option<usize>, op: fn(&S)| {
        move || {
            if let Some(cpu) = cpu {
                if let Err(err) = pin_current_thread(cpu) {
                    tracing::debug!(cpu, %err, "could not pin worker");
                }
            }
            let mut spins = 0u32;
            while !go.load(Relaxed) {
                spins += 1;
                if spins < GATE_SPINS {
                    std::hint::spin_loop();
                } else {
                    // Whoever raises the gate may be waiting for this CPU.
                    thread::yield_now();
                }
            }
            op(scenario);
        }
    };

    // Leaving the scope joins both workers, so the caller sees
    // everything `left` and `right` did.
    thread::scope(|s| {
        let spawned = thread::Builder::new()
            .name("left".into())
            .spawn_scoped(s, worker(cpus.map(|c| c.left), S::left))
            .and_then(|_| {
                thread::Builder::new()
                    .name("right".into())
                    .spawn_scoped(s, worker(cpus.map(|c| c.right), S::right))
            });
        // Release the gate even on failure, or a spawned left would spin forever.
        go.store(true, Relaxed);
        spawned.map(drop)
    })
}

/// The whole body of an example program: run the default number of trials,
/// log the outcome histogram and print one summary line.
pub fn run_example<S, F>(factory: F) -> io::Result<Report<S::Outcome>>
where
    S: Scenario,
    F: FnMut() -> S,
{
    let report = run_trials_with(factory, &TrialConfig::default())?;
    report.log_outcomes();
    println!("{report}");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Observed;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering::SeqCst;

    // Each side bumps the counter once with an atomic add, so both
    // adds always land. Invalid only if the final value is not 2.
    struct TwoAdds {
        counter: AtomicU32,
    }

    impl TwoAdds {
        fn new() -> Self {
            Self { counter: AtomicU32::new(0) }
        }
    }

    impl Scenario for TwoAdds {
        type Outcome = u32;
        const NAME: &'static str = "two-adds";

        fn left(&self) {
            self.counter.fetch_add(1, SeqCst);
        }
        fn right(&self) {
            self.counter.fetch_add(1, SeqCst);
        }
        fn outcome(&self) -> u32 {
            self.counter.load(SeqCst)
        }
        fn is_valid(&self) -> bool {
            self.outcome() == 2
        }
    }

    // Valid only when the right worker ran to completion first. Which
    // one wins is up to the machine, but both always finish.
    struct RightFirst {
        first: AtomicU32,
        left_saw: Observed,
    }

    impl Scenario for RightFirst {
        type Outcome = i32;
        const NAME: &'static str = "right-first";

        fn left(&self) {
            let (Ok(seen) | Err(seen)) = self.first.compare_exchange(0, 1, SeqCst, SeqCst);
            self.left_saw.set(seen as i32);
        }
        fn right(&self) {
            let _ = self.first.compare_exchange(0, 2, SeqCst, SeqCst);
        }
        fn outcome(&self) -> i32 {
            self.left_saw.get()
        }
        fn is_valid(&self) -> bool {
            self.outcome() == 2
        }
    }

    fn right_first() -> RightFirst {
        RightFirst {
            first: AtomicU32::new(0),
            left_saw: Observed::new(),
        }
    }

    #[test]
    fn zero_trials() {
        let report = run_trials(TwoAdds::new, 0).unwrap();
        assert_eq!(report.counts(), (0, 0));
        assert_eq!(report.ratio(), 0.0);
        assert_eq!(report.outcomes().count(), 0);
        assert_eq!(report.to_string(), "invalid: 0 / 0 (0.0000%)");
    }

    #[test]
    fn every_trial_is_joined_before_judging() {
        // If the predicate ran before both adds finished, it would see 0 or 1.
        let report = run_trials(TwoAdds::new, 5_000).unwrap();
        assert_eq!(report.counts(), (0, 5_000));
        assert_eq!(
            report.outcomes().collect::<Vec<_>>(),
            vec![(&2, Tally { count: 5_000, valid: true })]
        );
    }

    #[test]
    fn fresh_scenario_per_trial() {
        let mut built = 0;
        let report = run_trials(
            || {
                built += 1;
                TwoAdds::new()
            },
            321,
        )
        .unwrap();
        assert_eq!(built, 321);
        assert_eq!(report.total(), 321);
    }

    #[test]
    fn invalid_outcomes_are_counted_and_shown() {
        let config = TrialConfig::new(2_000).pin_threads(false);
        let report = run_trials_with(right_first, &config).unwrap();

        let invalid: usize = report
            .outcomes()
            .filter(|(_, tally)| !tally.valid)
            .map(|(_, tally)| tally.count)
            .sum();
        assert_eq!(invalid, report.invalid());
        assert_eq!(report.total(), 2_000);

        let line = report.to_string();
        assert!(line.starts_with(&format!("invalid: {} / 2000 (", report.invalid())));
        match report.most_common_invalid() {
            Some(example) => assert!(line.ends_with(&format!(", e.g. {example}"))),
            None => assert!(line.ends_with("%)")),
        }
    }

    #[test]
    fn without_gate_or_pinning() {
        let config = TrialConfig::default().trials(1_000).start_gate(false).pin_threads(false);
        assert_eq!(config.trial_count(), 1_000);
        let report = run_trials_with(TwoAdds::new, &config).unwrap();
        assert_eq!(report.counts(), (0, 1_000));
    }

    #[test]
    fn most_common_invalid_picks_the_largest_tally() {
        let mut report = Report::new("manual");
        for (outcome, valid, times) in [(0, false, 3), (1, true, 10), (2, false, 5), (3, false, 5)] {
            for _ in 0..times {
                report.record(outcome, valid);
            }
        }
        assert_eq!(report.counts(), (13, 23));
        assert_eq!(report.most_common_invalid(), Some(&2));
        assert_eq!(report.name(), "manual");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn total_matches_trial_count(trials in 0usize..200) {
            let report = run_trials(TwoAdds::new, trials).unwrap();
            prop_assert_eq!(report.total(), trials);
            prop_assert_eq!(report.invalid(), 0);
        }

        #[test]
        fn invalid_never_exceeds_total(trials in 0usize..200) {
            let report = run_trials(right_first, trials).unwrap();
            prop_assert_eq!(report.total(), trials);
            prop_assert!(report.invalid() <= report.total());
        }
    }
}
