use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::data_structures::{Key, Keysum, OrderedSet};

use super::{Operation, OperationMix, Result, WorkloadConfig, WorkloadError};

/// Fill phase gives up after this many repetitions.
const MAX_FILL_REPETITIONS: usize = 200;
/// Fill stops once the size is within this many percent of the expectation.
const FILL_THRESHOLD_PERCENT: f64 = 5.0;
const MAX_FILL_THREADS: usize = 48;

/// Per-thread operation counts and the net keysum change caused by the
/// thread's successful updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadTally {
    pub inserted: u64,
    pub failed_inserts: u64,
    pub removed: u64,
    pub failed_removes: u64,
    pub found: u64,
    pub missed: u64,
    pub keysum: Keysum,
}

impl ThreadTally {
    /// Issue `op` on `set` and record its outcome.
    pub fn apply<C: OrderedSet + ?Sized>(&mut self, set: &C, op: Operation, key: Key) {
        match op {
            Operation::Insert => {
                if set.insert(key) {
                    self.inserted += 1;
                    self.keysum += Keysum::from(key);
                } else {
                    self.failed_inserts += 1;
                }
            }
            Operation::Remove => {
                if set.remove(key) {
                    self.removed += 1;
                    self.keysum -= Keysum::from(key);
                } else {
                    self.failed_removes += 1;
                }
            }
            Operation::Contains => {
                if set.contains(key) {
                    self.found += 1;
                } else {
                    self.missed += 1;
                }
            }
        }
    }

    pub fn merge(&mut self, other: &ThreadTally) {
        self.inserted += other.inserted;
        self.failed_inserts += other.failed_inserts;
        self.removed += other.removed;
        self.failed_removes += other.failed_removes;
        self.found += other.found;
        self.missed += other.missed;
        self.keysum += other.keysum;
    }

    pub fn total_ops(&self) -> u64 {
        self.inserted
            + self.failed_inserts
            + self.removed
            + self.failed_removes
            + self.found
            + self.missed
    }
}

/// Outcome of [`fill_to_steady_state`].
#[derive(Debug, Clone, PartialEq)]
pub struct FillReport {
    pub size: usize,
    pub expected: usize,
    /// Net keysum change caused by the fill.
    pub keysum: Keysum,
    pub repetitions: usize,
    pub elapsed: Duration,
}

/// Outcome of [`run_trial`].
#[derive(Debug, Clone)]
pub struct TrialReport {
    pub mix: OperationMix,
    pub threads: usize,
    pub tallies: Vec<ThreadTally>,
    pub totals: ThreadTally,
    pub elapsed: Duration,
    pub fill: Option<FillReport>,
    pub final_size: usize,
}

impl TrialReport {
    /// Operations per second over the measured phase.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.totals.total_ops() as f64 / secs
    }
}

/// Run `config.ops_per_thread` operations on each of `config.threads`
/// threads. Workers start together behind a barrier.
///
/// Worker `i` seeds its generator from `config.seed` and `i`, so a
/// single-threaded run is reproducible.
pub fn run_fixed_ops<C>(set: &C, config: &WorkloadConfig) -> Result<Vec<ThreadTally>>
where
    C: OrderedSet + Sync + ?Sized,
{
    config.validate()?;
    let barrier = Barrier::new(config.threads);

    let tallies = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|worker| {
                let barrier = &barrier;
                let seed = worker_seed(config.seed, worker);
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    let mut tally = ThreadTally::default();
                    barrier.wait();
                    for _ in 0..config.ops_per_thread {
                        let key = rng.gen_range(1..=config.key_range);
                        let op = config.mix.pick(rng.gen_range(0.0..1.0));
                        tally.apply(set, op, key);
                    }
                    tally
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect::<Vec<_>>()
    });

    Ok(tallies)
}

/// Drive `set` toward the size it would settle at under `config.mix`, using
/// only inserts and removes at the same ratio.
///
/// The net keysum change is reported so a following trial can include it in
/// its check.
pub fn fill_to_steady_state<C>(set: &C, config: &WorkloadConfig) -> Result<FillReport>
where
    C: OrderedSet + Sync + ?Sized,
{
    config.validate()?;

    let mix = config.mix.updates_only();
    let expected = mix.expected_steady_size(config.key_range);
    let threads = fill_threads();
    let ops_per_thread = 10 + config.key_range as usize / (2 * threads);
    let fill_config = config
        .clone()
        .with_threads(threads)
        .with_ops_per_thread(ops_per_thread)
        .with_mix(mix);

    let started = Instant::now();
    let mut size = set.size();
    let mut keysum: Keysum = 0;
    let mut repetitions = 0;

    while !within_fill_threshold(size, expected) {
        if repetitions == MAX_FILL_REPETITIONS {
            warn!(repetitions, size, expected, "fill did not reach steady state");
            return Err(WorkloadError::SteadyStateNotReached {
                repetitions,
                size,
                expected,
            });
        }
        repetitions += 1;

        let rep_config = fill_config
            .clone()
            .with_seed(config.seed.wrapping_add(repetitions as u64));
        let tallies = run_fixed_ops(set, &rep_config)?;
        keysum += tallies.iter().map(|tally| tally.keysum).sum::<Keysum>();
        size = set.size();
        debug!(repetition = repetitions, size, expected, "fill repetition finished");
    }

    let elapsed = started.elapsed();
    info!(
        size,
        expected,
        repetitions,
        elapsed_ms = elapsed.as_millis() as u64,
        "filled to steady state"
    );

    Ok(FillReport {
        size,
        expected,
        keysum,
        repetitions,
        elapsed,
    })
}

/// Compare the set's keysum with the value the workers tracked.
pub fn verify_keysum<C: OrderedSet + ?Sized>(set: &C, expected: Keysum) -> Result<()> {
    let actual = set.keysum();
    if actual != expected {
        error!(%expected, %actual, "keysum mismatch");
        return Err(WorkloadError::KeysumMismatch { expected, actual });
    }
    Ok(())
}

/// Optionally fill, then run the measured phase and check the result.
///
/// The set does not need to start empty: its keysum before the trial is
/// folded into the expectation.
pub fn run_trial<C>(set: &C, config: &WorkloadConfig) -> Result<TrialReport>
where
    C: OrderedSet + Sync + ?Sized,
{
    config.validate()?;
    let initial_keysum = set.keysum();

    let fill = if config.prefill {
        Some(fill_to_steady_state(set, config)?)
    } else {
        None
    };

    let started = Instant::now();
    let tallies = run_fixed_ops(set, config)?;
    let elapsed = started.elapsed();

    let mut totals = ThreadTally::default();
    for tally in &tallies {
        totals.merge(tally);
    }

    let fill_keysum = fill.as_ref().map_or(0, |fill| fill.keysum);
    verify_keysum(set, initial_keysum + fill_keysum + totals.keysum)?;
    set.verify_structure()?;

    let report = TrialReport {
        mix: config.mix,
        threads: config.threads,
        tallies,
        totals,
        elapsed,
        fill,
        final_size: set.size(),
    };
    info!(
        mix = %report.mix,
        threads = report.threads,
        ops = report.totals.total_ops(),
        final_size = report.final_size,
        throughput = report.throughput(),
        "trial finished"
    );
    Ok(report)
}

fn worker_seed(seed: u64, worker: usize) -> u64 {
    seed ^ (worker as u64 + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

fn fill_threads() -> usize {
    let available = thread::available_parallelism().map_or(2, |n| n.get());
    (available / 2).clamp(1, MAX_FILL_THREADS)
}

fn within_fill_threshold(size: usize, expected: usize) -> bool {
    if expected == 0 {
        return size == 0;
    }
    let percent = size as f64 / expected as f64 * 100.0;
    (percent - 100.0).abs() <= FILL_THRESHOLD_PERCENT
}
