//! Data races and memory ordering, one small experiment at a time.
//!
//! Every scenario is two short operations on shared state plus a predicate
//! saying which outcomes the memory model allows. The harness runs the pair
//! on two threads many thousands of times and counts the runs that ended up
//! somewhere they should not have.

pub mod affinity;
pub mod cell;
pub mod harness;
pub mod logging;
pub mod scenarios;
pub mod sync;

pub use harness::{run_example, run_trials, run_trials_with, Report, Scenario, Tally, TrialConfig, DEFAULT_TRIALS};
