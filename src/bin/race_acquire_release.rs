// Release stores and Acquire loads are not enough for store buffering.
// A store followed by a load of a different variable may still be reordered,
// so l == 0 && r == 0 is allowed. On x86 it shows up in a fraction of runs.

use anyhow::Context;
use memory_model_trials::logging::init_stderr_tracing;
use memory_model_trials::run_example;
use memory_model_trials::scenarios::RaceAcquireRelease;

fn main() -> anyhow::Result<()> {
    init_stderr_tracing(None);
    run_example(RaceAcquireRelease::new).context("running race_acquire_release trials")?;
    Ok(())
}
