// Read-then-write increments from two threads without a lock.

use anyhow::Context;
use memory_model_trials::logging::init_stderr_tracing;
use memory_model_trials::run_example;
use memory_model_trials::scenarios::MutexBroken;

fn main() -> anyhow::Result<()> {
    init_stderr_tracing(None);
    run_example(MutexBroken::new).context("running mutex_broken trials")?;
    Ok(())
}
