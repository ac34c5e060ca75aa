// Same shape as race_broken with SeqCst atomics.
// Expected: invalid: 0 / 100000 on every machine.

use anyhow::Context;
use memory_model_trials::logging::init_stderr_tracing;
use memory_model_trials::run_example;
use memory_model_trials::scenarios::RaceAtomic;

fn main() -> anyhow::Result<()> {
    init_stderr_tracing(None);
    run_example(RaceAtomic::new).context("running race_atomic trials")?;
    Ok(())
}
