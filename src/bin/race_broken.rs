// Plain integers written and read from two threads.
// This is a data race and thus undefined behavior, so anything goes,
// but what usually shows up is l == 0 && r == 0 from the store buffers.
// Don't run this one under Miri, it would (rightly) stop at the first access.

use anyhow::Context;
use memory_model_trials::logging::init_stderr_tracing;
use memory_model_trials::run_example;
use memory_model_trials::scenarios::RaceBroken;

fn main() -> anyhow::Result<()> {
    init_stderr_tracing(None);
    run_example(RaceBroken::new).context("running race_broken trials")?;
    Ok(())
}
