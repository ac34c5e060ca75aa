use anyhow::Context;
use memory_model_trials::logging::init_stderr_tracing;
use memory_model_trials::run_example;
use memory_model_trials::scenarios::MutexAtomic;

fn main() -> anyhow::Result<()> {
    init_stderr_tracing(None);
    run_example(MutexAtomic::new).context("running mutex_atomic trials")?;
    Ok(())
}
