// Release/Acquire on the flag. The fix for publish_broken.

use anyhow::Context;
use memory_model_trials::logging::init_stderr_tracing;
use memory_model_trials::run_example;
use memory_model_trials::scenarios::PublishAtomic;

fn main() -> anyhow::Result<()> {
    init_stderr_tracing(None);
    run_example(PublishAtomic::new).context("running publish_atomic trials")?;
    Ok(())
}
