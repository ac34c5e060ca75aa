// Relaxed flag and payload. Valid on x86 by luck of the hardware,
// an ARM machine may report ready == true && payload == 0.

use anyhow::Context;
use memory_model_trials::logging::init_stderr_tracing;
use memory_model_trials::run_example;
use memory_model_trials::scenarios::PublishBroken;

fn main() -> anyhow::Result<()> {
    init_stderr_tracing(None);
    run_example(PublishBroken::new).context("running publish_broken trials")?;
    Ok(())
}
