use std::time::Duration;

use flowforge_engine::{ActionStep, HasSteps, ParallelStep, WorkflowBuilder};

use super::say;

/// At most this many notifications are sent at once.
const MAX_PARALLELISM: usize = 2;

fn notify(channel: &'static str, latency_ms: u64) -> ActionStep {
    ActionStep::new(channel, move |_, _| async move {
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        println!("Sent {channel} notification");
        Ok(())
    })
    .with_compensation(move |_, _| async move {
        println!("Retracted {channel} notification");
        Ok(())
    })
}

pub(super) fn workflow() -> WorkflowBuilder<HasSteps> {
    WorkflowBuilder::new()
        .name("parallel")
        .step(say("prepare", "Preparing notifications"))
        .step(
            ParallelStep::new("notify-customer", MAX_PARALLELISM)
                .with_step(notify("email", 30))
                .with_step(notify("sms", 10))
                .with_step(notify("push", 20)),
        )
}
