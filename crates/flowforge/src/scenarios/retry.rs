use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use flowforge_engine::{ActionStep, ConfigError, HasSteps, RetryStep, StepError, WorkflowBuilder};
use flowforge_retry::ExponentialBackoff;

use super::say;

/// Calls that fail before the flaky service answers.
const TRANSIENT_FAILURES: u32 = 2;

pub(super) fn workflow() -> Result<WorkflowBuilder<HasSteps>, ConfigError> {
    let calls = Arc::new(AtomicU32::new(0));
    let flaky = ActionStep::new("call-inventory-service", move |_, _| {
        let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if attempt <= TRANSIENT_FAILURES {
                println!("Attempt {attempt}: service unavailable");
                Err(StepError::msg("503 service unavailable"))
            } else {
                println!("Attempt {attempt}: service answered");
                Ok(())
            }
        }
    });
    let strategy = ExponentialBackoff::new(Duration::from_millis(20), Duration::from_millis(200), 5);

    Ok(WorkflowBuilder::new()
        .name("retry")
        .step(RetryStep::new(flaky, 5, Arc::new(strategy))?)
        .step(say("record", "Recorded stock levels")))
}
