use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use flowforge_engine::{
    ActionStep, ConfigError, Engine, HasSteps, StepError, WorkflowBuilder, WorkflowSettings,
};
use flowforge_middleware::{
    ErrorHandlingMiddleware, LoggingMiddleware, RetryMiddleware, TimeoutMiddleware,
    TracingMiddleware,
};

use super::say;

pub(super) fn engine(settings: WorkflowSettings) -> Result<Engine, ConfigError> {
    Ok(Engine::builder()
        .settings(settings)
        .middleware(TimeoutMiddleware::new(Duration::from_secs(2)))
        .middleware(RetryMiddleware::new(3, Duration::from_millis(50))?)
        .middleware(ErrorHandlingMiddleware)
        .middleware(LoggingMiddleware)
        .middleware(TracingMiddleware)
        .build())
}

pub(super) fn workflow() -> WorkflowBuilder<HasSteps> {
    let calls = Arc::new(AtomicU32::new(0));
    WorkflowBuilder::new()
        .name("middleware")
        .step(say("validate", "Validating request"))
        .step(ActionStep::new("sync-crm", move |_, _| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt == 1 {
                    println!("CRM sync timed out, retrying");
                    return Err(StepError::msg("crm timeout"));
                }
                println!("CRM synced on attempt {attempt}");
                Ok(())
            }
        }))
}
