//! Ready-made [`Middleware`](flowforge_engine::Middleware) for the flowforge engine.
//!
//! Register them with [`EngineBuilder::middleware`](flowforge_engine::EngineBuilder::middleware).
//! The last one registered is the outermost, so a typical stack registers
//! the innermost concern first:
//!
//! ```
//! use std::time::Duration;
//!
//! use flowforge_engine::Engine;
//! use flowforge_middleware::{
//!     ErrorHandlingMiddleware, LoggingMiddleware, RetryMiddleware, TimeoutMiddleware,
//!     TracingMiddleware,
//! };
//!
//! # fn main() -> Result<(), flowforge_engine::ConfigError> {
//! let engine = Engine::builder()
//!     .middleware(TimeoutMiddleware::new(Duration::from_secs(5)))
//!     .middleware(RetryMiddleware::new(3, Duration::from_millis(200))?)
//!     .middleware(ErrorHandlingMiddleware)
//!     .middleware(LoggingMiddleware)
//!     .middleware(TracingMiddleware)
//!     .build();
//!
//! assert_eq!(
//!     engine.pipeline().names(),
//!     ["timeout", "retry", "error-handling", "logging", "tracing"]
//! );
//! # Ok(())
//! # }
//! ```

mod error_handling;
mod logging;
mod retry;
mod timeout;
mod trace;

pub use error_handling::ErrorHandlingMiddleware;
pub use logging::LoggingMiddleware;
pub use retry::RetryMiddleware;
pub use timeout::TimeoutMiddleware;
pub use trace::TracingMiddleware;

#[cfg(test)]
mod test_support {
    use std::sync::Arc;

    use flowforge_engine::{
        ActionStep, Middleware, Pipeline, Step, StepError, WorkflowBuilder, WorkflowContext,
    };
    use tokio_util::sync::CancellationToken;

    pub(crate) fn pipeline<M: Middleware + 'static>(middleware: M) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.push(Arc::new(middleware));
        pipeline
    }

    pub(crate) fn context() -> WorkflowContext {
        let workflow = WorkflowBuilder::new()
            .name("middleware-test")
            .step(ActionStep::new("placeholder", |_, _| async { Ok(()) }))
            .build()
            .expect("valid workflow");
        WorkflowContext::new(&workflow)
    }

    pub(crate) async fn run(pipeline: &Pipeline, step: &dyn Step) -> Result<(), StepError> {
        pipeline
            .execute(step, &context(), &CancellationToken::new())
            .await
    }
}
