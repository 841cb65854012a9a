//! Saga-style workflow engine.
//!
//! A [`Workflow`] is an ordered list of [`Step`]s. The [`Engine`] runs the
//! steps one after another through a [`Middleware`] pipeline, sharing a
//! [`WorkflowContext`] between them. When a step fails, every step that
//! already completed is compensated in reverse order, each at most once.
//!
//! ```
//! use flowforge_engine::{ActionStep, Engine, StepError, WorkflowBuilder, WorkflowContext};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let workflow = WorkflowBuilder::new()
//!     .name("order")
//!     .step(
//!         ActionStep::new("reserve", |ctx, _| async move {
//!             ctx.set("reserved", true);
//!             Ok(())
//!         })
//!         .with_compensation(|ctx, _| async move {
//!             ctx.set("reserved", false);
//!             Ok(())
//!         }),
//!     )
//!     .step(ActionStep::new("charge", |_, _| async {
//!         Err(StepError::msg("card declined"))
//!     }))
//!     .build()?;
//!
//! let ctx = WorkflowContext::new(&workflow);
//! let result = Engine::default()
//!     .execute(&workflow, &ctx, &CancellationToken::new())
//!     .await;
//!
//! assert!(result.is_err());
//! assert!(!ctx.get::<bool>("reserved")?);
//! # Ok(())
//! # }
//! ```

mod audit;
mod builder;
mod context;
mod engine;
mod error;
mod events;
mod id;
mod pipeline;
mod services;
mod settings;
mod step;
mod steps;
mod tracker;
mod workflow;

pub use audit::{AuditLog, StepRecord, StepStatus};
pub use builder::{Empty, HasSteps, WorkflowBuilder};
pub use context::{ContextBuilder, WorkflowContext, WorkflowRef};
pub use engine::{DEFAULT_COMPENSATION_DELAY, Engine, EngineBuilder};
pub use error::{BoxError, CompensationError, ConfigError, ContextError, StepError, WorkflowError};
pub use events::{ChannelObserver, EventObserver, FnObserver, NoopObserver, WorkflowEvent};
pub use id::{RunId, StepId, WorkflowId};
pub use pipeline::{Middleware, Next, Pipeline};
pub use services::Services;
pub use settings::{SettingsBuilder, WorkflowSettings};
pub use step::{DisposeFlag, Step};
pub use steps::{
    ActionStep, Branch, ConditionalStep, NestedWorkflowStep, ParallelStep, RetryStep,
};
pub use tracker::CompensationTracker;
pub use workflow::Workflow;

pub use async_trait::async_trait;
pub use flowforge_retry as retry;
