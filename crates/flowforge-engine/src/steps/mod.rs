//! Built-in step kinds.

mod action;
mod conditional;
mod nested;
mod parallel;
mod retry;

pub use action::ActionStep;
pub use conditional::{Branch, ConditionalStep};
pub use nested::NestedWorkflowStep;
pub use parallel::ParallelStep;
pub use retry::RetryStep;
