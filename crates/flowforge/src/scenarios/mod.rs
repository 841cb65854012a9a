mod basic;
mod checkout;
mod conditional;
mod events;
mod middleware;
mod nested;
mod parallel;
mod retry;

use clap::ValueEnum;
use flowforge_engine::{
    ActionStep, ConfigError, Engine, HasSteps, WorkflowBuilder, WorkflowSettings,
};

/// The sample workflows the harness can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Scenario {
    /// Three steps run in order
    Basic,
    /// E-commerce checkout with inventory, payment and shipping rollback
    Checkout,
    /// A flaky call wrapped in a retrying step
    Retry,
    /// Shipping method chosen from the order total
    Conditional,
    /// Notifications fanned out with bounded parallelism
    Parallel,
    /// A workflow run as a step of another
    Nested,
    /// Logging, tracing, timeout, retry and error middleware around every step
    Middleware,
    /// Lifecycle events printed as they happen
    Events,
}

impl Scenario {
    /// The engine this sample runs on.
    pub(crate) fn engine(self, settings: WorkflowSettings) -> Result<Engine, ConfigError> {
        match self {
            Self::Middleware => middleware::engine(settings),
            Self::Events => Ok(events::engine(settings)),
            _ => Ok(Engine::new(settings)),
        }
    }

    /// The sample workflow, left open so the caller can add steps and observers.
    pub(crate) fn workflow(self, engine: &Engine) -> Result<WorkflowBuilder<HasSteps>, ConfigError> {
        match self {
            Self::Basic => Ok(basic::workflow()),
            Self::Checkout => Ok(checkout::workflow()),
            Self::Retry => retry::workflow(),
            Self::Conditional => Ok(conditional::workflow()),
            Self::Parallel => Ok(parallel::workflow()),
            Self::Nested => nested::workflow(engine),
            Self::Middleware => Ok(middleware::workflow()),
            Self::Events => Ok(events::workflow()),
        }
    }
}

/// A step that prints `message` and succeeds.
fn say(name: &'static str, message: &'static str) -> ActionStep {
    ActionStep::new(name, move |_, _| async move {
        println!("{message}");
        Ok(())
    })
}

/// Like [`say`], printing `undo` when compensated.
fn say_with_undo(name: &'static str, message: &'static str, undo: &'static str) -> ActionStep {
    say(name, message).with_compensation(move |_, _| async move {
        println!("{undo}");
        Ok(())
    })
}
