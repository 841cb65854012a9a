use std::sync::Arc;

use flowforge_engine::{
    Engine, FnObserver, HasSteps, WorkflowBuilder, WorkflowEvent, WorkflowSettings,
};

use super::say;

pub(super) fn engine(settings: WorkflowSettings) -> Engine {
    Engine::builder()
        .settings(settings)
        .observer(Arc::new(FnObserver::new(|event: &WorkflowEvent| {
            match event {
                WorkflowEvent::StepStarting { step_name, .. } => {
                    println!("event: executing step {step_name}");
                }
                WorkflowEvent::StepFinished {
                    step_name, elapsed, ..
                } => println!("event: executed step {step_name} in {elapsed:?}"),
                other => println!("event: {}", other.kind()),
            }
        })))
        .build()
}

pub(super) fn workflow() -> WorkflowBuilder<HasSteps> {
    WorkflowBuilder::new()
        .name("events")
        .step(say("begin", "Step 1: start workflow"))
        .step(say("end", "Step 2: end workflow"))
}
