use flowforge_engine::{ConfigError, Engine, HasSteps, NestedWorkflowStep, WorkflowBuilder};

use super::{say, say_with_undo};

pub(super) fn workflow(engine: &Engine) -> Result<WorkflowBuilder<HasSteps>, ConfigError> {
    let inner = WorkflowBuilder::new()
        .name("fulfilment")
        .step(say_with_undo("pick", "Nested step 1: pick items", "Nested undo: restock items"))
        .step(say_with_undo("pack", "Nested step 2: pack box", "Nested undo: unpack box"))
        .build()?;

    Ok(WorkflowBuilder::new()
        .name("nested")
        .step(say_with_undo("accept", "Parent step 1: accept order", "Parent undo: reject order"))
        .step(NestedWorkflowStep::new(inner, engine.clone()))
        .step(say("notify", "Parent step 2: notify customer")))
}
