use flowforge_engine::{HasSteps, WorkflowBuilder};

use super::say;

pub(super) fn workflow() -> WorkflowBuilder<HasSteps> {
    WorkflowBuilder::new()
        .name("basic")
        .step(say("start", "Step 1: start workflow"))
        .step(say("work", "Step 2: do the work"))
        .step(say("finish", "Step 3: end workflow"))
}
