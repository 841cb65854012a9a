use flowforge_engine::{ActionStep, ConditionalStep, HasSteps, WorkflowBuilder};

use super::{checkout::ORDER_TOTAL_CENTS, say_with_undo};

/// Orders at or above this total ship express.
const EXPRESS_THRESHOLD_CENTS: u64 = 10_000;

pub(super) fn workflow() -> WorkflowBuilder<HasSteps> {
    WorkflowBuilder::new()
        .name("conditional")
        .step(ActionStep::new("price-order", |ctx, _| async move {
            println!("Order total is {ORDER_TOTAL_CENTS} cents");
            ctx.set("total-cents", ORDER_TOTAL_CENTS);
            Ok(())
        }))
        .step(ConditionalStep::new(
            "choose-shipping",
            |ctx| {
                ctx.get::<u64>("total-cents")
                    .is_ok_and(|total| total >= EXPRESS_THRESHOLD_CENTS)
            },
            say_with_undo("express-shipping", "Shipping express", "Cancelling express courier"),
            say_with_undo("standard-shipping", "Shipping standard", "Cancelling standard post"),
        ))
}
