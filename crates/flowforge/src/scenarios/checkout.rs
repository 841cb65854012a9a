use flowforge_engine::{ActionStep, HasSteps, WorkflowBuilder};

pub(super) const ORDER_ID: &str = "order-1042";
pub(super) const ORDER_TOTAL_CENTS: u64 = 12_999;

pub(super) fn workflow() -> WorkflowBuilder<HasSteps> {
    WorkflowBuilder::new()
        .name("checkout")
        .step(
            ActionStep::new("reserve-inventory", |ctx, _| async move {
                println!("Reserving inventory for {ORDER_ID}...");
                ctx.set("order-id", ORDER_ID.to_string());
                ctx.set("reserved", true);
                Ok(())
            })
            .with_compensation(|ctx, _| async move {
                println!("Releasing inventory...");
                ctx.set("reserved", false);
                Ok(())
            })
            .with_description("release reserved inventory"),
        )
        .step(
            ActionStep::new("process-payment", |ctx, _| async move {
                let order: String = ctx.get("order-id")?;
                println!(
                    "Charging {}.{:02} for {order}...",
                    ORDER_TOTAL_CENTS / 100,
                    ORDER_TOTAL_CENTS % 100
                );
                ctx.set("charged-cents", ORDER_TOTAL_CENTS);
                Ok(())
            })
            .with_compensation(|ctx, _| async move {
                let cents: u64 = ctx.get_or_default("charged-cents")?;
                println!("Refunding {}.{:02}...", cents / 100, cents % 100);
                ctx.set("charged-cents", 0_u64);
                Ok(())
            })
            .with_description("refund the payment"),
        )
        .step(
            ActionStep::new("ship-order", |ctx, _| async move {
                let order: String = ctx.get("order-id")?;
                println!("Shipping {order}...");
                Ok(())
            })
            .with_compensation(|_, _| async {
                println!("Cancelling shipment...");
                Ok(())
            }),
        )
}
