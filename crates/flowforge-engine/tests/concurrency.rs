//! Integration tests for the engine-wide concurrent run limit.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use flowforge_engine::{
    ActionStep, Engine, WorkflowBuilder, WorkflowContext, WorkflowError, WorkflowSettings,
};
use tokio_util::sync::CancellationToken;

fn limited_engine(max: u32) -> anyhow::Result<Engine> {
    Ok(Engine::new(
        WorkflowSettings::builder()
            .max_concurrent_workflows(max)
            .build()?,
    ))
}

#[tokio::test(start_paused = true)]
async fn never_exceeds_max_concurrent_workflows() -> anyhow::Result<()> {
    let engine = limited_engine(2)?;
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..6 {
        let engine = engine.clone();
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            let workflow = WorkflowBuilder::new()
                .name(format!("run-{i}"))
                .step(ActionStep::new("work", move |_, _| {
                    let running = Arc::clone(&running);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                }))
                .build()?;
            let ctx = WorkflowContext::new(&workflow);
            engine
                .execute(&workflow, &ctx, &CancellationToken::new())
                .await?;
            anyhow::Ok(())
        }));
    }

    for handle in handles {
        handle.await??;
    }

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(engine.available_slots(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancelling_while_waiting_for_a_slot_fails_fast() -> anyhow::Result<()> {
    let engine = limited_engine(1)?;
    let release = CancellationToken::new();

    let blocker = WorkflowBuilder::new()
        .name("blocker")
        .step(ActionStep::new("hold", |_, cancel| async move {
            cancel.cancelled().await;
            Ok(())
        }))
        .build()?;
    let holder = {
        let engine = engine.clone();
        let release = release.clone();
        tokio::spawn(async move {
            let ctx = WorkflowContext::new(&blocker);
            engine.execute(&blocker, &ctx, &release).await
        })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(engine.available_slots(), 0);

    let waiter = WorkflowBuilder::new()
        .name("waiter")
        .step(ActionStep::new("never", |ctx, _| async move {
            ctx.set("ran", true);
            Ok(())
        }))
        .build()?;
    let ctx = WorkflowContext::new(&waiter);
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let result = engine.execute(&waiter, &ctx, &cancel).await;

    assert!(matches!(result, Err(WorkflowError::Cancelled { .. })));
    assert!(!ctx.contains_key("ran"));

    release.cancel();
    let _ = holder.await?;
    assert_eq!(engine.available_slots(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slot_is_released_after_failure() -> anyhow::Result<()> {
    let engine = limited_engine(1)?;
    let workflow = WorkflowBuilder::new()
        .name("fails")
        .step(ActionStep::new("boom", |_, _| async {
            Err(flowforge_engine::StepError::msg("boom"))
        }))
        .build()?;

    for _ in 0..3 {
        let ctx = WorkflowContext::new(&workflow);
        let result = engine
            .execute(&workflow, &ctx, &CancellationToken::new())
            .await;
        assert!(result.is_err());
    }

    assert_eq!(engine.available_slots(), 1);
    Ok(())
}
