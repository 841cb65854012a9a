use std::sync::Arc;

use flowforge_engine::{ActionStep, AuditLog, StepError, WorkflowContext, WorkflowSettings};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::RunArgs;
use crate::error::{CliError, Result};

pub(crate) fn run(args: RunArgs, settings: WorkflowSettings) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(execute(args, settings))
}

async fn execute(args: RunArgs, settings: WorkflowSettings) -> Result<()> {
    let engine = args.scenario.engine(settings)?;
    let audit = Arc::new(AuditLog::new());

    let mut builder = args.scenario.workflow(&engine)?.observer(audit.clone());
    if args.fail {
        builder = builder.step(ActionStep::new("inject-failure", |_, _| async {
            Err(StepError::msg("injected failure"))
        }));
    }
    let workflow = builder.build()?;

    let mut ctx = WorkflowContext::builder(&workflow);
    if let Some(correlation_id) = args.correlation_id {
        ctx = ctx.correlation_id(correlation_id);
    }
    let ctx = ctx.build();
    debug!(correlation_id = %ctx.correlation_id(), ?engine, "starting sample");

    println!("== {} ({} steps)", workflow.name(), workflow.len());
    let result = engine
        .execute(&workflow, &ctx, &CancellationToken::new())
        .await;

    println!("-- audit");
    println!("{}", audit.summary());
    if result.is_ok() {
        println!("== {} completed", workflow.name());
    }
    Ok(result?)
}
