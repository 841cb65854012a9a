use flowforge_engine::WorkflowSettings;

pub(crate) fn run(settings: &WorkflowSettings) {
    println!("auto-compensate = {}", settings.auto_compensate());
    println!(
        "continue-on-compensation-failure = {}",
        settings.continue_on_compensation_failure()
    );
    println!("compensation-retries = {}", settings.compensation_retries());
    println!(
        "max-concurrent-workflows = {}",
        settings.max_concurrent_workflows()
    );
}
