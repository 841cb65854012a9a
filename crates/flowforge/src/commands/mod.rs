mod list;
mod run;
mod settings;

use clap::{Args, Subcommand};
use flowforge_engine::WorkflowSettings;

use crate::error::Result;
use crate::scenarios::Scenario;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run one of the sample workflows
    Run(RunArgs),
    /// List the sample workflows
    List,
    /// Print the effective engine settings
    Settings,
}

#[derive(Args)]
pub(crate) struct RunArgs {
    /// Which sample to run
    #[arg(value_enum)]
    pub scenario: Scenario,

    /// Append a step that always fails, to watch compensation unwind the run
    #[arg(long)]
    pub fail: bool,

    /// Correlation id attached to every log line of the run
    #[arg(long)]
    pub correlation_id: Option<String>,
}

impl Commands {
    pub(crate) fn execute(self, settings: WorkflowSettings) -> Result<()> {
        match self {
            Self::Run(args) => run::run(args, settings),
            Self::List => {
                list::run();
                Ok(())
            }
            Self::Settings => {
                settings::run(&settings);
                Ok(())
            }
        }
    }
}
