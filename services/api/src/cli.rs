use crate::demo::{run_demo, run_goal_targets, DemoArgs, GoalTargetsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};

use cadence_ai::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Cadence CRM Orchestrator",
    about = "Run the follow-up, scoring, and daily-flow backend from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Compensation-plan goal math
    Goal {
        #[command(subcommand)]
        command: GoalCommand,
    },
    /// Run an end-to-end CLI demo covering enrollment, scoring, and goals
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum GoalCommand {
    /// Derive weekly/daily activity targets for an income or rank goal
    Targets(GoalTargetsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Goal {
            command: GoalCommand::Targets(args),
        } => run_goal_targets(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
