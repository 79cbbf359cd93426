use crate::commands::{run_allocate, run_scenarios, AllocateArgs, ScenariosArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use mansion_tax::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "mansion-tax",
    about = "Allocate national high-value property tax estimates to constituencies",
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
    /// Allocate the national stock across constituencies and price every scenario
    Allocate(AllocateArgs),
    /// List the configured rate scenarios and their national revenue
    Scenarios(ScenariosArgs),
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
        Command::Allocate(args) => run_allocate(args),
        Command::Scenarios(args) => run_scenarios(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_flags_parse() {
        let cli = Cli::try_parse_from([
            "mansion-tax",
            "allocate",
            "--data-dir",
            "data/sample",
            "--scenario",
            "moderate",
            "--top",
            "5",
            "--json",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Allocate(args)) => {
                assert_eq!(args.scenario.as_deref(), Some("moderate"));
                assert_eq!(args.top, Some(5));
                assert!(args.json);
                assert!(args.export_dir.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["mansion-tax"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
