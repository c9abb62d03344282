use crate::admin::{self, StoreArgs};
use crate::server;
use chat_poll::error::AppError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "chat-poll-bot",
    about = "Run the chat poll bot or inspect and administer its election store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the webhook service (default command)
    Serve(ServeArgs),
    /// Print election results straight from the store
    Results {
        #[command(subcommand)]
        command: ResultsCommand,
    },
    /// Manage candidate registration
    Registration {
        #[command(subcommand)]
        command: RegistrationCommand,
    },
    /// Whole-election maintenance
    Election {
        #[command(subcommand)]
        command: ElectionCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ResultsCommand {
    /// Vote counts per candidate, highest first
    Tally(StoreArgs),
    /// Registered candidates in registration order
    Candidates(StoreArgs),
    /// Voters grouped by the candidate they chose
    Voters(StoreArgs),
}

#[derive(Subcommand, Debug)]
enum RegistrationCommand {
    /// Close candidate registration
    Close(StoreArgs),
}

#[derive(Subcommand, Debug)]
enum ElectionCommand {
    /// Drop candidates, votes and the registration flag
    Reset(StoreArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the configured SQLite database path
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Results { command } => match command {
            ResultsCommand::Tally(args) => admin::print_tally(args),
            ResultsCommand::Candidates(args) => admin::print_candidates(args),
            ResultsCommand::Voters(args) => admin::print_voters(args),
        },
        Command::Registration {
            command: RegistrationCommand::Close(args),
        } => admin::close_registration(args),
        Command::Election {
            command: ElectionCommand::Reset(args),
        } => admin::reset_election(args),
    }
}
