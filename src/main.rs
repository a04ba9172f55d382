use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use fundwatch::AppCommand;
use fundwatch::core::log::init_logging;
use fundwatch::core::{Holding, InstrumentCode};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show current valuations for the given codes
    Quote {
        #[arg(required = true)]
        codes: Vec<InstrumentCode>,
    },
    /// Show the major market indices
    Indices,
    /// Keep refreshing valuations until interrupted
    Watch {
        /// Codes to watch, defaults to favorites
        codes: Vec<InstrumentCode>,
        /// Seconds between refreshes
        #[arg(short, long)]
        interval: Option<u64>,
        /// Exit after this many refreshes
        #[arg(short, long)]
        updates: Option<usize>,
    },
    /// Manage favorite codes
    #[command(subcommand)]
    Favorites(FavoritesCommand),
    /// Manage holdings
    #[command(subcommand)]
    Holdings(HoldingsCommand),
    /// Remove all favorites and holdings
    Reset,
}

#[derive(Subcommand)]
enum FavoritesCommand {
    /// List favorites with their valuations
    List,
    /// Add a code to favorites
    Add { code: InstrumentCode },
    /// Remove a code from favorites
    Remove { code: InstrumentCode },
}

#[derive(Args)]
struct HoldingArgs {
    code: InstrumentCode,
    /// Cost price per share
    #[arg(long)]
    cost: f64,
    /// Number of shares held
    #[arg(long)]
    amount: f64,
    /// Total amount paid, defaults to cost * amount
    #[arg(long)]
    total_cost: Option<f64>,
}

impl TryFrom<HoldingArgs> for Holding {
    type Error = anyhow::Error;

    fn try_from(args: HoldingArgs) -> Result<Holding> {
        Holding::new(args.code, args.cost, args.amount, args.total_cost)
    }
}

#[derive(Subcommand)]
enum HoldingsCommand {
    /// List holdings with value and profit
    List,
    /// Add a holding
    Add(HoldingArgs),
    /// Replace an existing holding
    Update(HoldingArgs),
    /// Remove a holding
    Remove { code: InstrumentCode },
}

impl TryFrom<Commands> for AppCommand {
    type Error = anyhow::Error;

    fn try_from(cmd: Commands) -> Result<AppCommand> {
        let command = match cmd {
            Commands::Quote { codes } => AppCommand::Quote { codes },
            Commands::Indices => AppCommand::Indices,
            Commands::Watch {
                codes,
                interval,
                updates,
            } => AppCommand::Watch {
                codes,
                interval,
                updates,
            },
            Commands::Favorites(FavoritesCommand::List) => AppCommand::FavoritesList,
            Commands::Favorites(FavoritesCommand::Add { code }) => AppCommand::FavoritesAdd { code },
            Commands::Favorites(FavoritesCommand::Remove { code }) => {
                AppCommand::FavoritesRemove { code }
            }
            Commands::Holdings(HoldingsCommand::List) => AppCommand::HoldingsList,
            Commands::Holdings(HoldingsCommand::Add(args)) => AppCommand::HoldingsAdd {
                holding: args.try_into()?,
            },
            Commands::Holdings(HoldingsCommand::Update(args)) => AppCommand::HoldingsUpdate {
                holding: args.try_into()?,
            },
            Commands::Holdings(HoldingsCommand::Remove { code }) => {
                AppCommand::HoldingsRemove { code }
            }
            Commands::Reset => AppCommand::Reset,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        };
        Ok(command)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => fundwatch::cli::setup::setup_at_path(path),
            None => fundwatch::cli::setup::setup(),
        },
        Some(cmd) => match AppCommand::try_from(cmd) {
            Ok(command) => fundwatch::run_command(command, cli.config_path.as_deref()).await,
            Err(e) => Err(e),
        },
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
