use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use rust_decimal::Decimal;
use xrate::core::engine::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use xrate::core::log::init_logging;

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
    /// Show the latest rates for one or more base currencies
    Latest {
        /// Base currency codes, e.g. USD GBP
        #[arg(required = true)]
        bases: Vec<String>,
    },
    /// Show one page of historical rates
    Historical {
        /// Base currency code
        base: String,
        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last day of the range (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
    /// Convert an amount between two currencies
    Convert {
        amount: Decimal,
        from: String,
        to: String,
    },
}

impl From<Commands> for xrate::AppCommand {
    fn from(cmd: Commands) -> xrate::AppCommand {
        match cmd {
            Commands::Latest { bases } => xrate::AppCommand::Latest { bases },
            Commands::Historical {
                base,
                from,
                to,
                page,
                page_size,
            } => xrate::AppCommand::Historical {
                base,
                from,
                to,
                page,
                page_size,
            },
            Commands::Convert { amount, from, to } => {
                xrate::AppCommand::Convert { amount, from, to }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => xrate::cli::setup::setup_at_path(path),
            None => xrate::cli::setup::setup(),
        },
        Some(cmd) => xrate::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}
