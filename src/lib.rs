pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::historical::HistoricalQuery;
use crate::core::config::AppConfig;
use crate::core::engine::ConversionEngine;
use crate::core::rate::ConversionRequest;
use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Latest {
        bases: Vec<String>,
    },
    Historical {
        base: String,
        from: NaiveDate,
        to: NaiveDate,
        page: u32,
        page_size: u32,
    },
    Convert {
        amount: Decimal,
        from: String,
        to: String,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("xrate starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let engine = ConversionEngine::from_config(&config)?;

    match command {
        AppCommand::Latest { bases } => cli::latest::run(&engine, &bases).await,
        AppCommand::Historical {
            base,
            from,
            to,
            page,
            page_size,
        } => {
            let query = HistoricalQuery {
                base,
                from,
                to,
                page,
                page_size,
            };
            cli::historical::run(&engine, &query).await
        }
        AppCommand::Convert { amount, from, to } => {
            let request = ConversionRequest::new(amount, &from, &to);
            cli::convert::run(&engine, &request).await
        }
    }
}
