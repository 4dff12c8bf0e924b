use super::{into_cli_error, ui};
use crate::core::engine::ConversionEngine;
use crate::core::rate::ExchangeRate;
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;

/// Renders the latest quotes for one base currency.
pub fn display_latest(base: &str, rates: &[ExchangeRate]) -> String {
    if rates.is_empty() {
        return ui::style_text(&format!("No rates found for {base}"), ui::StyleType::Error);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Rate (per 1 {base})")),
    ]);
    for rate in rates {
        table.add_row(vec![
            Cell::new(&rate.target_currency),
            ui::decimal_cell(rate.rate),
        ]);
    }

    let as_of = rates
        .first()
        .map(|r| r.date.to_string())
        .unwrap_or_default();
    format!(
        "Latest rates for {} {}\n\n{}",
        ui::style_text(base, ui::StyleType::Title),
        ui::style_text(&format!("as of {as_of}"), ui::StyleType::Subtle),
        table
    )
}

/// Fetches every base concurrently and prints one table per base.
pub async fn run(engine: &ConversionEngine, bases: &[String]) -> Result<()> {
    let pb = ui::new_spinner("Fetching latest rates...");
    let results = join_all(bases.iter().map(|base| async move {
        (base.to_ascii_uppercase(), engine.get_latest_rates(base).await)
    }))
    .await;
    pb.finish_and_clear();

    let mut outputs = Vec::with_capacity(results.len());
    for (base, result) in results {
        let rates = result.map_err(into_cli_error)?;
        outputs.push(display_latest(&base, &rates));
    }
    println!("{}", outputs.join("\n\n"));
    Ok(())
}
