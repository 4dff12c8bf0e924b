use super::{into_cli_error, ui};
use crate::core::engine::ConversionEngine;
use crate::core::rate::ExchangeRate;
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalQuery {
    pub base: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub page: u32,
    pub page_size: u32,
}

pub fn display_historical(query: &HistoricalQuery, rates: &[ExchangeRate]) -> String {
    let title = format!(
        "Rates for {} from {} to {} (page {}, {} per page)",
        query.base.to_ascii_uppercase(),
        query.from,
        query.to,
        query.page,
        query.page_size
    );
    if rates.is_empty() {
        return format!(
            "{}\n\n{}",
            ui::style_text(&title, ui::StyleType::Title),
            ui::style_text("No rates found", ui::StyleType::Error)
        );
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Currency"),
        ui::header_cell("Rate"),
    ]);
    for rate in rates {
        table.add_row(vec![
            Cell::new(rate.date.to_string()),
            Cell::new(&rate.target_currency),
            ui::decimal_cell(rate.rate),
        ]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text(&title, ui::StyleType::Title),
        table
    )
}

pub async fn run(engine: &ConversionEngine, query: &HistoricalQuery) -> Result<()> {
    let pb = ui::new_spinner("Fetching historical rates...");
    let result = engine
        .get_historical_rates(&query.base, query.from, query.to, query.page, query.page_size)
        .await;
    pb.finish_and_clear();

    let rates = result.map_err(into_cli_error)?;
    println!("{}", display_historical(query, &rates));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn query() -> HistoricalQuery {
        HistoricalQuery {
            base: "usd".to_string(),
            from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            page: 2,
            page_size: 5,
        }
    }

    #[test]
    fn test_display_historical() {
        let rates = vec![ExchangeRate::new(
            "USD",
            "EUR",
            dec!(0.91),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        )];

        let output = display_historical(&query(), &rates);

        assert!(output.contains("Rates for USD from 2024-01-01 to 2024-01-31"));
        assert!(output.contains("page 2, 5 per page"));
        assert!(output.contains("2024-01-03"));
        assert!(output.contains("0.91"));
    }

    #[test]
    fn test_display_historical_empty_page() {
        let output = display_historical(&query(), &[]);
        assert!(output.contains("No rates found"));
    }
}
