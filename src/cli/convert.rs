use super::{into_cli_error, ui};
use crate::core::engine::ConversionEngine;
use crate::core::error::RateError;
use crate::core::rate::{ConversionRequest, ConversionResult};
use anyhow::Result;
use rust_decimal::Decimal;

/// Amounts are shown with at most this many decimal places.
const DISPLAY_SCALE: u32 = 4;

pub fn display_conversion(amount: Decimal, result: &ConversionResult) -> String {
    let converted = result.converted_amount.round_dp(DISPLAY_SCALE).normalize();
    format!(
        "{} {} = {}\n{}",
        amount.normalize(),
        result.from_currency,
        ui::style_text(
            &format!("{converted} {}", result.to_currency),
            ui::StyleType::TotalValue
        ),
        ui::style_text(
            &format!(
                "1 {} = {} {} ({})",
                result.from_currency,
                result.rate.round_dp(6).normalize(),
                result.to_currency,
                result.date.format("%Y-%m-%d %H:%M UTC")
            ),
            ui::StyleType::Subtle
        )
    )
}

pub async fn run(engine: &ConversionEngine, request: &ConversionRequest) -> Result<()> {
    let pb = ui::new_spinner("Converting...");
    let result = engine.convert(request).await;
    pb.finish_and_clear();

    match result {
        Ok(result) => println!("{}", display_conversion(request.amount, &result)),
        // a missing path is an empty result, not a failure of the command
        Err(RateError::ConversionPathNotFound { from, to }) => println!(
            "{}",
            ui::style_text(
                &format!("Conversion from {from} to {to} is not available"),
                ui::StyleType::Error
            )
        ),
        Err(e) => return Err(into_cli_error(e)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_display_conversion() {
        let result = ConversionResult {
            converted_amount: dec!(13333.333333333),
            from_currency: "GBP".to_string(),
            to_currency: "JPY".to_string(),
            rate: dec!(133.33333333),
            date: Utc::now(),
        };

        let output = display_conversion(dec!(100.00), &result);

        assert!(output.contains("100 GBP"));
        assert!(output.contains("13333.3333 JPY"));
        assert!(output.contains("1 GBP = 133.333333 JPY"));
    }
}
