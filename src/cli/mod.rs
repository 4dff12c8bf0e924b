//! Terminal front end over the conversion engine

pub mod convert;
pub mod historical;
pub mod latest;
pub mod setup;
pub mod ui;

use crate::core::error::RateError;

/// Maps engine errors to command errors; caller mistakes read as rejections.
pub fn into_cli_error(err: RateError) -> anyhow::Error {
    if err.is_client_error() {
        anyhow::anyhow!("Request rejected: {err}")
    } else {
        anyhow::Error::new(err)
    }
}
