//! tracing setup for the whole process

use std::str::FromStr;

use anyhow::Result;
use serde::Deserialize;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: String::from("info"),
        }
    }
}

pub fn setup_logging(settings: &LogSettings) -> Result<()> {
    // invalid levels fall back to info instead of refusing to start
    let level = tracing::Level::from_str(&settings.level).unwrap_or(tracing::Level::INFO);

    let fmt_layer = fmt::layer();

    let filter_layer = EnvFilter::default()
        .add_directive(LevelFilter::from_level(level).into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    Ok(())
}
