use std::env;
use std::net::SocketAddr;

use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::reports::StreamOptions;

pub const DEFAULT_BIND: &str = "127.0.0.1:7080";
pub const DEFAULT_REPORT_PAGE_SIZE: usize = 200;
pub const MAX_REPORT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_REPORT_CHANNEL_CAPACITY: usize = 64;

/// Console server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub bind: SocketAddr,
    /// Overrides the scheme/host used in report detail URLs.
    pub public_url: Option<String>,
    pub report_page_size: usize,
    pub report_channel_capacity: usize,
    pub database_url: Option<String>,
    pub seed_demo: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 7080)),
            public_url: None,
            report_page_size: DEFAULT_REPORT_PAGE_SIZE,
            report_channel_capacity: DEFAULT_REPORT_CHANNEL_CAPACITY,
            database_url: None,
            seed_demo: false,
        }
    }
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_raw = lookup("CONSOLE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_raw.trim().parse().map_err(|err| {
            LibError::invalid(
                "CONSOLE_BIND must be a socket address",
                anyhow!("invalid CONSOLE_BIND '{bind_raw}': {err}"),
            )
        })?;

        let report_page_size = parse_usize(&lookup, "CONSOLE_REPORT_PAGE_SIZE")?
            .unwrap_or(DEFAULT_REPORT_PAGE_SIZE)
            .clamp(1, MAX_REPORT_PAGE_SIZE);
        let report_channel_capacity = parse_usize(&lookup, "CONSOLE_REPORT_CHANNEL_CAPACITY")?
            .unwrap_or(DEFAULT_REPORT_CHANNEL_CAPACITY)
            .max(1);

        Ok(Self {
            bind,
            public_url: non_empty(lookup("CONSOLE_PUBLIC_URL"))
                .map(|url| url.trim_end_matches('/').to_string()),
            report_page_size,
            report_channel_capacity,
            database_url: non_empty(lookup("DATABASE_URL")),
            seed_demo: lookup("CONSOLE_SEED_DEMO").is_some_and(|value| flag(&value)),
        })
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            page_size: u32::try_from(self.report_page_size).unwrap_or(u32::MAX),
            channel_capacity: self.report_channel_capacity,
        }
    }
}

fn parse_usize(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<usize>> {
    let Some(raw) = non_empty(lookup(name)) else {
        return Ok(None);
    };
    raw.trim().parse::<usize>().map(Some).map_err(|err| {
        LibError::invalid(
            "Report settings must be positive integers",
            anyhow!("invalid {name} '{raw}': {err}"),
        )
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn flag(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes"
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::ErrorKind;

    fn config(vars: &[(&str, &str)]) -> Result<ConsoleConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ConsoleConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).expect("defaults");
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let config = config(&[
            ("CONSOLE_BIND", "0.0.0.0:8080"),
            ("CONSOLE_PUBLIC_URL", "https://rhq.example.com/"),
            ("CONSOLE_REPORT_PAGE_SIZE", "50000"),
            ("CONSOLE_REPORT_CHANNEL_CAPACITY", "0"),
            ("CONSOLE_SEED_DEMO", "Yes"),
            ("DATABASE_URL", " "),
        ])
        .expect("config");

        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.public_url.as_deref(), Some("https://rhq.example.com"));
        assert_eq!(config.report_page_size, MAX_REPORT_PAGE_SIZE);
        assert_eq!(config.report_channel_capacity, 1);
        assert!(config.seed_demo);
        assert_eq!(config.database_url, None);
        assert_eq!(config.stream_options().page_size, 1000);
    }

    #[test]
    fn malformed_values_are_invalid_input() {
        let err = config(&[("CONSOLE_BIND", "nowhere")]).expect_err("bad bind");
        assert_eq!(err.kind, ErrorKind::InvalidInput);

        let err = config(&[("CONSOLE_REPORT_PAGE_SIZE", "-3")]).expect_err("bad size");
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }
}
