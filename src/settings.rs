//! Server-wide system settings as edited on the administration page.
//!
//! Durations are stored in milliseconds and edited in the unit shown next to
//! each field; validation runs on the displayed values.

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::error::{LibError, Result};

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

pub const DEFAULT_BASE_URL: &str = "http://localhost:7080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayUnit {
    Minutes,
    Hours,
    Days,
}

impl DisplayUnit {
    const fn millis(self) -> i64 {
        match self {
            DisplayUnit::Minutes => MINUTE_MS,
            DisplayUnit::Hours => HOUR_MS,
            DisplayUnit::Days => DAY_MS,
        }
    }

    pub const fn to_millis(self, value: i64) -> i64 {
        value.saturating_mul(self.millis())
    }

    /// Truncates partial units, as the form only edits whole units.
    pub const fn from_millis(self, millis: i64) -> i64 {
        millis / self.millis()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettings {
    pub base_url: String,
    pub agent_max_quiet_time_ms: i64,
    pub session_timeout_ms: i64,
    pub agent_auto_update_enabled: bool,
    pub debug_mode_enabled: bool,
    pub login_without_roles_enabled: bool,
    pub data_maintenance_period_ms: i64,
    pub availability_purge_ms: i64,
    pub alert_purge_ms: i64,
    pub trait_purge_ms: i64,
    pub rt_data_purge_ms: i64,
    pub event_purge_ms: i64,
    pub drift_file_purge_ms: i64,
    pub data_reindex_nightly: bool,
    pub baseline_frequency_ms: i64,
    pub baseline_dataset_ms: i64,
    pub ldap_group_query_page_size: i64,
    pub http_proxy_host: Option<String>,
    pub http_proxy_port: i64,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            agent_max_quiet_time_ms: 5 * MINUTE_MS,
            session_timeout_ms: HOUR_MS,
            agent_auto_update_enabled: true,
            debug_mode_enabled: false,
            login_without_roles_enabled: false,
            data_maintenance_period_ms: HOUR_MS,
            availability_purge_ms: 365 * DAY_MS,
            alert_purge_ms: 31 * DAY_MS,
            trait_purge_ms: 365 * DAY_MS,
            rt_data_purge_ms: 31 * DAY_MS,
            event_purge_ms: 14 * DAY_MS,
            drift_file_purge_ms: 31 * DAY_MS,
            data_reindex_nightly: false,
            baseline_frequency_ms: 3 * DAY_MS,
            baseline_dataset_ms: 7 * DAY_MS,
            ldap_group_query_page_size: 1000,
            http_proxy_host: None,
            http_proxy_port: 0,
        }
    }
}

/// Range-checked numeric field of the settings form.
pub struct NumericSetting {
    pub name: &'static str,
    /// `None` for plain counts edited as stored.
    pub unit: Option<DisplayUnit>,
    pub min: i64,
    pub max: Option<i64>,
    read: fn(&SystemSettings) -> i64,
    write: fn(&mut SystemSettings, i64),
}

impl NumericSetting {
    pub fn display_value(&self, settings: &SystemSettings) -> i64 {
        let stored = (self.read)(settings);
        self.unit.map_or(stored, |unit| unit.from_millis(stored))
    }

    fn store(&self, settings: &mut SystemSettings, display_value: i64) {
        let stored = self
            .unit
            .map_or(display_value, |unit| unit.to_millis(display_value));
        (self.write)(settings, stored);
    }

    fn check(&self, settings: &SystemSettings) -> Option<FieldError> {
        let value = self.display_value(settings);
        let in_range = value >= self.min && self.max.is_none_or(|max| value <= max);
        if in_range {
            return None;
        }

        let message = match self.max {
            Some(max) => format!("must be between {} and {max}", self.min),
            None => format!("must be at least {}", self.min),
        };
        Some(FieldError {
            field: self.name,
            message,
        })
    }
}

macro_rules! numeric_setting {
    ($name:literal, $field:ident, $unit:expr, $min:expr, $max:expr) => {
        NumericSetting {
            name: $name,
            unit: $unit,
            min: $min,
            max: $max,
            read: |settings| settings.$field,
            write: |settings, value| settings.$field = value,
        }
    };
}

pub const NUMERIC_SETTINGS: &[NumericSetting] = &[
    numeric_setting!("agentMaxQuietTimeAllowed", agent_max_quiet_time_ms, Some(DisplayUnit::Minutes), 3, None),
    numeric_setting!("sessionTimeout", session_timeout_ms, Some(DisplayUnit::Hours), 1, None),
    numeric_setting!("dataMaintenancePeriod", data_maintenance_period_ms, Some(DisplayUnit::Hours), 1, None),
    numeric_setting!("availabilityPurge", availability_purge_ms, Some(DisplayUnit::Days), 1, None),
    numeric_setting!("alertPurge", alert_purge_ms, Some(DisplayUnit::Days), 1, None),
    numeric_setting!("traitPurge", trait_purge_ms, Some(DisplayUnit::Days), 1, None),
    numeric_setting!("rtDataPurge", rt_data_purge_ms, Some(DisplayUnit::Days), 1, None),
    numeric_setting!("eventPurge", event_purge_ms, Some(DisplayUnit::Days), 1, None),
    numeric_setting!("driftFilePurge", drift_file_purge_ms, Some(DisplayUnit::Days), 1, None),
    numeric_setting!("baselineFrequency", baseline_frequency_ms, Some(DisplayUnit::Days), 0, None),
    numeric_setting!("baselineDataset", baseline_dataset_ms, Some(DisplayUnit::Days), 1, Some(14)),
    numeric_setting!("ldapGroupQueryPageSize", ldap_group_query_page_size, None, 1, None),
    numeric_setting!("httpProxyPort", http_proxy_port, None, 0, Some(65535)),
];

pub fn numeric_setting(name: &str) -> Option<&'static NumericSetting> {
    NUMERIC_SETTINGS.iter().find(|setting| setting.name == name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl SystemSettings {
    pub fn display_value(&self, name: &str) -> Option<i64> {
        numeric_setting(name).map(|setting| setting.display_value(self))
    }

    /// Stores a value given in the field's display unit. Range checks happen in [`validate`](Self::validate).
    pub fn set_display_value(&mut self, name: &str, value: i64) -> Result<()> {
        let setting = numeric_setting(name).ok_or_else(|| {
            LibError::invalid("Unknown system setting", anyhow!("no numeric setting named {name}"))
        })?;
        setting.store(self, value);
        Ok(())
    }

    /// Every field error; empty when the form may be saved.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors: Vec<FieldError> = NUMERIC_SETTINGS
            .iter()
            .filter_map(|setting| setting.check(self))
            .collect();

        let base_url = self.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(FieldError {
                field: "baseUrl",
                message: "must be an http or https URL".to_string(),
            });
        }

        if self
            .http_proxy_host
            .as_deref()
            .is_some_and(|host| host.trim().is_empty())
        {
            errors.push(FieldError {
                field: "httpProxyHost",
                message: "must not be blank".to_string(),
            });
        }

        errors
    }

    pub fn can_save(&self) -> bool {
        self.validate().is_empty()
    }

    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(());
        }

        let fields: Vec<&str> = errors.iter().map(|error| error.field).collect();
        Err(LibError::invalid_with_code(
            "invalid_system_settings",
            "One or more system settings are invalid",
            anyhow!("invalid settings: {}", fields.join(", ")),
        ))
    }
}
