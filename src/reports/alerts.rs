//! Alert vocabulary and the human-readable condition text used in alert reports.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertPriority {
    High,
    Medium,
    Low,
}

impl AlertPriority {
    pub const ALL: [AlertPriority; 3] = [AlertPriority::High, AlertPriority::Medium, AlertPriority::Low];

    pub const fn display_name(self) -> &'static str {
        match self {
            AlertPriority::High => "High",
            AlertPriority::Medium => "Medium",
            AlertPriority::Low => "Low",
        }
    }

    pub const fn as_db_value(self) -> &'static str {
        match self {
            AlertPriority::High => "HIGH",
            AlertPriority::Medium => "MEDIUM",
            AlertPriority::Low => "LOW",
        }
    }

    /// Case-insensitive, as typed into report filters.
    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Some(AlertPriority::High),
            "MEDIUM" => Some(AlertPriority::Medium),
            "LOW" => Some(AlertPriority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityChange {
    GoesDisabled,
    GoesDown,
    GoesUnknown,
    GoesUp,
    GoesNotUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationState {
    Down,
    NotUp,
}

/// `<` and `>` are exclusive, `<=` and `>=` inclusive. The lower of each pair
/// means "inside the range".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeComparator {
    InsideExclusive,
    OutsideExclusive,
    InsideInclusive,
    OutsideInclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Grows,
    Shrinks,
    Changes,
}

impl ChangeDirection {
    const fn text(self) -> &'static str {
        match self {
            ChangeDirection::Grows => "Grows",
            ChangeDirection::Shrinks => "Shrinks",
            ChangeDirection::Changes => "Changes",
        }
    }
}

/// One alert condition. Thresholds arrive already formatted with their units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum AlertCondition {
    Availability {
        change: AvailabilityChange,
    },
    AvailabilityDuration {
        state: DurationState,
        seconds: i64,
    },
    Threshold {
        metric: String,
        comparator: String,
        threshold: String,
    },
    CallTimeThreshold {
        metric: Option<String>,
        statistic: String,
        comparator: String,
        threshold: String,
        destination: Option<String>,
    },
    Baseline {
        metric: String,
        comparator: String,
        percentage: String,
        baseline: String,
    },
    Change {
        metric: String,
    },
    CallTimeChange {
        metric: Option<String>,
        statistic: String,
        direction: ChangeDirection,
        percentage: String,
        destination: Option<String>,
    },
    Trait {
        name: String,
        pattern: Option<String>,
    },
    Operation {
        name: String,
        status: String,
    },
    ResourceConfiguration,
    Event {
        severity: String,
        source_pattern: Option<String>,
    },
    Drift {
        definition_pattern: Option<String>,
        path_pattern: Option<String>,
    },
    Range {
        metric: String,
        comparator: RangeComparator,
        low: String,
        high: String,
    },
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

impl AlertCondition {
    pub fn text(&self) -> String {
        match self {
            AlertCondition::Availability { change } => {
                let change = match change {
                    AvailabilityChange::GoesDisabled => "Goes disabled",
                    AvailabilityChange::GoesDown => "Goes down",
                    AvailabilityChange::GoesUnknown => "Goes unknown",
                    AvailabilityChange::GoesUp => "Goes up",
                    AvailabilityChange::GoesNotUp => "Goes not up",
                };
                format!("Availability [{change}]")
            }
            AlertCondition::AvailabilityDuration { state, seconds } => {
                let state = match state {
                    DurationState::Down => "Stays Down",
                    DurationState::NotUp => "Stays Not Up",
                };
                format!("Availability Duration [{state} For {}m]", seconds / 60)
            }
            AlertCondition::Threshold {
                metric,
                comparator,
                threshold,
            } => format!("Metric Value Threshold [{metric} {comparator} {threshold}]"),
            AlertCondition::CallTimeThreshold {
                metric,
                statistic,
                comparator,
                threshold,
                destination,
            } => {
                let mut text = String::from("Call Time Value Threshold [");
                if let Some(metric) = metric {
                    text.push_str(metric);
                    text.push(' ');
                }
                text.push_str(&format!("{statistic} {comparator} {threshold}]"));
                push_destination(&mut text, destination);
                text
            }
            AlertCondition::Baseline {
                metric,
                comparator,
                percentage,
                baseline,
            } => format!("Metric Value Baseline [{metric} {comparator} {percentage} of {baseline}]"),
            AlertCondition::Change { metric } => format!("Metric Value Change [{metric} ]"),
            AlertCondition::CallTimeChange {
                metric,
                statistic,
                direction,
                percentage,
                destination,
            } => {
                let mut text = String::from("Call Time Value Changes [");
                if let Some(metric) = metric {
                    text.push_str(metric);
                    text.push(' ');
                }
                text.push_str(&format!("{statistic} {} by at least {percentage}]", direction.text()));
                push_destination(&mut text, destination);
                text
            }
            AlertCondition::Trait { name, pattern } => {
                let mut text = format!("Trait Change [{name}]");
                if let Some(pattern) = non_empty(pattern) {
                    text.push_str(&format!(" with trait value matching '{pattern}'"));
                }
                text
            }
            AlertCondition::Operation { name, status } => {
                format!("Operation Execution [{name}] with result status [{status}]")
            }
            AlertCondition::ResourceConfiguration => "Resource Configuration Change".to_string(),
            AlertCondition::Event {
                severity,
                source_pattern,
            } => {
                let mut text = format!("Event Detection [{severity}]");
                if let Some(pattern) = non_empty(source_pattern) {
                    text.push_str(&format!(" with event source matching '{pattern}'"));
                }
                text
            }
            AlertCondition::Drift {
                definition_pattern,
                path_pattern,
            } => match (non_empty(definition_pattern), non_empty(path_pattern)) {
                (None, None) => "Drift Detection".to_string(),
                (None, Some(path)) => format!("Drift Detection for files that match \"{path}\""),
                (Some(definition), None) => {
                    format!("Drift Detection for drift definition [{definition}]")
                }
                (Some(definition), Some(path)) => format!(
                    "Drift Detection for files that match \"{path}\" and for drift detection [{definition}]"
                ),
            },
            AlertCondition::Range {
                metric,
                comparator,
                low,
                high,
            } => {
                let (relation, bound) = match comparator {
                    RangeComparator::InsideExclusive => ("between", "exclusive"),
                    RangeComparator::OutsideExclusive => ("outside", "exclusive"),
                    RangeComparator::InsideInclusive => ("between", "inclusive"),
                    RangeComparator::OutsideInclusive => ("outside", "inclusive"),
                };
                format!("Metric Value Range: [{metric}] {relation} [{low}] and [{high}], {bound}")
            }
        }
    }
}

fn push_destination(text: &mut String, destination: &Option<String>) {
    if let Some(destination) = non_empty(destination) {
        text.push_str(&format!(" with call destination matching '{destination}'"));
    }
}

/// Text for the condition column: a single condition is spelled out.
pub fn condition_text(conditions: &[AlertCondition]) -> String {
    match conditions {
        [] => "No Conditions".to_string(),
        [condition] => condition.text(),
        _ => "Multiple Conditions".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_parse_case_insensitively() {
        assert_eq!(AlertPriority::from_name(" high"), Some(AlertPriority::High));
        assert_eq!(AlertPriority::from_name("Low"), Some(AlertPriority::Low));
        assert_eq!(AlertPriority::from_name("urgent"), None);
    }

    #[test]
    fn condition_column_summarizes_counts() {
        let down = AlertCondition::Availability {
            change: AvailabilityChange::GoesDown,
        };
        assert_eq!(condition_text(&[]), "No Conditions");
        assert_eq!(condition_text(std::slice::from_ref(&down)), "Availability [Goes down]");
        assert_eq!(
            condition_text(&[down, AlertCondition::ResourceConfiguration]),
            "Multiple Conditions"
        );
    }

    #[test]
    fn conditions_render_their_details() {
        let duration = AlertCondition::AvailabilityDuration {
            state: DurationState::NotUp,
            seconds: 600,
        };
        assert_eq!(duration.text(), "Availability Duration [Stays Not Up For 10m]");

        let call_time = AlertCondition::CallTimeChange {
            metric: Some("Request Time".into()),
            statistic: "MAX".into(),
            direction: ChangeDirection::Grows,
            percentage: "20%".into(),
            destination: Some("/shop".into()),
        };
        assert_eq!(
            call_time.text(),
            "Call Time Value Changes [Request Time MAX Grows by at least 20%] with call destination matching '/shop'"
        );

        let drift = AlertCondition::Drift {
            definition_pattern: Some("etc".into()),
            path_pattern: Some(String::new()),
        };
        assert_eq!(drift.text(), "Drift Detection for drift definition [etc]");

        let range = AlertCondition::Range {
            metric: "Heap".into(),
            comparator: RangeComparator::OutsideInclusive,
            low: "1MB".into(),
            high: "2MB".into(),
        };
        assert_eq!(
            range.text(),
            "Metric Value Range: [Heap] outside [1MB] and [2MB], inclusive"
        );
    }
}
