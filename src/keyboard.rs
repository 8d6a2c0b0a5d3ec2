//! derives the inline keyboard attached to outgoing messages
//!
//! Buttons come from per-alert label and annotation lookups driven by the
//! configured rules, plus one optional static default button. Layout and
//! dedup limits live in the config and are enforced here.

use std::collections::HashSet;

use serde::Deserialize;
use url::Url;

use crate::alert::{self, Alert, Data};

/// one configured button rule
#[derive(Debug, Clone, Deserialize)]
pub struct AlertButton {
    /// label or annotation key holding the target url; the reserved key
    /// `generatorURL` falls through to the alert's generator url field
    pub key: String,
    /// visible text, with `{index}`, `{value}` and `{alertname}` placeholders
    pub text_template: String,
    /// reserved for templated urls, not consulted by the builder yet
    #[serde(default)]
    #[allow(dead_code)]
    pub url_template: String,
}

/// button configuration, loaded once and read-only afterwards
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ButtonsSettings {
    pub default_button_name: Option<String>,
    pub default_button_url: Option<String>,
    pub alert_buttons: Vec<AlertButton>,
    pub max_buttons_per_row: usize,
    pub max_total_buttons: usize,
}

impl Default for ButtonsSettings {
    fn default() -> Self {
        Self {
            default_button_name: None,
            default_button_url: None,
            alert_buttons: Vec::new(),
            max_buttons_per_row: 3,
            max_total_buttons: 10,
        }
    }
}

/// one link button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub url: String,
}

/// ordered rows of link buttons; never empty when present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

/// Builds the keyboard for one batch, or `None` when no button applies so
/// delivery can omit the reply markup entirely.
///
/// The default button comes first and counts toward the total. Alerts are
/// walked in order, rules in configured order; a candidate url is deduped on
/// `(url, alert index, rule key)` so the same link may still appear once per
/// alert. Rows are closed at `max_buttons_per_row` and building stops as
/// soon as `max_total_buttons` is reached.
pub fn build(batch: &Data, spec: &ButtonsSettings) -> Option<Keyboard> {
    let mut rows: Vec<Vec<Button>> = Vec::new();
    let mut row: Vec<Button> = Vec::new();
    let mut total = 0;

    if let (Some(name), Some(url)) = (
        spec.default_button_name.as_deref(),
        spec.default_button_url.as_deref(),
    ) {
        if !name.is_empty() && is_valid_url(url) {
            row.push(Button {
                text: name.to_string(),
                url: url.to_string(),
            });
            total += 1;
        }
    }

    let mut seen: HashSet<(String, usize, String)> = HashSet::new();

    'alerts: for (index, alert) in batch.alerts.iter().enumerate() {
        if total >= spec.max_total_buttons {
            break;
        }

        for rule in &spec.alert_buttons {
            if total >= spec.max_total_buttons {
                break 'alerts;
            }

            let url = match resolve_url(alert, &rule.key) {
                Some(url) if is_valid_url(&url) => url,
                _ => continue,
            };

            if !seen.insert((url.clone(), index, rule.key.clone())) {
                continue;
            }

            let text = button_text(&rule.text_template, index + 1, &url, alert);
            row.push(Button { text, url });
            total += 1;

            if row.len() >= spec.max_buttons_per_row {
                rows.push(std::mem::take(&mut row));
            }
        }
    }

    if !row.is_empty() {
        rows.push(row);
    }

    if rows.is_empty() {
        None
    } else {
        Some(Keyboard { rows })
    }
}

/// Candidate url for a rule: labels first, then annotations, then the
/// generator url for the reserved key. String values only.
fn resolve_url(alert: &Alert, key: &str) -> Option<String> {
    if let Some(value) = alert::string_value(&alert.labels, key) {
        return Some(value.to_string());
    }
    if let Some(value) = alert::string_value(&alert.annotations, key) {
        return Some(value.to_string());
    }
    if key == "generatorURL" && !alert.generator_url.is_empty() {
        return Some(alert.generator_url.clone());
    }
    None
}

/// Literal placeholder substitution; unrecognized placeholders stay intact.
fn button_text(template: &str, index: usize, url: &str, alert: &Alert) -> String {
    let mut text = template.replace("{index}", &index.to_string());
    text = text.replace("{value}", url);
    if let Some(name) = alert::string_value(&alert.labels, "alertname") {
        text = text.replace("{alertname}", name);
    }
    text
}

fn is_valid_url(input: &str) -> bool {
    match Url::parse(input) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
