//! built-in message layout used when no template file is configured

use crate::alert::{self, Alert, Data};

/// Renders the fixed structure message: a headline linking to the
/// alertmanager ui filtered by receiver, the grouping labels, the common
/// labels not already part of the grouping, the common annotations and one
/// detail entry per alert. All label iteration is sorted by key so the
/// output does not depend on map order.
pub fn render(batch: &Data) -> String {
    let group_labels: Vec<String> = sorted_keys(&batch.group_labels)
        .into_iter()
        .map(|key| format!("{}=<code>{}</code>", key, alert::display_value(&batch.group_labels[key])))
        .collect();

    let common_labels: Vec<String> = sorted_keys(&batch.common_labels)
        .into_iter()
        .filter(|key| !batch.group_labels.contains_key(*key))
        .map(|key| format!("{}=<code>{}</code>", key, alert::display_value(&batch.common_labels[key])))
        .collect();

    let common_annotations: Vec<String> = sorted_keys(&batch.common_annotations)
        .into_iter()
        .map(|key| {
            format!("\n{}: <code>{}</code>", key, alert::display_value(&batch.common_annotations[key]))
        })
        .collect();

    let details: Vec<String> = batch.alerts.iter().map(alert_detail).collect();

    format!(
        "<a href='{}/#/alerts?receiver={}'>[{}:{}]</a>\ngrouped by: {}\nlabels: {}{}\n{}",
        batch.external_url,
        batch.receiver,
        batch.status.to_uppercase(),
        batch.alerts.len(),
        group_labels.join(", "),
        common_labels.join(", "),
        common_annotations.join(""),
        details.join(", "),
    )
}

/// One short line per alert: the instance up to its port, the job in
/// brackets, linked to the generator url when there is one.
fn alert_detail(alert: &Alert) -> String {
    let mut detail = String::new();

    if let Some(instance) = alert::string_value(&alert.labels, "instance") {
        let host = instance.split(':').next().unwrap_or(instance);
        detail.push_str(host);
    }
    if let Some(job) = alert::string_value(&alert.labels, "job") {
        detail.push('[');
        detail.push_str(job);
        detail.push(']');
    }
    if !alert.generator_url.is_empty() {
        detail = format!("<a href='{}'>{}</a>", alert.generator_url, detail);
    }

    detail
}

fn sorted_keys(map: &std::collections::HashMap<String, serde_json::Value>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}
