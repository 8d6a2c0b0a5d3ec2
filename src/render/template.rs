//! tera backed rendering for user supplied templates

use std::{collections::HashMap, sync::Mutex};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tera::Tera;

use crate::{alert::Data, render::functions, settings::Settings};

/// name the template file is registered under
const TEMPLATE_NAME: &str = "message";

/// Renders batches through a user supplied tera template with the formatting
/// helpers bound as filters and functions.
///
/// In debug mode the template file is reparsed before every render so it can
/// be edited live; production parses it once here and shares the instance
/// between requests.
pub struct TemplateRenderer {
    path: String,
    debug: bool,
    zone: Option<chrono_tz::Tz>,
    date_format: Option<String>,
    tera: Mutex<Tera>,
}

impl TemplateRenderer {
    /// Parses the configured template; any problem is a startup error.
    pub fn new(settings: &Settings) -> Result<Self> {
        let path = settings
            .template_path
            .clone()
            .context("template renderer needs template_path")?;

        let zone = match &settings.time_zone {
            Some(zone) => Some(
                zone.parse::<chrono_tz::Tz>()
                    .map_err(|err| anyhow!("unknown time_zone {zone}: {err}"))?,
            ),
            None => None,
        };

        let mut renderer = Self {
            path,
            debug: settings.debug,
            zone,
            date_format: settings.date_format.clone(),
            tera: Mutex::new(Tera::default()),
        };
        renderer.tera = Mutex::new(renderer.load()?);

        Ok(renderer)
    }

    /// Executes the template against the serialized batch. Errors here mean
    /// a broken deployment, the caller is expected to treat them as fatal.
    pub fn render(&self, batch: &Data) -> Result<String> {
        let context =
            tera::Context::from_serialize(batch).context("could not build template context")?;

        let mut tera = self.tera.lock().expect("template lock poisoned");

        if self.debug {
            tracing::debug!("reloading template");
            *tera = self.load()?;
        }

        tera.render(TEMPLATE_NAME, &context)
            .context("template execution failed")
    }

    /// Parses the template file and binds the helper registry.
    fn load(&self) -> Result<Tera> {
        let mut tera = Tera::default();
        tera.add_template_file(&self.path, Some(TEMPLATE_NAME))
            .context("could not parse template file")?;

        self.register_helpers(&mut tera);

        tracing::info!(path = %self.path, "loaded template file");
        Ok(tera)
    }

    /// Binds the pure helpers from [functions] to this tera instance. Case
    /// folding (`upper`, `lower`, `title`) is covered by tera builtins.
    fn register_helpers(&self, tera: &mut Tera) {
        let debug = self.debug;
        tera.register_filter(
            "format_measure_unit",
            move |value: &Value, args: &HashMap<String, Value>| -> tera::Result<Value> {
                let spec = match args.get("spec").and_then(Value::as_str) {
                    Some(spec) => spec,
                    None => return Err(tera::Error::msg("format_measure_unit needs a spec argument")),
                };

                match functions::format_measure_unit(spec, &lexical(value)) {
                    Ok(formatted) => Ok(Value::String(formatted)),
                    Err(err) => {
                        tracing::error!(error = %err, spec, "bad measure unit spec");
                        if debug {
                            // a broken spec should be caught while editing
                            Err(tera::Error::msg(err.to_string()))
                        } else {
                            Ok(Value::String(String::new()))
                        }
                    }
                }
            },
        );

        tera.register_filter(
            "format_float",
            |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
                Ok(Value::String(functions::format_float(&lexical(value))))
            },
        );

        tera.register_filter(
            "format_int",
            |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
                Ok(Value::String(functions::format_int(&lexical(value))))
            },
        );

        let zone = self.zone;
        let date_format = self.date_format.clone();
        tera.register_filter(
            "format_date",
            move |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
                let zone = match zone {
                    Some(zone) => zone,
                    None => {
                        return Err(tera::Error::msg(
                            "time_zone must be configured to use format_date",
                        ))
                    }
                };
                let pattern = match &date_format {
                    Some(pattern) => pattern,
                    None => {
                        return Err(tera::Error::msg(
                            "date_format must be configured to use format_date",
                        ))
                    }
                };

                Ok(Value::String(functions::format_date(
                    &lexical(value),
                    zone,
                    pattern,
                )))
            },
        );

        tera.register_filter(
            "title_words",
            |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
                Ok(Value::String(functions::title(&lexical(value))))
            },
        );

        tera.register_function(
            "contains",
            |args: &HashMap<String, Value>| -> tera::Result<Value> {
                let haystack = args.get("s").and_then(Value::as_str).unwrap_or_default();
                let needle = args.get("sub").and_then(Value::as_str).unwrap_or_default();
                Ok(Value::Bool(functions::contains(haystack, needle)))
            },
        );

        tera.register_function(
            "has_key",
            |args: &HashMap<String, Value>| -> tera::Result<Value> {
                let map = args.get("map").cloned().unwrap_or(Value::Null);
                let key = args.get("key").and_then(Value::as_str).unwrap_or_default();
                Ok(Value::Bool(functions::has_key(&map, key)))
            },
        );

        tera.register_function(
            "add",
            |args: &HashMap<String, Value>| -> tera::Result<Value> {
                let a = args.get("a").and_then(Value::as_i64).unwrap_or_default();
                let b = args.get("b").and_then(Value::as_i64).unwrap_or_default();
                Ok(Value::from(functions::add(a, b)))
            },
        );
    }
}

/// String form of a template value for the formatting helpers: strings stay
/// as they are, numbers print plainly, anything else serializes to json.
fn lexical(value: &Value) -> String {
    match value {
        Value::String(value) => value.clone(),
        Value::Number(value) => value.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn settings_for(template: &str) -> (Settings, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(template.as_bytes()).unwrap();
        file.flush().unwrap();

        let settings = Settings {
            template_path: Some(file.path().to_string_lossy().into_owned()),
            time_zone: Some(String::from("Europe/Rome")),
            date_format: Some(String::from("%Y-%m-%d %H:%M")),
            ..Settings::default()
        };

        (settings, file)
    }

    fn batch() -> Data {
        serde_json::from_value(serde_json::json!({
            "status": "firing",
            "alerts": [{
                "labels": { "alertname": "HighLoad", "mem": "2048" },
                "startsAt": "2024-06-01T12:00:00Z"
            }]
        }))
        .unwrap()
    }

    #[test]
    fn renders_with_the_helper_registry() {
        let (settings, _file) = settings_for(
            "{{ status | upper }}: {{ alerts.0.labels.mem | format_measure_unit(spec=\"kb|/s\") }} \
             at {{ alerts.0.startsAt | format_date }} ({{ add(a=1, b=2) }})",
        );

        let renderer = TemplateRenderer::new(&settings).unwrap();
        let rendered = renderer.render(&batch()).unwrap();

        assert_eq!(rendered, "FIRING: 2.00 Mb/s at 2024-06-01 14:00 (3)");
    }

    #[test]
    fn has_key_and_contains_are_available() {
        let (settings, _file) = settings_for(
            "{% if has_key(map=alerts.0.labels, key=\"alertname\") %}named{% endif %}\
             {% if contains(s=status, sub=\"fir\") %}-firing{% endif %}",
        );

        let renderer = TemplateRenderer::new(&settings).unwrap();
        assert_eq!(renderer.render(&batch()).unwrap(), "named-firing");
    }

    #[test]
    fn execution_error_surfaces_as_err() {
        let (settings, _file) = settings_for("{{ no_such_function() }}");

        let renderer = TemplateRenderer::new(&settings).unwrap();
        assert!(renderer.render(&batch()).is_err());
    }

    #[test]
    fn missing_date_config_fails_at_first_use() {
        let (mut settings, _file) = settings_for("{{ alerts.0.startsAt | format_date }}");
        settings.date_format = None;

        let renderer = TemplateRenderer::new(&settings).unwrap();
        assert!(renderer.render(&batch()).is_err());
    }

    #[test]
    fn parse_error_is_a_startup_error() {
        let (settings, _file) = settings_for("{% if unclosed %}");
        assert!(TemplateRenderer::new(&settings).is_err());
    }

    #[test]
    fn debug_mode_reloads_the_template_between_renders() {
        let (mut settings, mut file) = settings_for("before");
        settings.debug = true;

        let renderer = TemplateRenderer::new(&settings).unwrap();
        assert_eq!(renderer.render(&batch()).unwrap(), "before");

        file.as_file_mut().set_len(0).unwrap();
        use std::io::Seek;
        file.as_file_mut().rewind().unwrap();
        file.write_all(b"after").unwrap();
        file.flush().unwrap();

        assert_eq!(renderer.render(&batch()).unwrap(), "after");
    }

    #[test]
    fn production_mode_keeps_the_parsed_template() {
        let (mut settings, mut file) = settings_for("pinned");
        settings.debug = false;

        let renderer = TemplateRenderer::new(&settings).unwrap();
        file.write_all(b" changed").unwrap();
        file.flush().unwrap();

        assert_eq!(renderer.render(&batch()).unwrap(), "pinned");
    }
}
