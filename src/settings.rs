//! configuration loading: command line arguments plus a yaml config file
//!
//! Settings are loaded once at startup into an immutable value that gets
//! passed (behind an `Arc`) to everything that needs it. Validation problems
//! abort startup here, before any task is spawned.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{bail, Context, Result};
use clap::{Arg, Command};
use serde::Deserialize;

use crate::{keyboard::ButtonsSettings, log::LogSettings};

/// telegram caps messages at 4096 code points, keep headroom for markup
pub const DEFAULT_SPLIT_CHARS: usize = 4000;

/// address the webhook receiver binds to
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenSettings {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 9087,
        }
    }
}

impl ListenSettings {
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub telegram_token: String,
    /// path of a tera template; unset selects the standard message layout
    pub template_path: Option<String>,
    /// iana zone name for the format_date helper, e.g. "Europe/Rome"
    pub time_zone: Option<String>,
    /// strftime pattern for the format_date helper
    pub date_format: Option<String>,
    /// chunk size in code points, not bytes
    pub split_message_chars: usize,
    /// suppress the update listener, only push messages
    pub send_only: bool,
    pub disable_notification: bool,
    pub listen: ListenSettings,
    pub log: LogSettings,
    pub buttons: ButtonsSettings,
    /// set from the command line, never from the config file: reload the
    /// template before every render for live editing
    #[serde(skip)]
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            template_path: None,
            time_zone: None,
            date_format: None,
            split_message_chars: DEFAULT_SPLIT_CHARS,
            send_only: false,
            disable_notification: false,
            listen: ListenSettings::default(),
            log: LogSettings::default(),
            buttons: ButtonsSettings::default(),
            debug: false,
        }
    }
}

impl Settings {
    /// Loads the config file and applies command line overrides.
    pub fn load() -> Result<Self> {
        let opts = Command::new(clap::crate_name!())
            .version(clap::crate_version!())
            .about(clap::crate_description!())
            .args(&[
                Arg::new("config")
                    .help("path of config file")
                    .takes_value(true)
                    .short('c')
                    .long("config")
                    .default_value("config.yaml"),
                Arg::new("template")
                    .help("path of template file, overrides template_path")
                    .takes_value(true)
                    .short('t')
                    .long("template"),
                Arg::new("token-from")
                    .help("read telegram_token from this file")
                    .takes_value(true)
                    .long("token-from"),
                Arg::new("listen")
                    .help("listen address, overrides the config file")
                    .takes_value(true)
                    .short('l')
                    .long("listen"),
                Arg::new("debug")
                    .help("reload the template before every render")
                    .short('d')
                    .long("debug"),
            ])
            .get_matches();

        let config_path = opts.value_of("config").unwrap();

        let config = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .build()
            .context("can't read config file")?;

        let mut settings: Settings = config
            .try_deserialize()
            .context("can't parse config file")?;

        settings.debug = opts.is_present("debug");

        if let Some(path) = opts.value_of("template") {
            settings.template_path = Some(path.to_string());
        }
        if let Some(path) = opts.value_of("token-from") {
            let token = std::fs::read_to_string(path).context("can't read token file")?;
            settings.telegram_token = token.trim().to_string();
        }
        if let Some(listen) = opts.value_of("listen") {
            let addr: SocketAddr = listen.parse().context("can't parse listen address")?;
            settings.listen = ListenSettings {
                bind_address: addr.ip(),
                port: addr.port(),
            };
        }

        // debug mode only means anything when a template is in play
        if settings.template_path.is_none() {
            settings.debug = false;
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&mut self) -> Result<()> {
        if self.telegram_token.is_empty() {
            bail!("telegram_token must be set");
        }

        // zero means "use the default", matching absent keys
        if self.split_message_chars == 0 {
            self.split_message_chars = DEFAULT_SPLIT_CHARS;
        }
        if self.buttons.max_buttons_per_row == 0 {
            self.buttons.max_buttons_per_row = ButtonsSettings::default().max_buttons_per_row;
        }
        if self.buttons.max_total_buttons == 0 {
            self.buttons.max_total_buttons = ButtonsSettings::default().max_total_buttons;
        }

        if self.template_path.is_some() {
            match &self.time_zone {
                Some(zone) => {
                    zone.parse::<chrono_tz::Tz>()
                        .map_err(|err| anyhow::anyhow!("unknown time_zone {zone}: {err}"))?;
                }
                None => bail!("time_zone must be set when a template is configured"),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_yaml(yaml: &str) -> Result<Settings> {
        let mut settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    #[test]
    fn minimal_config_gets_the_defaults() {
        let settings = from_yaml("telegram_token: \"123:abc\"").unwrap();

        assert_eq!(settings.split_message_chars, DEFAULT_SPLIT_CHARS);
        assert_eq!(settings.buttons.max_buttons_per_row, 3);
        assert_eq!(settings.buttons.max_total_buttons, 10);
        assert_eq!(settings.listen.port, 9087);
        assert!(!settings.send_only);
        assert!(settings.template_path.is_none());
    }

    #[test]
    fn zero_limits_reset_to_the_defaults() {
        let settings = from_yaml(
            "telegram_token: \"123:abc\"\n\
             split_message_chars: 0\n\
             buttons:\n\
             \x20 max_buttons_per_row: 0\n\
             \x20 max_total_buttons: 0\n",
        )
        .unwrap();

        assert_eq!(settings.split_message_chars, DEFAULT_SPLIT_CHARS);
        assert_eq!(settings.buttons.max_buttons_per_row, 3);
        assert_eq!(settings.buttons.max_total_buttons, 10);
    }

    #[test]
    fn button_rules_parse_from_yaml() {
        let settings = from_yaml(
            "telegram_token: \"123:abc\"\n\
             buttons:\n\
             \x20 alert_buttons:\n\
             \x20   - key: runbook\n\
             \x20     text_template: \"Runbook {index}\"\n\
             \x20 max_buttons_per_row: 2\n",
        )
        .unwrap();

        assert_eq!(settings.buttons.alert_buttons.len(), 1);
        assert_eq!(settings.buttons.alert_buttons[0].key, "runbook");
        assert_eq!(settings.buttons.max_buttons_per_row, 2);
    }

    #[test]
    fn missing_token_is_rejected() {
        assert!(from_yaml("send_only: true").is_err());
    }

    #[test]
    fn template_without_time_zone_is_rejected() {
        assert!(from_yaml(
            "telegram_token: \"123:abc\"\n\
             template_path: /etc/klaxon/message.tera\n"
        )
        .is_err());
    }

    #[test]
    fn bad_time_zone_is_rejected() {
        assert!(from_yaml(
            "telegram_token: \"123:abc\"\n\
             template_path: /etc/klaxon/message.tera\n\
             time_zone: Mars/Olympus\n"
        )
        .is_err());
    }
}
