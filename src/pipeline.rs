//! glue between the webhook receiver and the telegram sender
//!
//! One batch flows render → keyboard → chunk → sanitize. The result is an
//! ordered list of outgoing messages; the caller delivers them sequentially
//! because chunk order matters to the reader.

use std::sync::Arc;

use anyhow::Result;

use crate::{
    alert::Data,
    chunk,
    keyboard::{self, Keyboard},
    render::Renderer,
    sanitize,
    settings::Settings,
};

/// one ready-to-send message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

/// everything one batch turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedBatch {
    /// the full rendered text before chunking and sanitization, kept around
    /// for delivery failure reporting
    pub rendered: String,
    pub messages: Vec<OutboundMessage>,
}

/// The per-process rendering pipeline: immutable settings plus the strategy
/// chosen at startup. Shared read-only between concurrent requests.
pub struct Pipeline {
    settings: Arc<Settings>,
    renderer: Renderer,
}

impl Pipeline {
    pub fn new(settings: Arc<Settings>, renderer: Renderer) -> Self {
        Self { settings, renderer }
    }

    /// Renders one batch into sanitized, size bounded messages. The keyboard
    /// is computed once per batch and rides along on every chunk.
    pub fn process(&self, batch: &Data) -> Result<ProcessedBatch> {
        let rendered = self.renderer.render(batch)?;
        let keyboard = keyboard::build(batch, &self.settings.buttons);

        let messages = chunk::split(&rendered, self.settings.split_message_chars)
            .iter()
            .map(|piece| OutboundMessage {
                text: sanitize::sanitize(piece),
                keyboard: keyboard.clone(),
            })
            .collect();

        Ok(ProcessedBatch { rendered, messages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::{AlertButton, ButtonsSettings};
    use serde_json::json;

    fn batch() -> Data {
        serde_json::from_value(json!({
            "receiver": "team",
            "status": "firing",
            "externalURL": "http://am.example.org",
            "alerts": [{
                "labels": { "instance": "10.0.0.1:9100", "job": "node" },
                "generatorURL": "http://x/graph"
            }]
        }))
        .unwrap()
    }

    fn pipeline(split_message_chars: usize) -> Pipeline {
        let settings = Settings {
            split_message_chars,
            buttons: ButtonsSettings {
                alert_buttons: vec![AlertButton {
                    key: String::from("generatorURL"),
                    text_template: String::from("Graph {index}"),
                    url_template: String::new(),
                }],
                ..ButtonsSettings::default()
            },
            ..Settings::default()
        };
        let settings = Arc::new(settings);
        let renderer = Renderer::new(&settings).unwrap();

        Pipeline::new(settings, renderer)
    }

    #[test]
    fn the_keyboard_is_attached_to_every_chunk() {
        let messages = pipeline(20).process(&batch()).unwrap().messages;

        assert!(messages.len() > 1);
        for message in &messages {
            let keyboard = message.keyboard.as_ref().expect("chunk lost its keyboard");
            assert_eq!(keyboard.rows[0][0].url, "http://x/graph");
        }
    }

    #[test]
    fn chunks_concatenate_to_the_rendered_text() {
        // a chunk limit beyond the message size keeps the text intact and
        // well-formed, so sanitization passes it through
        let messages = pipeline(4000).process(&batch()).unwrap().messages;

        assert_eq!(messages.len(), 1);
        assert!(messages[0]
            .text
            .ends_with("<a href='http://x/graph'>10.0.0.1[node]</a>"));
    }

    #[test]
    fn small_chunks_get_their_markup_stripped() {
        // splitting mid-tag breaks the markup, each broken chunk degrades to
        // plain text on its own
        let processed = pipeline(10).process(&batch()).unwrap();

        for message in &processed.messages {
            assert!(!message.text.contains("<a "), "kept a tag: {:?}", message.text);
        }
    }

    #[test]
    fn the_rendered_text_survives_chunking_and_stripping() {
        // delivery failure reporting quotes the message as rendered, even
        // when the chunks themselves were degraded to plain text
        let processed = pipeline(10).process(&batch()).unwrap();

        assert!(processed.rendered.contains("<a href='http://x/graph'>"));
        // every chunk came out of the rendered text
        let total = processed.rendered.chars().count();
        assert_eq!(processed.messages.len(), (total + 9) / 10);
    }
}
