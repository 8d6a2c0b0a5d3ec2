//! turns an alert batch into message text
//!
//! Two interchangeable strategies, selected once at startup: the fixed
//! standard layout, or a user supplied tera template with the formatting
//! helpers from [functions] bound.

pub mod functions;
mod standard;
mod template;

use anyhow::{Context, Result};

pub use template::TemplateRenderer;

use crate::{alert::Data, settings::Settings};

/// the configured rendering strategy
pub enum Renderer {
    Standard,
    Template(TemplateRenderer),
}

impl Renderer {
    /// Builds the strategy the settings ask for. Template parse problems
    /// surface here so startup can abort with context.
    pub fn new(settings: &Settings) -> Result<Self> {
        match settings.template_path {
            Some(_) => Ok(Self::Template(
                TemplateRenderer::new(settings).context("could not set up template renderer")?,
            )),
            None => Ok(Self::Standard),
        }
    }

    /// Produces the message body for one batch. The standard strategy cannot
    /// fail; a template failure is a deployment defect and the caller treats
    /// it as fatal.
    pub fn render(&self, batch: &Data) -> Result<String> {
        match self {
            Self::Standard => Ok(standard::render(batch)),
            Self::Template(renderer) => renderer.render(batch),
        }
    }
}
