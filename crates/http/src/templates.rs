//! Server-side page templates

use minijinja::{Environment, ErrorKind, Value, path_loader};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Template errors
#[derive(Error, Debug)]
pub enum TemplateError {
    /// No template with this name
    #[error("Template not found: {0}")]
    NotFound(String),

    /// The template exists but failed to render
    #[error("Template render failed: {0}")]
    Render(#[from] minijinja::Error),
}

/// Jinja template environment
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Templates loaded lazily from a directory
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(dir.as_ref().to_path_buf()));
        Self { env }
    }

    /// Templates from in-memory `(name, source)` pairs
    pub fn from_sources<I, N, S>(sources: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let mut env = Environment::new();
        for (name, source) in sources {
            env.add_template_owned(name.into(), source.into())?;
        }
        Ok(Self { env })
    }

    /// Expose a value to every template
    pub fn add_global(&mut self, name: &'static str, value: impl Serialize) {
        self.env.add_global(name, Value::from_serialize(value));
    }

    /// Render a template
    pub fn render<C: Serialize>(&self, name: &str, ctx: C) -> Result<String, TemplateError> {
        let template = self.env.get_template(name).map_err(|e| {
            if e.kind() == ErrorKind::TemplateNotFound {
                TemplateError::NotFound(name.to_string())
            } else {
                TemplateError::Render(e)
            }
        })?;

        Ok(template.render(ctx)?)
    }
}
