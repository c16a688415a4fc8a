//! Subject and body templates.
//!
//! Templates use `tera` interpolation against the recipient's attribute
//! names, e.g. `Hello {{Firstname}}`. Compilation happens once per run;
//! rendering returns a fresh `String` per call and sees nothing but the one
//! recipient it is given.

use crate::error::{Error, Result};
use crate::recipient::Recipient;
use std::collections::HashMap;
use std::fmt;
use tera::{Context, Tera, Value};

/// Which of the two templates a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// The subject line template.
    Subject,
    /// The message body template.
    Body,
}

impl TemplateKind {
    /// Name the template is registered under.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rendering failed for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot render {kind} template: {message}")]
pub struct RenderError {
    /// Template that failed.
    pub kind: TemplateKind,
    /// Engine diagnostic.
    pub message: String,
}

/// A compiled template.
#[derive(Debug)]
pub struct Template {
    engine: Tera,
    kind: TemplateKind,
}

impl Template {
    /// Compiles `text`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateSyntax`] if the text does not parse.
    pub fn compile(kind: TemplateKind, text: &str) -> Result<Self> {
        let mut engine = Tera::default();
        engine.register_function("get_env", deny_environment);
        engine
            .add_raw_template(kind.name(), text)
            .map_err(|e| Error::TemplateSyntax {
                kind,
                message: describe(&e),
            })?;
        Ok(Self { engine, kind })
    }

    /// Renders the template for `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the template refers to something that is
    /// not a recipient attribute.
    pub fn render(&self, recipient: &Recipient) -> std::result::Result<String, RenderError> {
        self.render_with(&context_for(self.kind, recipient)?)
    }

    fn render_with(&self, context: &Context) -> std::result::Result<String, RenderError> {
        self.engine
            .render(self.kind.name(), context)
            .map_err(|e| RenderError {
                kind: self.kind,
                message: describe(&e),
            })
    }
}

/// Subject and body rendered for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Rendered subject line.
    pub subject: String,
    /// Rendered body.
    pub body: String,
}

/// The subject and body templates of a run.
#[derive(Debug)]
pub struct TemplatePair {
    subject: Template,
    body: Template,
}

impl TemplatePair {
    /// Compiles both templates; either failing is fatal for the run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateSyntax`] for the first template that fails.
    pub fn compile(subject: &str, body: &str) -> Result<Self> {
        Ok(Self {
            subject: Template::compile(TemplateKind::Subject, subject)?,
            body: Template::compile(TemplateKind::Body, body)?,
        })
    }

    /// Renders subject and body for `recipient`.
    ///
    /// # Errors
    ///
    /// Returns the first [`RenderError`] encountered.
    pub fn render(&self, recipient: &Recipient) -> std::result::Result<Rendered, RenderError> {
        let context = context_for(TemplateKind::Subject, recipient)?;
        Ok(Rendered {
            subject: self.subject.render_with(&context)?,
            body: self.body.render_with(&context)?,
        })
    }
}

fn context_for(
    kind: TemplateKind,
    recipient: &Recipient,
) -> std::result::Result<Context, RenderError> {
    Context::from_serialize(recipient).map_err(|e| RenderError {
        kind,
        message: describe(&e),
    })
}

fn deny_environment(_args: &HashMap<String, Value>) -> tera::Result<Value> {
    Err(tera::Error::msg(
        "templates may only use recipient attributes",
    ))
}

/// Flattens a tera error and its causes into one line.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
