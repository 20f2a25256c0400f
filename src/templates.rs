//! Email templates, looked up per newsletter with a shared fallback.
//!
//! For a newsletter `weekly` and the action `subscribe` the subject template
//! is the first existing file of
//!
//! - `<root>/newsletter/message/weekly/subscribe_subject.txt`
//! - `<root>/newsletter/message/subscribe_subject.txt`
//!
//! and likewise for `subscribe.txt` and `subscribe.html`. Templates use the
//! Jinja syntax of `minijinja`, HTML templates autoescape their values.

use std::path::{Path, PathBuf};

use minijinja::{AutoEscape, Environment, UndefinedBehavior};

use serde::Serialize;

use crate::domain::Action;
use crate::error::{Error, Result};
use crate::model::Newsletter;

pub use minijinja::{context, Value};

const TEMPLATE_ROOT: &str = "newsletter/message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Text,
    Html,
}

/// A loaded template source, checked for syntax errors
#[derive(Debug, Clone)]
pub struct Template {
    kind: TemplateKind,
    source: String,
}

impl Template {
    pub fn new(kind: TemplateKind, source: impl Into<String>) -> Result<Self> {
        let template = Self {
            kind,
            source: source.into(),
        };
        environment(kind).template_from_str(&template.source)?;

        Ok(template)
    }

    /// Render with the given context. Undefined values, and attributes of
    /// undefined values, render empty.
    pub fn render<S: Serialize>(&self, context: S) -> Result<String> {
        let env = environment(self.kind);
        let template = env.template_from_str(&self.source)?;

        Ok(template.render(context)?)
    }
}

fn environment(kind: TemplateKind) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Chainable);
    env.set_auto_escape_callback(move |_| match kind {
        TemplateKind::Html => AutoEscape::Html,
        TemplateKind::Text => AutoEscape::None,
    });
    env
}

/// The subject, text and optional HTML templates of one action
#[derive(Debug, Clone)]
pub struct TemplateSet {
    pub subject: Template,
    pub text: Template,
    pub html: Option<Template>,
}

/// Rendered output of a [`TemplateSet`]
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

impl TemplateSet {
    pub fn render(&self, context: &Value) -> Result<RenderedEmail> {
        let html = match &self.html {
            Some(html) => Some(html.render(context)?),
            None => None,
        };

        Ok(RenderedEmail {
            subject: self.subject.render(context)?.trim().to_string(),
            text: self.text.render(context)?,
            html,
        })
    }
}

/// Template lookup on the filesystem
#[derive(Debug, Clone)]
pub struct TemplateStore {
    directory: PathBuf,
}

impl TemplateStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Resolve the templates of a newsletter for an action. The HTML template
    /// is only looked up when the newsletter sends HTML.
    #[tracing::instrument(name = "Resolve templates", skip(self, newsletter), fields(newsletter = %newsletter.slug))]
    pub async fn templates_for(&self, newsletter: &Newsletter, action: Action) -> Result<TemplateSet> {
        let subject = format!("{}_subject.txt", action);
        let text = format!("{}.txt", action);
        let html = format!("{}.html", action);

        let subject = self.select(&newsletter.slug, &subject, TemplateKind::Text).await?;
        let text = self.select(&newsletter.slug, &text, TemplateKind::Text).await?;
        let html = if newsletter.send_html {
            Some(self.select(&newsletter.slug, &html, TemplateKind::Html).await?)
        } else {
            None
        };

        Ok(TemplateSet { subject, text, html })
    }

    /// Load the first existing candidate of a template file
    async fn select(&self, slug: &str, file: &str, kind: TemplateKind) -> Result<Template> {
        let candidates = [
            self.directory.join(TEMPLATE_ROOT).join(slug).join(file),
            self.directory.join(TEMPLATE_ROOT).join(file),
        ];

        for candidate in &candidates {
            match tokio::fs::read_to_string(candidate).await {
                Ok(source) => {
                    tracing::debug!("Using template {}", candidate.display());
                    return Template::new(kind, source);
                }
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
                Err(error) => return Err(error.into()),
            }
        }

        Err(Error::TemplateNotFound(
            candidates.iter().map(|path| display(path)).collect(),
        ))
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
