//! # Diagnostic Results
//!
//! A [`DiagnosticResult`] collects the findings of one diagnostic invocation.
//! Findings are append-only and kept in emission order. Each one carries a
//! stable message code (for documentation lookup, not for branching), a
//! structured [`Message`] and optionally the error that caused it.
//!
//! ```
//! use diagnostics::{DiagnosticResult, Message};
//!
//! let mut r = DiagnosticResult::new("ClusterRouter");
//! r.debug(Message::text("DClu2003", "Found default router deployment"));
//! r.error(
//!     Message::template("DClu2009", "Pod {{podName}} is failing")
//!         .param("podName", "router-1-abcde"),
//! );
//!
//! assert!(r.failed());
//! assert_eq!(r.errors().next().unwrap().render(), "Pod router-1-abcde is failing");
//! ```

use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use lazy_static::lazy_static;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

lazy_static! {
    static ref TEMPLATES: Handlebars<'static> = {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
    };
}

/// Severity of a finding, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Underlying error attached to a finding for forensic display
pub type Cause = Arc<dyn StdError + Send + Sync>;

/// Structured message: a code, a template and its named parameters.
///
/// Plain messages are templates without parameters and render verbatim.
/// Named placeholders use the handlebars `{{name}}` form and are
/// substituted by [`Message::render`].
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub code: String,
    pub template: String,
    pub params: BTreeMap<String, String>,
    #[serde(serialize_with = "serialize_cause")]
    pub cause: Option<Cause>,
}

impl Message {
    /// A message whose text is already final
    pub fn text(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            template: text.into(),
            params: BTreeMap::new(),
            cause: None,
        }
    }

    /// A message with `{{name}}` placeholders filled in via [`Message::param`]
    pub fn template(code: impl Into<String>, template: impl Into<String>) -> Self {
        Self::text(code, template)
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Attach the error that caused this message
    #[must_use]
    pub fn cause<E>(mut self, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(err));
        self
    }

    /// Substitute the named parameters into the template.
    ///
    /// Parameter values are inserted as-is and never expanded again.
    /// Placeholders without a matching parameter render empty. A template
    /// handlebars cannot parse is returned unrendered.
    #[must_use]
    pub fn render(&self) -> String {
        if self.params.is_empty() {
            return self.template.clone();
        }
        match TEMPLATES.render_template(&self.template, &self.params) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(code = %self.code, error = %e, "Message template rendering failed");
                self.template.clone()
            }
        }
    }
}

#[allow(clippy::ref_option)]
fn serialize_cause<S: Serializer>(cause: &Option<Cause>, s: S) -> Result<S::Ok, S::Error> {
    match cause {
        Some(err) => s.serialize_some(&err.to_string()),
        None => s.serialize_none(),
    }
}

/// One leveled, coded diagnostic message
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub level: Level,
    pub message: Message,
    /// Diagnostic that emitted the finding
    pub origin: String,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    #[must_use]
    pub fn code(&self) -> &str {
        &self.message.code
    }

    #[must_use]
    pub fn render(&self) -> String {
        self.message.render()
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.message.params.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn cause(&self) -> Option<&Cause> {
        self.message.cause.as_ref()
    }
}

/// Append-only collector of findings for one diagnostic invocation
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticResult {
    origin: String,
    findings: Vec<Finding>,
}

impl DiagnosticResult {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            findings: Vec::new(),
        }
    }

    /// Name of the diagnostic this result belongs to
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn debug(&mut self, message: Message) {
        self.append(Level::Debug, message);
    }

    pub fn info(&mut self, message: Message) {
        self.append(Level::Info, message);
    }

    pub fn warn(&mut self, message: Message) {
        self.append(Level::Warning, message);
    }

    pub fn error(&mut self, message: Message) {
        self.append(Level::Error, message);
    }

    /// Record a finding and mirror it to the tracing subscriber
    pub fn append(&mut self, level: Level, message: Message) {
        let code = message.code.as_str();
        let origin = self.origin.as_str();
        match level {
            Level::Debug => tracing::debug!(diagnostic = %origin, code, "{}", message.render()),
            Level::Info => tracing::info!(diagnostic = %origin, code, "{}", message.render()),
            Level::Warning => tracing::warn!(diagnostic = %origin, code, "{}", message.render()),
            Level::Error => tracing::error!(diagnostic = %origin, code, "{}", message.render()),
        }

        self.findings.push(Finding {
            level,
            message,
            origin: self.origin.clone(),
            timestamp: Utc::now(),
        });
    }

    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn at_level(&self, level: Level) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.level == level)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.at_level(Level::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.at_level(Level::Error)
    }

    /// First finding carrying the given code
    #[must_use]
    pub fn find(&self, code: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.code() == code)
    }

    #[must_use]
    pub fn count(&self, level: Level) -> usize {
        self.at_level(level).count()
    }

    /// Most severe level recorded, if any
    #[must_use]
    pub fn highest_level(&self) -> Option<Level> {
        self.findings.iter().map(|f| f.level).max()
    }

    /// A result passes when it holds no error-level findings
    #[must_use]
    pub fn passed(&self) -> bool {
        self.count(Level::Error) == 0
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        !self.passed()
    }
}
