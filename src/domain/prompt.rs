//! Prompt specifications handed to the reasoning gateway.

use serde::Serialize;

/// Shape of the reply a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyFormat {
    /// Free text.
    Text,
    /// Exactly one of `allowed_outputs`.
    Choice,
    /// A single JSON object.
    Json,
    /// A single SQL statement.
    Sql,
}

/// A labelled block of supporting context (schema, snippets, history).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextBlock {
    pub label: String,
    pub body: String,
}

/// Everything needed for one reasoning call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptSpec {
    role: String,
    allowed_outputs: Vec<String>,
    context: Vec<ContextBlock>,
    user_text: String,
    format: ReplyFormat,
}

impl PromptSpec {
    pub fn new(role: impl Into<String>, user_text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            allowed_outputs: Vec::new(),
            context: Vec::new(),
            user_text: user_text.into(),
            format: ReplyFormat::Text,
        }
    }

    pub fn with_allowed_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a context block; empty bodies are skipped.
    pub fn with_context(mut self, label: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        if !body.trim().is_empty() {
            self.context.push(ContextBlock {
                label: label.into(),
                body,
            });
        }
        self
    }

    pub fn with_format(mut self, format: ReplyFormat) -> Self {
        self.format = format;
        self
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn allowed_outputs(&self) -> &[String] {
        &self.allowed_outputs
    }

    pub fn context(&self) -> &[ContextBlock] {
        &self.context
    }

    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    pub fn format(&self) -> ReplyFormat {
        self.format
    }

    /// System message: role, output constraints, then each context block.
    pub fn system_message(&self) -> String {
        let mut sections = vec![self.role.clone()];

        match self.format {
            ReplyFormat::Choice if !self.allowed_outputs.is_empty() => sections.push(format!(
                "Reply with exactly one of: {}. Reply with that single word only.",
                self.allowed_outputs.join(", ")
            )),
            ReplyFormat::Json => {
                let mut line = "Reply with a single JSON object and nothing else.".to_string();
                if !self.allowed_outputs.is_empty() {
                    line.push_str(&format!(
                        " Allowed values: {}.",
                        self.allowed_outputs.join(", ")
                    ));
                }
                sections.push(line);
            }
            ReplyFormat::Sql => sections.push(
                "Reply with a single SQLite SELECT statement and nothing else. \
                 Use only the tables and columns listed in the schema."
                    .to_string(),
            ),
            _ => {}
        }

        for block in &self.context {
            sections.push(format!("{}:\n{}", block.label, block.body.trim_end()));
        }
        sections.join("\n\n")
    }

    /// JSON summary of the spec used as the audit input payload.
    pub fn audit_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "format": self.format,
            "allowed_outputs": self.allowed_outputs,
            "context_labels": self.context.iter().map(|c| c.label.as_str()).collect::<Vec<_>>(),
            "user_text": self.user_text,
        })
    }
}
