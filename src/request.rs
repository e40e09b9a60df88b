use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Style directive for the generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Formal,
    Casual,
}

impl Tone {
    /// Parses a tone name; unknown names fall back to `Professional`.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "friendly" => Tone::Friendly,
            "formal" => Tone::Formal,
            "casual" => Tone::Casual,
            _ => Tone::Professional,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Friendly => "friendly",
            Tone::Formal => "formal",
            Tone::Casual => "casual",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Tone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Any JSON value is accepted; only a known tone name selects a tone.
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(Tone::parse_or_default).unwrap_or_default())
    }
}

/// Inputs for one reply. This is also the relay's wire body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub received_email: String,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl GenerationRequest {
    pub fn new(
        user_name: impl Into<String>,
        sender_name: impl Into<String>,
        received_email: impl Into<String>,
        tone: Tone,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            sender_name: sender_name.into(),
            received_email: received_email.into(),
            tone,
            additional_context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.additional_context = if context.trim().is_empty() {
            None
        } else {
            Some(context)
        };
        self
    }

    /// Renders the instruction sent to the model.
    pub fn prompt(&self) -> String {
        crate::prompt::build_prompt(
            &self.user_name,
            &self.sender_name,
            &self.received_email,
            self.tone.as_str(),
            self.additional_context.as_deref(),
        )
    }
}
