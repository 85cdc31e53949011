//! Stream Units
//!
//! Backends disagree on where an incremental piece of text lives in a stream
//! unit. Four shapes are recognized:
//!
//! ```text
//! {"token": "He"}
//! {"choices": [{"delta": {"content": "He"}}]}
//! {"content": "He"}
//! {"text": "He"}
//! ```
//!
//! [`StreamChunk`] is the loose wire shape; [`StreamToken`] is the tagged form
//! the consumer works with. Conversion checks the fields in the fixed order
//! `token`, `choices[0].delta.content`, `content`, `text` and keeps the first
//! one that is present and non-empty. A unit with none of them becomes
//! [`StreamToken::Empty`] and contributes no text.

use serde::{Deserialize, Serialize};

/// Loosely-typed stream unit as received on the wire
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Plain token field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// OpenAI-style choice deltas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<ChunkChoice>>,
    /// Content field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Text field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One entry of `choices`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Incremental delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<ChunkDelta>,
}

/// Delta payload of a choice
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Incremental content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl StreamChunk {
    /// Unit carrying a plain token
    pub fn token(text: impl Into<String>) -> Self {
        Self {
            token: Some(text.into()),
            ..Self::default()
        }
    }

    /// Unit carrying an OpenAI-style delta
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            choices: Some(vec![ChunkChoice {
                delta: Some(ChunkDelta {
                    content: Some(text.into()),
                }),
            }]),
            ..Self::default()
        }
    }

    /// Unit carrying a `content` field
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    /// Unit carrying a `text` field
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    fn first_delta_content(&self) -> Option<&str> {
        self.choices
            .as_ref()?
            .first()?
            .delta
            .as_ref()?
            .content
            .as_deref()
    }
}

/// Stream unit after precedence has been applied
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamToken {
    /// Text from `token`
    Token(String),
    /// Text from `choices[0].delta.content`
    ChoiceDelta(String),
    /// Text from `content`
    Content(String),
    /// Text from `text`
    Text(String),
    /// No recognized field carried text
    Empty,
}

impl StreamToken {
    /// Incremental text carried by this unit, if any
    #[must_use]
    pub fn increment(&self) -> Option<&str> {
        match self {
            Self::Token(s) | Self::ChoiceDelta(s) | Self::Content(s) | Self::Text(s) => Some(s),
            Self::Empty => None,
        }
    }
}

impl From<StreamChunk> for StreamToken {
    fn from(chunk: StreamChunk) -> Self {
        fn non_empty(s: Option<&str>) -> Option<String> {
            s.filter(|s| !s.is_empty()).map(str::to_string)
        }

        if let Some(t) = non_empty(chunk.token.as_deref()) {
            Self::Token(t)
        } else if let Some(t) = non_empty(chunk.first_delta_content()) {
            Self::ChoiceDelta(t)
        } else if let Some(t) = non_empty(chunk.content.as_deref()) {
            Self::Content(t)
        } else if let Some(t) = non_empty(chunk.text.as_deref()) {
            Self::Text(t)
        } else {
            Self::Empty
        }
    }
}
