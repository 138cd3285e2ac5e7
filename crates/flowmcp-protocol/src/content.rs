//! # Content types
//!
//! Tool and prompt result variants, prompt messages, and the sampling
//! message builders, all serializing to the MCP wire shapes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content union type for tool and prompt results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    /// Text content
    #[serde(rename = "text")]
    Text(TextContent),
    /// Image content
    #[serde(rename = "image")]
    Image(ImageContent),
    /// Embedded resource
    #[serde(rename = "resource")]
    Resource(EmbeddedResource),
}

impl Content {
    /// Text content from anything displayable
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text(TextContent { text: text.into() })
    }

    /// Image content; raw bytes are base64-encoded here
    pub fn image(data: &[u8], mime_type: impl Into<String>) -> Self {
        Content::Image(ImageContent {
            mime_type: mime_type.into(),
            data: BASE64.encode(data),
        })
    }

    /// Embedded text resource
    pub fn text_resource(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Content::Resource(EmbeddedResource {
            resource: ResourceContents::Text {
                uri: uri.into(),
                text: text.into(),
            },
        })
    }

    /// Embedded binary resource; raw bytes are base64-encoded here
    pub fn blob_resource(
        uri: impl Into<String>,
        blob: &[u8],
        mime_type: Option<String>,
    ) -> Self {
        Content::Resource(EmbeddedResource {
            resource: ResourceContents::Blob {
                uri: uri.into(),
                blob: BASE64.encode(blob),
                mime_type,
            },
        })
    }
}

/// Text content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// The text of the message
    pub text: String,
}

/// Image content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// The MIME type of the image
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Base64-encoded image data
    pub data: String,
}

/// Embedded resource content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    /// The embedded resource (text or binary)
    pub resource: ResourceContents,
}

/// Union type for embedded resource contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    /// Text resource contents
    Text {
        /// The URI of the resource
        uri: String,
        /// The text of the resource
        text: String,
    },
    /// Binary resource contents
    Blob {
        /// The URI of the resource
        uri: String,
        /// Base64-encoded binary data
        blob: String,
        /// The MIME type, if known
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

/// Role in a prompt or sampling conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User role
    User,
    /// Assistant role
    Assistant,
}

/// One message of a `prompts/get` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Speaker of the message
    pub role: Role,
    /// Message content
    pub content: Content,
}

impl PromptMessage {
    /// A user text message, the default shape for primitive prompt results
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::text(text),
        }
    }
}

/// One message of a `sampling/createMessage` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingMessage {
    /// Speaker of the message
    pub role: Role,
    /// Message content (text or image)
    pub content: Content,
}

impl SamplingMessage {
    /// Text message with the given role
    pub fn text(text: impl Into<String>, role: Role) -> Self {
        Self {
            role,
            content: Content::text(text),
        }
    }

    /// Image message with the given role; unknown mime types fall back to
    /// `application/octet-stream`
    pub fn image(data: &[u8], mime_type: Option<String>, role: Role) -> Self {
        Self {
            role,
            content: Content::image(
                data,
                mime_type.unwrap_or_else(|| "application/octet-stream".to_owned()),
            ),
        }
    }
}

/// Model selection preferences for sampling requests.
///
/// Unset priorities are omitted from the wire payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPreferences {
    /// Suggested model names, in preference order
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub hints: Vec<ModelHint>,
    /// Relative weight of cost (0.0 - 1.0)
    #[serde(rename = "costPriority", skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,
    /// Relative weight of latency (0.0 - 1.0)
    #[serde(rename = "speedPriority", skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,
    /// Relative weight of capability (0.0 - 1.0)
    #[serde(
        rename = "intelligencePriority",
        skip_serializing_if = "Option::is_none"
    )]
    pub intelligence_priority: Option<f64>,
}

/// A single model name hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHint {
    /// Model name or family
    pub name: String,
}

impl ModelPreferences {
    /// Preferences listing the given model names as hints
    pub fn hinting<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hints: names
                .into_iter()
                .map(|name| ModelHint { name: name.into() })
                .collect(),
            ..Self::default()
        }
    }

    /// Set the cost priority
    pub fn cost_priority(mut self, priority: f64) -> Self {
        self.cost_priority = Some(priority);
        self
    }

    /// Set the speed priority
    pub fn speed_priority(mut self, priority: f64) -> Self {
        self.speed_priority = Some(priority);
        self
    }

    /// Set the intelligence priority
    pub fn intelligence_priority(mut self, priority: f64) -> Self {
        self.intelligence_priority = Some(priority);
        self
    }
}

/// Parameters of a server-initiated `sampling/createMessage` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageParams {
    /// Conversation to sample from
    pub messages: Vec<SamplingMessage>,
    /// Maximum number of tokens to sample
    #[serde(rename = "maxTokens")]
    pub max_tokens: u64,
    /// Model selection preferences
    #[serde(rename = "modelPreferences", skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    /// System prompt override
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Context inclusion request ("none", "thisServer", "allServers")
    #[serde(rename = "includeContext", skip_serializing_if = "Option::is_none")]
    pub include_context: Option<String>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Provider-specific metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl CreateMessageParams {
    /// Sampling request with required fields only
    pub fn new(messages: Vec<SamplingMessage>, max_tokens: u64) -> Self {
        Self {
            messages,
            max_tokens,
            model_preferences: None,
            system_prompt: None,
            include_context: None,
            temperature: None,
            stop_sequences: None,
            metadata: None,
        }
    }
}
