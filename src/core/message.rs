use crate::core::error::AgoraError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest image accepted as an attachment (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub mime_type: String,
    /// Base64-encoded image bytes
    pub data: String,
    pub name: String,
    pub size: usize,
}

impl ImageAttachment {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self, AgoraError> {
        let name = name.into();
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(AgoraError::Input(format!(
                "Image '{}' is {} bytes, the limit is {} bytes",
                name,
                bytes.len(),
                MAX_IMAGE_BYTES
            )));
        }

        Ok(Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
            name,
            size: bytes.len(),
        })
    }

    /// Reads an image from disk, inferring the MIME type from its extension.
    pub fn from_path(path: &Path) -> Result<Self, AgoraError> {
        let mime_type = mime_type_for(path).ok_or_else(|| {
            AgoraError::Input(format!("Unsupported image type: {}", path.display()))
        })?;

        let size = std::fs::metadata(path)?.len() as usize;
        if size > MAX_IMAGE_BYTES {
            return Err(AgoraError::Input(format!(
                "Image '{}' is {} bytes, the limit is {} bytes",
                path.display(),
                size,
                MAX_IMAGE_BYTES
            )));
        }

        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(name, mime_type, &bytes)
    }

    /// `data:<mime>;base64,<data>` form used by OpenAI.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// A single conversation turn. The role is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<ImageAttachment>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn with_attachments(mut self, attachments: Vec<ImageAttachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn edit_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

/// Ordered, append-mostly sequence of messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replaces the text of an existing entry; the role never changes.
    pub fn edit(&mut self, index: usize, text: impl Into<String>) -> Result<(), AgoraError> {
        let message = self
            .messages
            .get_mut(index)
            .ok_or_else(|| AgoraError::Input(format!("No message at position {}", index)))?;
        message.edit_text(text);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
