use std::fmt;
use std::io::{Cursor, Read};

use super::tool_call::ToolCall;

/// Author of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Instructions outside the turn sequence
    System,
    /// The human side of the conversation
    User,
    /// The model's side of the conversation
    Bot,
}

/// A single message in a conversation
#[derive(Debug)]
pub struct Post {
    /// Who wrote the post
    pub role: Role,
    /// Message text
    pub message: String,
    /// Attached files, drained during translation
    pub files: Vec<File>,
    /// Tool calls the bot made in this post, with their results
    pub tool_use: Vec<ToolCall>,
    /// Reasoning text produced alongside the post
    pub reasoning: String,
    /// Opaque signature that must be echoed back with the reasoning
    pub reasoning_signature: String,
}

impl Post {
    /// Create a post with only text
    pub fn new(role: Role, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
            files: Vec::new(),
            tool_use: Vec::new(),
            reasoning: String::new(),
            reasoning_signature: String::new(),
        }
    }

    /// System instruction post
    pub fn system(message: impl Into<String>) -> Self {
        Self::new(Role::System, message)
    }

    /// User post
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(Role::User, message)
    }

    /// Bot post
    pub fn bot(message: impl Into<String>) -> Self {
        Self::new(Role::Bot, message)
    }

    /// Attach a file
    #[must_use]
    pub fn with_file(mut self, file: File) -> Self {
        self.files.push(file);
        self
    }

    /// Record tool calls made in this post
    #[must_use]
    pub fn with_tool_use(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_use = calls;
        self
    }

    /// Record reasoning and its signature
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>, signature: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self.reasoning_signature = signature.into();
        self
    }
}

/// A file attached to a post
///
/// The reader is owned by the caller for the duration of one translation
/// and is fully drained before translation returns.
pub struct File {
    /// MIME type as declared by the uploader
    pub mime_type: String,
    /// Size in bytes as declared by the uploader
    pub size: u64,
    /// File contents
    pub reader: Box<dyn Read + Send + Sync>,
}

impl File {
    /// Create a file from any reader
    pub fn new(mime_type: impl Into<String>, size: u64, reader: impl Read + Send + Sync + 'static) -> Self {
        Self {
            mime_type: mime_type.into(),
            size,
            reader: Box::new(reader),
        }
    }

    /// Create a file from in-memory bytes
    pub fn from_bytes(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self::new(mime_type, size, Cursor::new(bytes))
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
