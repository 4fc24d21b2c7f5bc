//! Role-alternating conversation shared by every vendor encoder

use std::io::Read;

use serde_json::Value;

use crate::types::{AutoRunResult, File, Post, ReasoningData, Role, ToolCall, ToolCallStatus};

/// Image types every vendor accepts
pub const SUPPORTED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Author of a vendor turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    /// Human side, including tool results
    User,
    /// Model side
    Assistant,
}

/// Content block inside a turn
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Plain text
    Text(String),
    /// Inline image bytes
    Image {
        /// One of [`SUPPORTED_IMAGE_TYPES`]
        mime_type: String,
        /// Raw image bytes
        data: Vec<u8>,
    },
    /// Reasoning to echo back with its signature
    Thinking(ReasoningData),
    /// Tool call made by the assistant
    ToolUse {
        /// Call identifier
        id: String,
        /// Tool name
        name: String,
        /// Parsed arguments
        arguments: Value,
    },
    /// Result answering a tool call
    ToolResult {
        /// Id of the call this answers
        tool_use_id: String,
        /// Tool output or error text
        content: String,
        /// Whether resolution failed
        is_error: bool,
    },
}

/// Consecutive blocks from one author
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    /// Author
    pub role: TurnRole,
    /// Blocks in order
    pub blocks: Vec<Block>,
}

/// Vendor-neutral conversation: a system preamble plus alternating turns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    /// System post texts in order
    pub system: Vec<String>,
    /// Turns in order
    pub turns: Vec<Turn>,
}

/// Vendor limits applied while translating
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslateOptions {
    /// Declared image size above which an image becomes a text notice
    pub max_image_size: Option<u64>,
}

impl Conversation {
    /// Fold posts into turns
    ///
    /// System posts go to the preamble. Consecutive posts from one role share
    /// a turn. A post with tool use ends its turn after the calls and opens a
    /// user turn holding the results; that turn stays open so a following
    /// user post joins it. File readers are drained here.
    pub fn translate(posts: Vec<Post>, options: &TranslateOptions) -> Self {
        let mut builder = TurnBuilder::default();
        let mut system = Vec::new();

        for post in posts {
            let role = match post.role {
                Role::System => {
                    if !post.message.is_empty() {
                        system.push(post.message);
                    }
                    continue;
                }
                Role::User => TurnRole::User,
                Role::Bot => TurnRole::Assistant,
            };

            builder.switch_to(role);

            if post.role == Role::Bot && !post.tool_use.is_empty() && !post.reasoning.is_empty() {
                builder.push(Block::Thinking(ReasoningData {
                    text: post.reasoning,
                    signature: post.reasoning_signature,
                }));
            }

            if !post.message.is_empty() {
                builder.push(Block::Text(post.message));
            }

            for file in post.files {
                builder.push(file_block(file, options));
            }

            if !post.tool_use.is_empty() {
                for call in &post.tool_use {
                    builder.push(tool_use_block(call));
                }

                builder.switch_to(TurnRole::User);
                for call in post.tool_use {
                    builder.push(Block::ToolResult {
                        tool_use_id: call.id,
                        content: call.result,
                        is_error: call.status != ToolCallStatus::Success,
                    });
                }
            }
        }

        Self {
            system,
            turns: builder.finish(),
        }
    }

    /// System preamble joined into one string, if any
    pub fn system_prompt(&self) -> Option<String> {
        (!self.system.is_empty()).then(|| self.system.join("\n"))
    }

    /// Append one auto-run round: the assistant's calls, then their results
    pub fn push_tool_round(&mut self, reasoning: &[ReasoningData], text: &str, calls: &[ToolCall], results: &[AutoRunResult]) {
        let mut blocks: Vec<Block> = reasoning
            .iter()
            .filter(|r| !r.text.is_empty())
            .cloned()
            .map(Block::Thinking)
            .collect();

        if !text.is_empty() {
            blocks.push(Block::Text(text.to_owned()));
        }
        blocks.extend(calls.iter().map(tool_use_block));

        self.turns.push(Turn {
            role: TurnRole::Assistant,
            blocks,
        });

        self.turns.push(Turn {
            role: TurnRole::User,
            blocks: results
                .iter()
                .map(|r| Block::ToolResult {
                    tool_use_id: r.tool_call_id.clone(),
                    content: r.result.clone(),
                    is_error: r.is_error,
                })
                .collect(),
        });
    }
}

#[derive(Default)]
struct TurnBuilder {
    turns: Vec<Turn>,
    current: Option<Turn>,
}

impl TurnBuilder {
    fn switch_to(&mut self, role: TurnRole) {
        if self.current.as_ref().is_some_and(|turn| turn.role == role) {
            return;
        }
        self.flush();
        self.current = Some(Turn {
            role,
            blocks: Vec::new(),
        });
    }

    fn push(&mut self, block: Block) {
        if let Some(turn) = &mut self.current {
            turn.blocks.push(block);
        }
    }

    fn flush(&mut self) {
        if let Some(turn) = self.current.take()
            && !turn.blocks.is_empty()
        {
            self.turns.push(turn);
        }
    }

    fn finish(mut self) -> Vec<Turn> {
        self.flush();
        self.turns
    }
}

fn file_block(mut file: File, options: &TranslateOptions) -> Block {
    if !SUPPORTED_IMAGE_TYPES.contains(&file.mime_type.as_str()) {
        return Block::Text(format!("[Unsupported image type: {}]", file.mime_type));
    }

    if let Some(limit) = options.max_image_size
        && file.size > limit
    {
        return Block::Text(format!(
            "User submitted an image larger than {}MB. Tell the user this.",
            limit / (1024 * 1024)
        ));
    }

    let mut data = Vec::new();
    match file.reader.read_to_end(&mut data) {
        Ok(_) => Block::Image {
            mime_type: file.mime_type,
            data,
        },
        Err(e) => {
            tracing::warn!(mime_type = %file.mime_type, error = %e, "failed to read attached image");
            Block::Text("[Error reading image data]".to_owned())
        }
    }
}

fn tool_use_block(call: &ToolCall) -> Block {
    Block::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        arguments: parse_arguments(call),
    }
}

/// Parsed tool arguments; malformed JSON degrades to an empty object
pub fn parse_arguments(call: &ToolCall) -> Value {
    if call.arguments.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }

    match serde_json::from_str::<Value>(&call.arguments) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            tracing::warn!(tool = %call.name, call_id = %call.id, "malformed tool arguments, sending empty object");
            Value::Object(serde_json::Map::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    fn translate(posts: Vec<Post>) -> Conversation {
        Conversation::translate(posts, &TranslateOptions::default())
    }

    fn roles(conversation: &Conversation) -> Vec<TurnRole> {
        conversation.turns.iter().map(|t| t.role).collect()
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }
    }

    #[test]
    fn system_and_consecutive_user_posts_merge() {
        let conversation = translate(vec![
            Post::system("be brief"),
            Post::user("hello"),
            Post::user("again"),
        ]);

        assert_eq!(conversation.system_prompt().as_deref(), Some("be brief"));
        assert_eq!(roles(&conversation), [TurnRole::User]);
        assert_eq!(
            conversation.turns[0].blocks,
            [Block::Text("hello".into()), Block::Text("again".into())]
        );
    }

    #[test]
    fn tool_use_splits_into_call_and_result_turns() {
        let call = ToolCall::new("call_1", "search", r#"{"q":"rust"}"#).resolved("3 hits", ToolCallStatus::Success);

        let conversation = translate(vec![
            Post::system("sys"),
            Post::user("find rust"),
            Post::bot("").with_tool_use(vec![call]),
        ]);

        assert_eq!(
            roles(&conversation),
            [TurnRole::User, TurnRole::Assistant, TurnRole::User]
        );
        assert!(matches!(
            &conversation.turns[1].blocks[0],
            Block::ToolUse { id, arguments, .. } if id == "call_1" && arguments["q"] == "rust"
        ));
        assert_eq!(
            conversation.turns[2].blocks,
            [Block::ToolResult {
                tool_use_id: "call_1".into(),
                content: "3 hits".into(),
                is_error: false,
            }]
        );
    }

    #[test]
    fn following_user_post_joins_result_turn() {
        let call = ToolCall::new("c", "search", "{}").resolved("denied", ToolCallStatus::Rejected);

        let conversation = translate(vec![
            Post::user("q"),
            Post::bot("").with_tool_use(vec![call]),
            Post::user("try again"),
        ]);

        assert_eq!(
            roles(&conversation),
            [TurnRole::User, TurnRole::Assistant, TurnRole::User]
        );
        let result_turn = &conversation.turns[2].blocks;
        assert!(matches!(&result_turn[0], Block::ToolResult { is_error: true, .. }));
        assert_eq!(result_turn[1], Block::Text("try again".into()));
    }

    #[test]
    fn reasoning_precedes_text_on_tool_use_posts() {
        let call = ToolCall::new("c", "search", "{}");
        let conversation = translate(vec![
            Post::user("q"),
            Post::bot("let me look")
                .with_reasoning("need data", "sig")
                .with_tool_use(vec![call]),
        ]);

        let blocks = &conversation.turns[1].blocks;
        assert!(matches!(&blocks[0], Block::Thinking(r) if r.text == "need data" && r.signature == "sig"));
        assert_eq!(blocks[1], Block::Text("let me look".into()));
    }

    #[test]
    fn reasoning_without_tool_use_is_dropped() {
        let conversation = translate(vec![Post::user("q"), Post::bot("a").with_reasoning("r", "s")]);
        assert_eq!(conversation.turns[1].blocks, [Block::Text("a".into())]);
    }

    #[test]
    fn attachments_degrade_to_placeholders() {
        let options = TranslateOptions {
            max_image_size: Some(20 * 1024 * 1024),
        };
        let post = Post::user("look")
            .with_file(File::from_bytes("application/pdf", vec![1, 2]))
            .with_file(File::new("image/png", 21 * 1024 * 1024, io::empty()))
            .with_file(File::new("image/png", 10, FailingReader))
            .with_file(File::from_bytes("image/png", vec![0x89, 0x50]));

        let conversation = Conversation::translate(vec![post], &options);
        let blocks = &conversation.turns[0].blocks;

        assert_eq!(blocks[1], Block::Text("[Unsupported image type: application/pdf]".into()));
        assert_eq!(
            blocks[2],
            Block::Text("User submitted an image larger than 20MB. Tell the user this.".into())
        );
        assert_eq!(blocks[3], Block::Text("[Error reading image data]".into()));
        assert_eq!(
            blocks[4],
            Block::Image {
                mime_type: "image/png".into(),
                data: vec![0x89, 0x50],
            }
        );
    }

    #[test]
    fn malformed_arguments_become_empty_object() {
        let call = ToolCall::new("c", "search", "{not json");
        assert_eq!(parse_arguments(&call), serde_json::json!({}));
    }

    #[test]
    fn tool_round_appends_call_and_result_turns() {
        let mut conversation = translate(vec![Post::user("q")]);
        let calls = vec![ToolCall::new("c1", "search", r#"{"q":"x"}"#)];
        let results = vec![AutoRunResult {
            tool_call_id: "c1".into(),
            tool_name: "search".into(),
            result: "Error executing tool: boom".into(),
            is_error: true,
        }];
        let reasoning = vec![ReasoningData {
            text: "think".into(),
            signature: "sig".into(),
        }];

        conversation.push_tool_round(&reasoning, "", &calls, &results);

        assert_eq!(
            roles(&conversation),
            [TurnRole::User, TurnRole::Assistant, TurnRole::User]
        );
        assert!(matches!(&conversation.turns[1].blocks[0], Block::Thinking(_)));
        assert!(matches!(&conversation.turns[1].blocks[1], Block::ToolUse { .. }));
        assert!(matches!(&conversation.turns[2].blocks[0], Block::ToolResult { is_error: true, .. }));
    }
}
