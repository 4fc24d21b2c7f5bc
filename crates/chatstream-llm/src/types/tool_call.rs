use std::collections::HashSet;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use super::request::Context;
use super::store::Tools;
use super::tool::ToolArguments;

/// Lifecycle of a tool call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Waiting for user approval or rejection
    #[default]
    Pending,
    /// Approved but not yet resolved
    Accepted,
    /// Rejected by the user
    Rejected,
    /// Approved and failed during resolution
    Error,
    /// Approved and resolved successfully
    Success,
}

/// A tool call requested by the model
///
/// An empty result means the call has not been resolved yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Vendor-assigned call id
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool description, filled in by callers that display calls
    #[serde(default)]
    pub description: String,
    /// Raw JSON arguments as produced by the model
    pub arguments: String,
    /// Resolution result
    #[serde(default)]
    pub result: String,
    /// Current status
    #[serde(default)]
    pub status: ToolCallStatus,
}

impl ToolCall {
    /// Create a pending call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            arguments: arguments.into(),
            result: String::new(),
            status: ToolCallStatus::Pending,
        }
    }

    /// Record a resolution
    #[must_use]
    pub fn resolved(mut self, result: impl Into<String>, status: ToolCallStatus) -> Self {
        self.result = result.into();
        self.status = status;
        self
    }

    /// Escape characters that could spoof what the arguments say
    pub fn sanitize_arguments(&mut self) {
        if !self.arguments.is_empty() {
            self.arguments = sanitize_non_printable(&self.arguments);
        }
    }
}

/// Replace non-printable and invisible characters with `[U+XXXX]`
///
/// Bidirectional overrides, zero-width characters and variation selectors
/// render invisibly and can make text read differently from what it is.
/// The `[U+XXXX]` form is used instead of `\uXXXX` so JSON parsers do not
/// turn it back into the original character. Newline, tab and carriage
/// return are kept.
pub fn sanitize_non_printable(input: &str) -> String {
    if input.chars().all(is_safe_char) {
        return input.to_owned();
    }

    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        if is_safe_char(c) {
            output.push(c);
        } else {
            let _ = write!(output, "[U+{:04X}]", u32::from(c));
        }
    }
    output
}

fn is_safe_char(c: char) -> bool {
    match c {
        ' '..='~' | '\n' | '\t' | '\r' => true,
        c if c.is_ascii() || c.is_control() => false,
        c => !is_invisible(c) && !is_unassigned(c),
    }
}

/// Separators, format characters, private use, variation selectors and
/// other default-ignorable code points
///
/// A fixed table rather than the full Unicode category data: assigned
/// symbols outside these ranges are treated as printable.
fn is_invisible(c: char) -> bool {
    matches!(
        u32::from(c),
        0x00A0
            | 0x00AD
            | 0x034F
            | 0x0600..=0x0605
            | 0x061C
            | 0x06DD
            | 0x070F
            | 0x08E2
            | 0x115F..=0x1160
            | 0x1680
            | 0x17B4..=0x17B5
            | 0x180B..=0x180F
            | 0x2000..=0x200F
            | 0x2028..=0x202F
            | 0x205F..=0x206F
            | 0x3000
            | 0x3164
            | 0xE000..=0xF8FF
            | 0xFE00..=0xFE0F
            | 0xFEFF
            | 0xFFA0
            | 0xFFF0..=0xFFFB
            | 0xFFFE..=0xFFFF
            | 0x110BD
            | 0x110CD
            | 0x13430..=0x1343F
            | 0x1BCA0..=0x1BCA3
            | 0x1D173..=0x1D17A
            | 0xE0000..=0xE0FFF
            | 0xF0000..=0x10FFFF
    )
}

/// Noncharacters and the planes that hold no assigned characters
///
/// Unassigned code points scattered inside assigned blocks are not
/// covered.
fn is_unassigned(c: char) -> bool {
    let code = u32::from(c);
    matches!(code, 0xFDD0..=0xFDEF | 0x40000..=0xDFFFF) || (code & 0xFFFE) == 0xFFFE
}

/// Outcome of running one tool call automatically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoRunResult {
    /// Id of the call this result answers
    pub tool_call_id: String,
    /// Tool name
    pub tool_name: String,
    /// Tool output, or the error text when `is_error` is set
    pub result: String,
    /// Whether resolution failed
    pub is_error: bool,
}

/// Whether every pending call may run without user approval
///
/// A mixed batch is never partially auto-run: one unlisted name sends the
/// whole batch back for approval.
pub fn should_auto_run_tools(calls: &[ToolCall], auto_run_tools: &[String]) -> bool {
    if auto_run_tools.is_empty() || calls.is_empty() {
        return false;
    }

    let allowed: HashSet<&str> = auto_run_tools.iter().map(String::as_str).collect();
    calls.iter().all(|call| allowed.contains(call.name.as_str()))
}

/// Resolve every call in order, converting failures into error results
///
/// Tool failures are never fatal to the conversation; the model sees the
/// error text and decides what to do next.
pub async fn execute_auto_run_tools(calls: &[ToolCall], tools: &dyn Tools, context: &Context) -> Vec<AutoRunResult> {
    let mut results = Vec::with_capacity(calls.len());

    for call in calls {
        let arguments = ToolArguments::new(call.arguments.clone());

        let (result, is_error) = match tools.resolve_tool(&call.name, arguments, context).await {
            Ok(output) => (output, false),
            Err(e) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "auto-run tool failed");
                (format!("Error executing tool: {e}"), true)
            }
        };

        results.push(AutoRunResult {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result,
            is_error,
        });
    }

    results
}
