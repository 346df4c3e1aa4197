use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// `subtype` of a run that finished normally.
pub const SUBTYPE_SUCCESS: &str = "success";

// ─── Result message ───────────────────────────────────────────────────────

/// The object `claude --print --output-format json` prints when it exits.
///
/// Kept flat: every stop condition (`success`, `error_max_turns`,
/// `error_during_execution`, ...) shares the same fields, and a subtype this
/// crate has never seen still parses.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResultMessage {
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    /// Final reply text. Only present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ResultMessage {
    pub fn is_success(&self) -> bool {
        self.subtype == SUBTYPE_SUCCESS
    }

    /// A non-success subtype, or a success the CLI itself flagged
    /// (e.g. an upstream API error surfaced as text).
    pub fn is_error(&self) -> bool {
        self.is_error || !self.is_success()
    }

    pub fn result_text(&self) -> Option<&str> {
        if self.is_success() {
            self.result.as_deref()
        } else {
            None
        }
    }
}

// ─── QueryOptions ─────────────────────────────────────────────────────────

/// Flags for one `claude --print` invocation. Everything left `None` or empty
/// falls back to the CLI's own default.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub model: Option<String>,
    /// Turn budget; exceeding it ends the run with `error_max_turns`.
    pub max_turns: Option<u32>,
    /// Pre-approved tools in `--allowed-tools` form, e.g. `Task(coder)`.
    pub allowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    /// Appended to the CLI's built-in system prompt.
    pub append_system_prompt: Option<String>,
    pub cwd: Option<PathBuf>,
    /// Extra environment for the child process.
    pub env: HashMap<String, String>,
    /// `claude` binary to run. A bare name is looked up on `PATH`.
    pub path_to_executable: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    BypassPermissions,
    Plan,
    DontAsk,
}

const PERMISSION_MODES: [(PermissionMode, &str); 5] = [
    (PermissionMode::Default, "default"),
    (PermissionMode::AcceptEdits, "acceptEdits"),
    (PermissionMode::BypassPermissions, "bypassPermissions"),
    (PermissionMode::Plan, "plan"),
    (PermissionMode::DontAsk, "dontAsk"),
];

impl PermissionMode {
    /// Value for `--permission-mode`.
    pub fn as_str(self) -> &'static str {
        PERMISSION_MODES
            .iter()
            .find(|(mode, _)| *mode == self)
            .map(|(_, s)| *s)
            .unwrap_or("default")
    }
}

impl std::str::FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PERMISSION_MODES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(mode, _)| *mode)
            .ok_or_else(|| {
                let known: Vec<&str> = PERMISSION_MODES.iter().map(|(_, n)| *n).collect();
                format!("unknown permission mode '{s}' (expected one of: {})", known.join(", "))
            })
    }
}
