//! `claude-agent`: drives the `claude` CLI as a one-shot subprocess.
//!
//! The prompt is written to stdin of `claude --print --output-format json`
//! and the single JSON result object printed on exit is parsed into a
//! [`ResultMessage`].
//!
//! ```text
//! RunConfig ─▶ process::build_command ─▶ claude --print … ─▶ ResultMessage ─▶ RunResult
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use claude_agent::{runner::{run, RunConfig}, QueryOptions};
//!
//! let result = run(RunConfig {
//!     system_prompt: None,
//!     prompt: "Write a hello-world Rust function.".into(),
//!     opts: QueryOptions::default(),
//! })
//! .await?;
//! println!("{}", result.result_text);
//! ```

pub mod error;
pub mod runner;
pub mod types;

pub(crate) mod process;

pub use error::ClaudeAgentError;
pub use runner::{run as agent_run, RunConfig, RunResult};
pub use types::{PermissionMode, QueryOptions, ResultMessage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClaudeAgentError>;
