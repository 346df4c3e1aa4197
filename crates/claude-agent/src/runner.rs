use crate::process;
use crate::{QueryOptions, Result, ResultMessage};

// ─── RunConfig ────────────────────────────────────────────────────────────

/// Configuration for a single agentic Claude run.
#[derive(Debug)]
pub struct RunConfig {
    /// Text appended to Claude's default system prompt.
    pub system_prompt: Option<String>,
    /// The user-facing prompt Claude will act on.
    pub prompt: String,
    /// Query options: model, permission mode, allowed tools, etc.
    pub opts: QueryOptions,
}

// ─── RunResult ────────────────────────────────────────────────────────────

/// The terminal result of a completed agentic run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub session_id: String,
    /// The final text Claude produced (empty string for error subtypes).
    pub result_text: String,
    pub total_cost_usd: f64,
    pub num_turns: u32,
    /// `true` if the run ended with any error subtype (max_turns, budget, etc.).
    pub is_error: bool,
    /// Stop condition, e.g. `success` or `error_max_turns`.
    pub subtype: String,
}

impl From<ResultMessage> for RunResult {
    fn from(r: ResultMessage) -> Self {
        Self {
            result_text: r.result_text().unwrap_or_default().to_string(),
            is_error: r.is_error(),
            session_id: r.session_id,
            total_cost_usd: r.total_cost_usd,
            num_turns: r.num_turns,
            subtype: r.subtype,
        }
    }
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Drive a single agentic Claude query to completion.
///
/// `config.system_prompt` is appended to the default system prompt so the
/// CLI keeps its tool-use instructions.
pub async fn run(config: RunConfig) -> Result<RunResult> {
    let mut opts = config.opts;
    if let Some(sp) = config.system_prompt {
        opts.append_system_prompt = Some(sp);
    }
    let result = process::run_once(&config.prompt, &opts).await?;
    Ok(result.into())
}

/// Blocking wrapper around [`run`] for synchronous callers.
///
/// Outside a runtime it starts one. Inside a multi-threaded runtime it blocks
/// in place. A current-thread runtime cannot be blocked, so the run is driven
/// on a fresh runtime in a scoped thread instead.
pub fn run_blocking(config: RunConfig) -> Result<RunResult> {
    use tokio::runtime::{Handle, RuntimeFlavor};

    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(run(config)))
        }
        Ok(_) => {
            tracing::debug!("current-thread runtime, running claude on a helper thread");
            std::thread::scope(|s| {
                s.spawn(move || run_on_new_runtime(config))
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
        }
        Err(_) => run_on_new_runtime(config),
    }
}

fn run_on_new_runtime(config: RunConfig) -> Result<RunResult> {
    tracing::debug!("using new tokio runtime");
    tokio::runtime::Runtime::new()?.block_on(run(config))
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn message(subtype: &str, result: Option<&str>) -> ResultMessage {
        ResultMessage {
            subtype: subtype.into(),
            is_error: false,
            result: result.map(str::to_string),
            session_id: "s1".into(),
            num_turns: 3,
            total_cost_usd: 0.012,
            duration_ms: 10,
            errors: vec![],
        }
    }

    #[test]
    fn run_result_from_success() {
        let r: RunResult = message("success", Some("hello world")).into();
        assert_eq!(r.result_text, "hello world");
        assert_eq!(r.session_id, "s1");
        assert_eq!(r.num_turns, 3);
        assert!(!r.is_error);
        assert_eq!(r.subtype, "success");
    }

    #[test]
    fn run_result_from_error_has_empty_text() {
        let r: RunResult = message("error_max_turns", None).into();
        assert!(r.is_error);
        assert_eq!(r.result_text, "");
        assert_eq!(r.subtype, "error_max_turns");
    }

    #[cfg(unix)]
    fn stand_in_config(dir: &tempfile::TempDir) -> RunConfig {
        use std::os::unix::fs::PermissionsExt;

        let exe = dir.path().join("fake-claude");
        std::fs::write(
            &exe,
            "#!/bin/sh\ncat >/dev/null\necho '{\"subtype\":\"success\",\"result\":\"ok\",\"session_id\":\"x\"}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        RunConfig {
            system_prompt: Some("extra".into()),
            prompt: "do it".into(),
            opts: QueryOptions {
                path_to_executable: Some(exe.to_string_lossy().into_owned()),
                ..Default::default()
            },
        }
    }

    #[cfg(unix)]
    #[test]
    fn run_blocking_with_stand_in_executable() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = run_blocking(stand_in_config(&dir)).unwrap();
        assert_eq!(result.result_text, "ok");
        assert_eq!(result.session_id, "x");
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "current_thread")]
    async fn run_blocking_inside_current_thread_runtime() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = run_blocking(stand_in_config(&dir)).unwrap();
        assert_eq!(result.result_text, "ok");
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_blocking_inside_multi_thread_runtime() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = run_blocking(stand_in_config(&dir)).unwrap();
        assert_eq!(result.session_id, "x");
    }
}
