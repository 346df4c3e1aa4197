use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::types::{PermissionMode, QueryOptions, ResultMessage};
use crate::{ClaudeAgentError, Result};

/// Spawn `claude --print --output-format json`, send `prompt` on stdin, wait
/// for exit and parse the result object.
///
/// `CLAUDECODE` is removed from the environment so this works both from a
/// terminal and from inside a running Claude session.
pub(crate) async fn run_once(prompt: &str, opts: &QueryOptions) -> Result<ResultMessage> {
    let exe = resolve_executable(opts)?;
    let mut cmd = build_command(&exe, opts);
    cmd.env_remove("CLAUDECODE");
    for (k, v) in &opts.env {
        cmd.env(k, v);
    }
    tracing::debug!(exe = %exe, model = ?opts.model, "spawning claude");
    run_command(cmd, prompt).await
}

/// Run an already-built command with the prompt on stdin. Split out so tests
/// can substitute a stand-in process.
pub(crate) async fn run_command(mut cmd: Command, prompt: &str) -> Result<ResultMessage> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(prompt.as_bytes()).await?;
        stdin.flush().await?;
        // Dropping stdin closes it, signalling end of prompt.
    }

    let output = child.wait_with_output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    // A non-zero exit can still carry an error result object; prefer it.
    let parsed = parse_result(&stdout);
    if output.status.success() {
        return parsed;
    }
    if let Ok(msg) = parsed {
        return Ok(msg);
    }

    let stderr = stderr.trim();
    let msg = match output.status.code() {
        Some(code) if stderr.is_empty() => format!("claude exited with code {code}"),
        Some(code) => format!("claude exited with code {code}\nstderr: {stderr}"),
        None if stderr.is_empty() => "claude terminated by signal".to_string(),
        None => format!("claude terminated by signal\nstderr: {stderr}"),
    };
    Err(ClaudeAgentError::Process(msg))
}

/// Parse the last non-empty stdout line as a [`ResultMessage`].
pub(crate) fn parse_result(stdout: &str) -> Result<ResultMessage> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| ClaudeAgentError::Process("claude produced no output".into()))?;
    serde_json::from_str(line).map_err(|source| ClaudeAgentError::Parse {
        output: line.to_owned(),
        source,
    })
}

fn resolve_executable(opts: &QueryOptions) -> Result<String> {
    let exe = opts.path_to_executable.as_deref().unwrap_or("claude");
    if exe.contains(std::path::MAIN_SEPARATOR) {
        return Ok(exe.to_string());
    }
    which::which(exe)
        .map(|p| p.to_string_lossy().into_owned())
        .map_err(|_| ClaudeAgentError::NotFound(exe.to_string()))
}

// ─── Command builder ──────────────────────────────────────────────────────

pub(crate) fn build_command(exe: &str, opts: &QueryOptions) -> Command {
    let mut cmd = Command::new(exe);
    cmd.arg("--print").arg("--output-format").arg("json");

    if let Some(model) = &opts.model {
        cmd.arg("--model").arg(model);
    }

    if let Some(max_turns) = opts.max_turns {
        cmd.arg("--max-turns").arg(max_turns.to_string());
    }

    if !opts.allowed_tools.is_empty() {
        cmd.arg("--allowed-tools").args(&opts.allowed_tools);
    }

    if opts.permission_mode != PermissionMode::Default {
        cmd.arg("--permission-mode")
            .arg(opts.permission_mode.as_str());
    }

    if let Some(append) = &opts.append_system_prompt {
        cmd.arg("--append-system-prompt").arg(append);
    }

    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }

    // The prompt goes on stdin, not as a positional arg.

    cmd
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn build_command_minimal() {
        let cmd = build_command("claude", &QueryOptions::default());
        assert_eq!(args_of(&cmd), vec!["--print", "--output-format", "json"]);
    }

    #[test]
    fn build_command_full() {
        let opts = QueryOptions {
            model: Some("claude-sonnet-4-6".into()),
            max_turns: Some(5),
            allowed_tools: vec!["Read".into(), "Task(coder)".into()],
            permission_mode: PermissionMode::AcceptEdits,
            append_system_prompt: Some("be brief".into()),
            ..Default::default()
        };
        let args = args_of(&build_command("claude", &opts));
        let joined = args.join(" ");
        assert!(joined.contains("--model claude-sonnet-4-6"));
        assert!(joined.contains("--max-turns 5"));
        assert!(joined.contains("--allowed-tools Read Task(coder)"));
        assert!(joined.contains("--permission-mode acceptEdits"));
        assert!(joined.contains("--append-system-prompt be brief"));
    }

    #[test]
    fn parse_result_uses_last_line() {
        let out = "warming up\n\n{\"subtype\":\"success\",\"result\":\"ok\"}\n\n";
        let msg = parse_result(out).unwrap();
        assert_eq!(msg.result_text(), Some("ok"));
    }

    #[test]
    fn parse_result_empty_output() {
        assert!(matches!(
            parse_result("  \n"),
            Err(ClaudeAgentError::Process(_))
        ));
    }

    #[test]
    fn parse_result_garbage() {
        assert!(matches!(
            parse_result("not json"),
            Err(ClaudeAgentError::Parse { .. })
        ));
    }

    #[test]
    fn missing_executable_is_not_found() {
        let opts = QueryOptions {
            path_to_executable: Some("definitely-not-a-real-claude-binary".into()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_executable(&opts),
            Err(ClaudeAgentError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_command_reads_prompt_from_stdin() {
        // Echo the prompt back inside a result object.
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(
            r#"p=$(cat); printf '{"subtype":"success","result":"%s","num_turns":1}\n' "$p""#,
        );
        let msg = run_command(cmd, "hello").await.unwrap();
        assert_eq!(msg.result_text(), Some("hello"));
        assert_eq!(msg.num_turns, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_command_nonzero_exit_reports_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("cat >/dev/null; echo boom >&2; exit 3");
        let err = run_command(cmd, "x").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("code 3"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_command_nonzero_exit_with_result_object() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(
            r#"cat >/dev/null; echo '{"subtype":"error_max_turns","num_turns":9}'; exit 1"#,
        );
        let msg = run_command(cmd, "x").await.unwrap();
        assert!(msg.is_error());
        assert_eq!(msg.num_turns, 9);
    }
}
