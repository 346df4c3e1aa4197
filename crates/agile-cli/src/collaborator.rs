use agile_core::config::{AgentConfig, DocumentsConfig};
use agile_core::dispatcher::{ArtifactDescription, Collaborator, InvocationRequest};
use claude_agent::runner::{self, RunConfig};
use claude_agent::{PermissionMode, QueryOptions};
use std::path::{Path, PathBuf};

/// Invokes the `claude` CLI for each dispatched command and reads the
/// artifact description from the final fenced JSON block of its reply.
pub struct ClaudeCollaborator {
    root: PathBuf,
    model: String,
    max_turns: u32,
    permission_mode: PermissionMode,
    claude_path: Option<String>,
    /// Project-relative directory artifacts are written under.
    documents_root: String,
}

impl ClaudeCollaborator {
    pub fn new(root: &Path, agent: &AgentConfig) -> Self {
        let permission_mode = agent.permission_mode.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default permission mode");
            PermissionMode::Default
        });
        Self {
            root: root.to_path_buf(),
            model: agent.model.clone(),
            max_turns: agent.max_turns,
            permission_mode,
            claude_path: agent.claude_path.clone(),
            documents_root: DocumentsConfig::default().root,
        }
    }

    pub fn with_documents_root(mut self, documents_root: impl Into<String>) -> Self {
        self.documents_root = documents_root.into();
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(m) = model {
            self.model = m;
        }
        self
    }

    pub fn with_max_turns(mut self, max_turns: Option<u32>) -> Self {
        if let Some(n) = max_turns {
            self.max_turns = n;
        }
        self
    }

    fn run_config(&self, request: &InvocationRequest) -> RunConfig {
        RunConfig {
            system_prompt: Some(build_system_prompt(&request.agent, &self.documents_root)),
            prompt: request.prompt.clone(),
            opts: QueryOptions {
                model: Some(self.model.clone()),
                max_turns: Some(self.max_turns),
                allowed_tools: request
                    .allowed_tools
                    .iter()
                    .map(|t| t.as_allowed_tool())
                    .collect(),
                permission_mode: self.permission_mode,
                cwd: Some(self.root.clone()),
                path_to_executable: self.claude_path.clone(),
                ..Default::default()
            },
        }
    }
}

impl Collaborator for ClaudeCollaborator {
    fn invoke(&self, request: &InvocationRequest) -> Result<ArtifactDescription, String> {
        tracing::info!(
            command = %request.command,
            agent = %request.agent,
            model = %self.model,
            "invoking claude"
        );
        let result = runner::run_blocking(self.run_config(request)).map_err(|e| e.to_string())?;
        tracing::info!(
            turns = result.num_turns,
            cost_usd = result.total_cost_usd,
            "claude finished"
        );
        if result.is_error {
            return Err(format!(
                "claude run ended with {} after {} turns",
                result.subtype, result.num_turns
            ));
        }
        parse_artifact(&result.result_text)
    }
}

fn build_system_prompt(agent: &str, documents_root: &str) -> String {
    let documents_root = documents_root.trim().trim_end_matches('/');
    let example_path = if documents_root.is_empty() {
        "<category>/<name>.md".to_string()
    } else {
        format!("{documents_root}/<category>/<name>.md")
    };
    format!(
        r#"You are acting as the `{agent}` agent of an agile delivery team.

Carry out the request, writing exactly one primary document to disk at
`{example_path}` relative to the project root. When you are done, end your
reply with a fenced JSON block that describes that document:

```json
{{
  "path": "{example_path}",
  "summary": "one sentence describing the document",
  "dependencies": ["names of documents you used as input"]
}}
```

`path` is relative to the project root and required. Optional fields:
`category`, `markdown_tokens`, `json_tokens`. The JSON block must be the last
thing in your reply."#
    )
}

/// Extract the artifact description from the last ```` ```json ```` block
/// in `reply`.
pub fn parse_artifact(reply: &str) -> Result<ArtifactDescription, String> {
    let open = reply
        .rfind("```json")
        .ok_or("reply did not end with a ```json artifact block")?;
    let body_start = reply[open..]
        .find('\n')
        .map(|i| open + i + 1)
        .ok_or("artifact block is empty")?;
    let body_end = reply[body_start..]
        .find("```")
        .map(|i| body_start + i)
        .ok_or("artifact block is not closed")?;

    let artifact: ArtifactDescription = serde_json::from_str(reply[body_start..body_end].trim())
        .map_err(|e| format!("artifact block is not valid JSON: {e}"))?;
    if artifact.path.trim().is_empty() {
        return Err("artifact block has an empty path".to_string());
    }
    Ok(artifact)
}
