use crate::binder::ArgumentBinder;
use crate::command::{CommandDefinition, ToolReference};
use crate::command_registry::CommandRegistry;
use crate::document::{estimate_tokens, infer_key, DocumentRecord};
use crate::error::{AgileError, Result};
use crate::registry::{SharedRegistry, UpsertOutcome};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Collaborator contract
// ---------------------------------------------------------------------------

/// What the dispatcher hands to the LLM-invocation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationRequest {
    pub command: String,
    pub prompt: String,
    pub allowed_tools: Vec<ToolReference>,
    pub agent: String,
}

/// The collaborator's description of the artifact it produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescription {
    pub path: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ArtifactDescription {
    pub fn new(path: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            summary: summary.into(),
            ..Default::default()
        }
    }
}

/// The external capability that turns a bound prompt into an artifact.
/// A returned `Err` is the failure reason reported to the operator.
pub trait Collaborator {
    fn invoke(&self, request: &InvocationRequest) -> std::result::Result<ArtifactDescription, String>;
}

impl<C: Collaborator + ?Sized> Collaborator for &C {
    fn invoke(&self, request: &InvocationRequest) -> std::result::Result<ArtifactDescription, String> {
        (**self).invoke(request)
    }
}

// ---------------------------------------------------------------------------
// DispatchResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Completed,
    Failed,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Completed {
        record: DocumentRecord,
        upsert: UpsertOutcome,
    },
    Failed {
        reason: AgileError,
    },
}

#[derive(Debug)]
pub struct DispatchResult {
    pub command: String,
    /// The bound prompt, when binding got that far.
    pub prompt: Option<String>,
    pub outcome: DispatchOutcome,
}

impl DispatchResult {
    fn failed(command: &str, prompt: Option<String>, reason: AgileError) -> Self {
        warn!(command, error = %reason, "dispatch failed");
        Self {
            command: command.to_string(),
            prompt,
            outcome: DispatchOutcome::Failed { reason },
        }
    }

    pub fn status(&self) -> DispatchStatus {
        match self.outcome {
            DispatchOutcome::Completed { .. } => DispatchStatus::Completed,
            DispatchOutcome::Failed { .. } => DispatchStatus::Failed,
        }
    }

    pub fn record(&self) -> Option<&DocumentRecord> {
        match &self.outcome {
            DispatchOutcome::Completed { record, .. } => Some(record),
            DispatchOutcome::Failed { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&AgileError> {
        match &self.outcome {
            DispatchOutcome::Completed { .. } => None,
            DispatchOutcome::Failed { reason } => Some(reason),
        }
    }

    pub fn into_result(self) -> Result<DocumentRecord> {
        match self.outcome {
            DispatchOutcome::Completed { record, .. } => Ok(record),
            DispatchOutcome::Failed { reason } => Err(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// A resolved command with its argument bound, ready to hand off.
#[derive(Debug, Clone)]
pub struct PreparedDispatch<'a> {
    pub command: &'a CommandDefinition,
    pub prompt: String,
}

impl PreparedDispatch<'_> {
    pub fn request(&self) -> InvocationRequest {
        InvocationRequest {
            command: self.command.name.clone(),
            prompt: self.prompt.clone(),
            allowed_tools: self.command.allowed_tools.iter().cloned().collect(),
            agent: self.command.agent_name().to_string(),
        }
    }
}

/// Resolve, bind, invoke, record. Stateless between calls apart from its
/// writes to the shared document registry.
pub struct Dispatcher<'a, C> {
    commands: &'a CommandRegistry,
    binder: ArgumentBinder,
    documents: SharedRegistry,
    collaborator: C,
    /// Base directory for reading artifacts when estimating token counts.
    project_root: Option<PathBuf>,
}

impl<'a, C: Collaborator> Dispatcher<'a, C> {
    pub fn new(commands: &'a CommandRegistry, documents: SharedRegistry, collaborator: C) -> Self {
        Self {
            commands,
            binder: ArgumentBinder::default(),
            documents,
            collaborator,
            project_root: None,
        }
    }

    pub fn with_binder(mut self, binder: ArgumentBinder) -> Self {
        self.binder = binder;
        self
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn documents(&self) -> &SharedRegistry {
        &self.documents
    }

    /// Steps 1 and 2 of a dispatch: resolve the command and bind `args`.
    pub fn prepare(&self, command_name: &str, args: &str) -> Result<PreparedDispatch<'a>> {
        let command = self.commands.resolve(command_name)?;
        let prompt = self.binder.bind(command, args)?;
        Ok(PreparedDispatch { command, prompt })
    }

    /// Run the full command-to-artifact path. Never returns `Err`: every
    /// failure is reported as a `Failed` result and leaves the registry
    /// untouched. No retries.
    pub fn dispatch(&self, command_name: &str, args: &str) -> DispatchResult {
        let prepared = match self.prepare(command_name, args) {
            Ok(p) => p,
            Err(e) => return DispatchResult::failed(command_name, None, e),
        };
        let name = prepared.command.name.clone();
        info!(command = %name, "dispatching");

        let request = prepared.request();
        let artifact = match self.collaborator.invoke(&request) {
            Ok(a) => a,
            Err(reason) => {
                return DispatchResult::failed(
                    &name,
                    Some(prepared.prompt),
                    AgileError::Dispatch(reason),
                )
            }
        };

        let record = self.record_for(prepared.command, artifact);
        match self.documents.upsert(record) {
            Ok((upsert, record)) => {
                info!(command = %name, document = %record.key(), ?upsert, "dispatch completed");
                DispatchResult {
                    command: name,
                    prompt: Some(prepared.prompt),
                    outcome: DispatchOutcome::Completed { record, upsert },
                }
            }
            Err(e) => DispatchResult::failed(&name, Some(prepared.prompt), e),
        }
    }

    fn record_for(&self, command: &CommandDefinition, artifact: ArtifactDescription) -> DocumentRecord {
        let (inferred_category, name) = infer_key(&artifact.path);
        let category = artifact
            .category
            .clone()
            .or_else(|| command.category.clone())
            .unwrap_or(inferred_category);

        let markdown = artifact
            .markdown_tokens
            .unwrap_or_else(|| self.estimate_markdown_tokens(&artifact.path));

        DocumentRecord::new(category, name, artifact.path)
            .with_summary(artifact.summary)
            .with_agent(command.agent_name())
            .with_tokens(markdown, artifact.json_tokens)
            .with_dependencies(artifact.dependencies)
    }

    fn estimate_markdown_tokens(&self, path: &str) -> u64 {
        let full = match &self.project_root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        };
        std::fs::read_to_string(full)
            .map(|s| estimate_tokens(&s))
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
