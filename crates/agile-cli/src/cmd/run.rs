use crate::collaborator::ClaudeCollaborator;
use crate::output::print_json;
use agile_core::{
    binder::ArgumentBinder,
    command_registry::CommandRegistry,
    config::Config,
    dispatcher::{DispatchOutcome, DispatchResult, DispatchStatus, Dispatcher},
    registry::SharedRegistry,
    workflow::WorkflowState,
};
use anyhow::Context;
use std::path::Path;

pub struct RunArgs {
    pub name: String,
    pub args: String,
    pub dry_run: bool,
    pub model: Option<String>,
    pub max_turns: Option<u32>,
}

pub fn run(root: &Path, run_args: RunArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    for w in config.validate() {
        tracing::warn!(level = ?w.level, "config: {}", w.message);
    }
    let commands =
        CommandRegistry::from_config(root, &config).context("failed to load commands")?;
    let documents = SharedRegistry::load(root).context("failed to load document registry")?;

    let collaborator = ClaudeCollaborator::new(root, &config.agent)
        .with_model(run_args.model)
        .with_max_turns(run_args.max_turns)
        .with_documents_root(config.documents.root.clone());
    let dispatcher = Dispatcher::new(&commands, documents, collaborator)
        .with_binder(ArgumentBinder::new(config.commands.placeholder.clone()))
        .with_project_root(root);

    if run_args.dry_run {
        let prepared = dispatcher.prepare(&run_args.name, &run_args.args)?;
        let request = prepared.request();
        if json {
            return print_json(&request);
        }
        println!("Command: /{}", request.command);
        println!("Agent:   {}", request.agent);
        if !request.allowed_tools.is_empty() {
            let tools: Vec<String> = request.allowed_tools.iter().map(|t| t.to_string()).collect();
            println!("Tools:   {}", tools.join(", "));
        }
        println!("\n{}", request.prompt.trim_end());
        return Ok(());
    }

    let result = dispatcher.dispatch(&run_args.name, &run_args.args);

    if matches!(result.outcome, DispatchOutcome::Completed { .. }) {
        dispatcher
            .documents()
            .save(root)
            .context("failed to save document registry")?;
    }
    record_history(root, &result)?;

    if json {
        print_json(&result_json(&result))?;
    } else if let Some(record) = result.record() {
        println!("Completed: /{}", result.command);
        println!("Document:  {}/{} ({})", record.category, record.name, record.path);
        if !record.summary.is_empty() {
            println!("Summary:   {}", record.summary);
        }
    }

    match result.into_result() {
        Ok(_) => Ok(()),
        Err(e) => Err(anyhow::Error::new(e).context(format!("run '{}' failed", run_args.name))),
    }
}

/// Append the dispatch to the workflow history. Skipped when the project has
/// no workflow state yet.
fn record_history(root: &Path, result: &DispatchResult) -> anyhow::Result<()> {
    let mut state = match WorkflowState::load(root) {
        Ok(s) => s,
        Err(agile_core::AgileError::NotInitialized) => {
            tracing::debug!("no workflow state, skipping history");
            return Ok(());
        }
        Err(e) => return Err(e).context("failed to load workflow state"),
    };
    let outcome = match result.status() {
        DispatchStatus::Completed => "completed",
        DispatchStatus::Failed => "failed",
    };
    state.record_dispatch(&result.command, outcome);
    state.save(root).context("failed to save workflow state")
}

fn result_json(result: &DispatchResult) -> serde_json::Value {
    let mut val = serde_json::json!({
        "command": result.command,
        "status": result.status(),
        "prompt": result.prompt,
    });
    match &result.outcome {
        DispatchOutcome::Completed { record, upsert } => {
            val["record"] = serde_json::to_value(record).unwrap_or_default();
            val["upsert"] = serde_json::to_value(upsert).unwrap_or_default();
        }
        DispatchOutcome::Failed { reason } => {
            val["reason"] = serde_json::Value::String(reason.to_string());
        }
    }
    val
}
