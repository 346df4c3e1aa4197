use agile_core::{
    config::Config, io, paths, registry::DocumentRegistry, workflow::WorkflowState,
};
use anyhow::Context;
use std::path::Path;

const EXAMPLE_COMMAND: &str = "\
---
description: Investigate a defect and write up the root cause
argument-hint: <bug description>
allowed-tools: Read, Grep, Glob, Write
requires-argument: true
agent: debugger
category: debugging
---
Investigate the following problem: $ARGUMENTS

Find the root cause, propose a fix and write the analysis to
project-documents/debugging/<short-slug>.md.
";

pub fn run(root: &Path) -> anyhow::Result<()> {
    let project_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    println!("Initializing agile in: {}", root.display());

    let agile_dir = paths::agile_dir(root);
    io::ensure_dir(&agile_dir)
        .with_context(|| format!("failed to create {}", agile_dir.display()))?;

    let config = if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load config.yaml")?
    } else {
        let cfg = Config::new(&project_name);
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    if paths::workflow_state_path(root).exists() {
        println!("  exists:  {}", paths::WORKFLOW_STATE_FILE);
    } else {
        WorkflowState::new()
            .save(root)
            .context("failed to write workflow state")?;
        println!("  created: {}", paths::WORKFLOW_STATE_FILE);
    }

    if paths::document_registry_path(root).exists() {
        println!("  exists:  {}", paths::DOCUMENT_REGISTRY_FILE);
    } else {
        DocumentRegistry::new()
            .save(root)
            .context("failed to write document registry")?;
        println!("  created: {}", paths::DOCUMENT_REGISTRY_FILE);
    }

    io::ensure_dir(&root.join(&config.documents.root))
        .context("failed to create documents directory")?;

    let commands_dir = paths::project_commands_dir(root);
    io::ensure_dir(&commands_dir).context("failed to create commands directory")?;
    let example = commands_dir.join("debug.md");
    if io::write_if_missing(&example, EXAMPLE_COMMAND.as_bytes())? {
        println!("  created: {}/debug.md", paths::CLAUDE_COMMANDS_DIR);
    }

    println!("\nagile initialized.");
    println!("Next: agile command list");
    Ok(())
}
