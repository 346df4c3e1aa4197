use crate::output::{print_json, print_table, truncate};
use agile_core::{
    document::{estimate_tokens, DocumentRecord},
    registry::{DocumentRegistry, SharedRegistry},
};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum DocSubcommand {
    /// List registered documents
    List {
        /// Only this category
        #[arg(long)]
        category: Option<String>,
        /// Include archived documents
        #[arg(long)]
        all: bool,
    },
    /// Show one document's metadata
    Show { category: String, name: String },
    /// Register or update a document by hand
    Add {
        #[arg(long)]
        category: String,
        #[arg(long)]
        name: String,
        /// Path relative to the project root
        #[arg(long)]
        path: String,
        #[arg(long, default_value = "")]
        summary: String,
        #[arg(long, default_value = "")]
        agent: String,
        /// Names of documents this one was built from
        #[arg(long = "depends-on", num_args = 1..)]
        depends_on: Vec<String>,
    },
    /// Archive a document (kept on record, hidden from listings and search)
    Archive { category: String, name: String },
    /// Case-insensitive search over category, name, summary and agent
    Search { term: String },
}

pub fn run(root: &Path, subcmd: DocSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DocSubcommand::List { category, all } => list(root, category.as_deref(), all, json),
        DocSubcommand::Show { category, name } => show(root, &category, &name, json),
        DocSubcommand::Add {
            category,
            name,
            path,
            summary,
            agent,
            depends_on,
        } => {
            let tokens = std::fs::read_to_string(root.join(&path))
                .map(|s| estimate_tokens(&s))
                .unwrap_or(0);
            let record = DocumentRecord::new(category, name, path)
                .with_summary(summary)
                .with_agent(agent)
                .with_tokens(tokens, None)
                .with_dependencies(depends_on);
            add(root, record, json)
        }
        DocSubcommand::Archive { category, name } => archive(root, &category, &name, json),
        DocSubcommand::Search { term } => search(root, &term, json),
    }
}

fn load(root: &Path) -> anyhow::Result<DocumentRegistry> {
    DocumentRegistry::load(root).context("failed to load document registry")
}

fn list(root: &Path, category: Option<&str>, all: bool, json: bool) -> anyhow::Result<()> {
    let registry = load(root)?;
    let records: Vec<&DocumentRecord> = match (category, all) {
        (Some(c), false) => registry.list_by_category(c).collect(),
        (Some(c), true) => registry.iter().filter(|r| r.category == c).collect(),
        (None, false) => registry.active().collect(),
        (None, true) => registry.iter().collect(),
    };

    if json {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.category.clone(),
                r.name.clone(),
                r.status.to_string(),
                r.token_counts.markdown.to_string(),
                r.agent.clone(),
                truncate(&r.summary, 50),
            ]
        })
        .collect();
    print_table(
        &["CATEGORY", "NAME", "STATUS", "TOKENS", "AGENT", "SUMMARY"],
        rows,
    );
    Ok(())
}

fn show(root: &Path, category: &str, name: &str, json: bool) -> anyhow::Result<()> {
    let registry = load(root)?;
    let record = registry.get(category, name)?;

    if json {
        return print_json(record);
    }

    println!("Document:     {}/{}", record.category, record.name);
    println!("Path:         {}", record.path);
    println!("Status:       {}", record.status);
    if !record.summary.is_empty() {
        println!("Summary:      {}", record.summary);
    }
    if !record.agent.is_empty() {
        println!("Agent:        {}", record.agent);
    }
    match record.token_counts.json {
        Some(j) => println!(
            "Tokens:       {} markdown, {j} json",
            record.token_counts.markdown
        ),
        None => println!("Tokens:       {} markdown", record.token_counts.markdown),
    }
    if !record.dependencies.is_empty() {
        println!("Depends on:   {}", record.dependencies.join(", "));
    }
    println!("Created:      {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Updated:      {}", record.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(at) = record.archived_at {
        println!("Archived:     {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

fn add(root: &Path, record: DocumentRecord, json: bool) -> anyhow::Result<()> {
    let shared = SharedRegistry::new(load(root)?);
    let (outcome, stored) = shared.upsert(record)?;
    shared.save(root).context("failed to save document registry")?;

    if json {
        return print_json(&serde_json::json!({
            "outcome": outcome,
            "record": stored,
        }));
    }
    let verb = match outcome {
        agile_core::registry::UpsertOutcome::Created => "Registered",
        agile_core::registry::UpsertOutcome::Updated => "Updated",
    };
    println!("{verb}: {}/{}", stored.category, stored.name);
    Ok(())
}

fn archive(root: &Path, category: &str, name: &str, json: bool) -> anyhow::Result<()> {
    DocumentRegistry::update(root, |registry| registry.remove(category, name))
        .context("failed to archive document")?;

    if json {
        return print_json(&serde_json::json!({
            "category": category,
            "name": name,
            "status": "archived",
        }));
    }
    println!("Archived: {category}/{name}");
    Ok(())
}

fn search(root: &Path, term: &str, json: bool) -> anyhow::Result<()> {
    let shared = SharedRegistry::new(load(root)?);
    let hits = shared.search(term)?;

    if json {
        return print_json(&hits);
    }

    if hits.is_empty() {
        println!("No documents match '{}'.", term.trim());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = hits
        .iter()
        .map(|h| {
            let fields: Vec<&str> = h.matched_fields.iter().map(|f| f.as_str()).collect();
            vec![
                h.record.category.clone(),
                h.record.name.clone(),
                fields.join(","),
                truncate(&h.record.summary, 50),
            ]
        })
        .collect();
    print_table(&["CATEGORY", "NAME", "MATCHED", "SUMMARY"], rows);
    Ok(())
}
