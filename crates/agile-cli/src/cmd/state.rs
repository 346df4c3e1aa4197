use crate::output::{print_json, print_table};
use agile_core::workflow::{HistoryEntry, Phase, WorkflowState, WorkflowStatus};
use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand, Clone)]
pub enum StateSubcommand {
    /// Show the current phase, status and blockers
    Show,
    /// Request approval to leave the current phase
    Advance,
    /// Approve the pending transition and move to the next phase
    Approve,
    /// Reject the pending transition and stay in the current phase
    Reject,
    /// Mark the workflow blocked
    Block {
        #[arg(required = true, num_args = 1..)]
        reason: Vec<String>,
    },
    /// Clear all blockers
    Unblock,
    /// Set the active sprint
    Sprint { name: String },
    /// List dispatched commands, newest last
    History {
        /// Only runs made during this phase (e.g. `research`, `quality-assurance`)
        #[arg(long)]
        phase: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: StateSubcommand, json: bool) -> anyhow::Result<()> {
    let mut state = WorkflowState::load(root).context("failed to load workflow state")?;

    let message = match subcmd {
        StateSubcommand::Show => return show(&state, json),
        StateSubcommand::History { phase } => {
            let phase = phase.as_deref().map(str::parse::<Phase>).transpose()?;
            return history(&state, phase, json);
        }
        StateSubcommand::Advance => {
            state.request_advance()?;
            match state.current_phase.next() {
                Some(next) => format!("Awaiting approval: {} -> {next}", state.current_phase),
                None => format!("Awaiting approval: {}", state.current_phase),
            }
        }
        StateSubcommand::Approve => {
            let phase = state.approve()?;
            format!("Advanced to: {phase} ({}%)", state.progress_percentage)
        }
        StateSubcommand::Reject => {
            state.reject()?;
            format!("Rejected. Staying in: {}", state.current_phase)
        }
        StateSubcommand::Block { reason } => {
            let reason = reason.join(" ");
            state.block(reason.as_str())?;
            format!("Blocked: {reason}")
        }
        StateSubcommand::Unblock => {
            state.unblock()?;
            "Unblocked".to_string()
        }
        StateSubcommand::Sprint { name } => {
            let msg = format!("Active sprint: {name}");
            state.set_sprint(Some(name));
            msg
        }
    };

    state.save(root).context("failed to save workflow state")?;

    if json {
        return print_json(&state);
    }
    println!("{message}");
    Ok(())
}

fn show(state: &WorkflowState, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(state);
    }

    println!(
        "Phase:    {} ({}/{}, {}%)",
        state.current_phase,
        state.current_phase.index() + 1,
        Phase::all().len(),
        state.progress_percentage
    );
    println!("Status:   {}", state.status);
    if let Some(sprint) = &state.active_sprint {
        println!("Sprint:   {sprint}");
    }
    if let Some(next) = &state.next_action {
        println!("Next:     {next}");
    } else if state.status == WorkflowStatus::Active {
        println!("Next:     agile state advance");
    }
    println!("Activity: {}", ago(state.last_activity));

    if !state.blockers.is_empty() {
        println!("\nBlockers:");
        for b in &state.blockers {
            println!("  - {b}");
        }
    }

    if let Some(last) = state.last_dispatch() {
        println!("\nLast run: /{} ({}, during {})", last.command, last.outcome, last.phase);
    }
    Ok(())
}

fn history(state: &WorkflowState, phase: Option<Phase>, json: bool) -> anyhow::Result<()> {
    let entries: Vec<&HistoryEntry> = match phase {
        Some(p) => state.history_in(p).collect(),
        None => state.history.iter().collect(),
    };

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                format!("/{}", e.command),
                e.outcome.clone(),
                e.phase.to_string(),
                ago(e.timestamp),
            ]
        })
        .collect();
    print_table(&["COMMAND", "OUTCOME", "PHASE", "WHEN"], rows);
    Ok(())
}

fn ago(at: chrono::DateTime<Utc>) -> String {
    let secs = (Utc::now() - at).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
