use crate::output::{print_json, print_table, truncate};
use agile_core::{binder::ArgumentBinder, command_registry::CommandRegistry, config::Config};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum CommandSubcommand {
    /// List registered commands
    List,
    /// Show a command's metadata and template
    Show { name: String },
    /// Print the prompt a command would send, without dispatching it
    Bind {
        name: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

pub fn run(root: &Path, subcmd: CommandSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let registry =
        CommandRegistry::from_config(root, &config).context("failed to load commands")?;

    match subcmd {
        CommandSubcommand::List => list(&registry, json),
        CommandSubcommand::Show { name } => show(&registry, &name, json),
        CommandSubcommand::Bind { name, args } => {
            let binder = ArgumentBinder::new(config.commands.placeholder.clone());
            bind(&registry, &binder, &name, &args.join(" "), json)
        }
    }
}

fn list(registry: &CommandRegistry, json: bool) -> anyhow::Result<()> {
    let commands = registry.list();

    if json {
        let items: Vec<serde_json::Value> = commands
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.name,
                    "description": c.description,
                    "argument_hint": c.argument_hint,
                    "agent": c.agent_name(),
                    "path": c.template_path,
                })
            })
            .collect();
        return print_json(&items);
    }

    if commands.is_empty() {
        println!("No commands. Add markdown files to .claude/commands/.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = commands
        .iter()
        .map(|c| {
            vec![
                format!("/{}", c.name),
                c.argument_hint.clone(),
                c.agent_name().to_string(),
                truncate(c.description(), 60),
            ]
        })
        .collect();
    print_table(&["COMMAND", "ARGS", "AGENT", "DESCRIPTION"], rows);
    Ok(())
}

fn show(registry: &CommandRegistry, name: &str, json: bool) -> anyhow::Result<()> {
    let def = registry.resolve(name)?;

    if json {
        return print_json(def);
    }

    println!("Command:     /{}", def.name);
    println!("File:        {}", def.template_path.display());
    if let Some(desc) = &def.description {
        println!("Description: {desc}");
    }
    if !def.argument_hint.is_empty() {
        println!("Arguments:   {}", def.argument_hint);
    }
    if let Some(default) = &def.default_argument {
        println!("Default:     {default}");
    }
    println!("Required:    {}", if def.requires_argument { "yes" } else { "no" });
    println!("Agent:       {}", def.agent_name());
    if let Some(category) = &def.category {
        println!("Category:    {category}");
    }
    if !def.allowed_tools.is_empty() {
        let tools: Vec<String> = def.allowed_tools.iter().map(|t| t.to_string()).collect();
        println!("Tools:       {}", tools.join(", "));
    }
    println!("\n{}", def.template.trim_end());
    Ok(())
}

fn bind(
    registry: &CommandRegistry,
    binder: &ArgumentBinder,
    name: &str,
    args: &str,
    json: bool,
) -> anyhow::Result<()> {
    let def = registry.resolve(name)?;
    let prompt = binder.bind(def, args)?;

    if json {
        return print_json(&serde_json::json!({
            "command": def.name,
            "prompt": prompt,
        }));
    }
    println!("{prompt}");
    Ok(())
}
