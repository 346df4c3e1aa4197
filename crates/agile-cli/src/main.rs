mod cmd;
mod collaborator;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    command::CommandSubcommand, config::ConfigSubcommand, doc::DocSubcommand,
    state::StateSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agile",
    about = "Dispatch agent commands and track the documents they produce",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .agile/ or .git/)
    #[arg(long, global = true, env = "AGILE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize agile state in the current project
    Init,

    /// Inspect registered commands
    Command {
        #[command(subcommand)]
        subcommand: CommandSubcommand,
    },

    /// Dispatch a command: bind arguments, invoke Claude, register the artifact
    Run {
        /// Command name, with or without a leading `/`
        name: String,

        /// Argument string substituted for the placeholder
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        /// Print the bound prompt and request without invoking Claude
        #[arg(long)]
        dry_run: bool,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Maximum agent turns override
        #[arg(long)]
        max_turns: Option<u32>,
    },

    /// Manage the document registry
    Doc {
        #[command(subcommand)]
        subcommand: DocSubcommand,
    },

    /// Inspect and check `.agile/config.yaml`
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Show or move the project workflow state
    State {
        #[command(subcommand)]
        subcommand: Option<StateSubcommand>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { dry_run: false, .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Command { subcommand } => cmd::command::run(&root, subcommand, cli.json),
        Commands::Run {
            name,
            args,
            dry_run,
            model,
            max_turns,
        } => cmd::run::run(
            &root,
            cmd::run::RunArgs {
                name,
                args: args.join(" "),
                dry_run,
                model,
                max_turns,
            },
            cli.json,
        ),
        Commands::Doc { subcommand } => cmd::doc::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::State { subcommand } => cmd::state::run(
            &root,
            subcommand.unwrap_or(StateSubcommand::Show),
            cli.json,
        ),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
