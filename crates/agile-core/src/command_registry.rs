use crate::command::CommandDefinition;
use crate::config::Config;
use crate::error::{AgileError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Load-then-serve mapping from command name to definition.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, CommandDefinition>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the directories named in `config`.
    pub fn from_config(root: &Path, config: &Config) -> Result<Self> {
        Self::load(&config.commands.search_dirs(root))
    }

    /// Load every `*.md` file from `dirs`, earlier directories taking
    /// precedence. Missing directories are skipped; unparseable files are
    /// logged and skipped.
    pub fn load(dirs: &[PathBuf]) -> Result<Self> {
        let mut registry = Self::new();
        for dir in dirs {
            let files = match list_command_files(dir) {
                Ok(files) => files,
                Err(AgileError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(dir = %dir.display(), "command directory does not exist, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            for path in files {
                let def = match CommandDefinition::load(&path) {
                    Ok(def) => def,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping command file");
                        continue;
                    }
                };
                match registry.register(def) {
                    Ok(()) => debug!(path = %path.display(), "loaded command"),
                    Err(AgileError::DuplicateCommand(name)) => {
                        debug!(command = %name, path = %path.display(), "shadowed by earlier directory");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, def: CommandDefinition) -> Result<()> {
        if self.commands.contains_key(&def.name) {
            return Err(AgileError::DuplicateCommand(def.name));
        }
        self.commands.insert(def.name.clone(), def);
        Ok(())
    }

    /// Look up a command. A leading `/` is accepted (`/debug` == `debug`).
    pub fn resolve(&self, name: &str) -> Result<&CommandDefinition> {
        let key = name.trim().trim_start_matches('/');
        self.commands
            .get(key)
            .ok_or_else(|| AgileError::UnknownCommand(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// All commands sorted by name.
    pub fn list(&self) -> Vec<&CommandDefinition> {
        let mut all: Vec<_> = self.commands.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// `*.md` files in `dir`, sorted so loading is deterministic.
fn list_command_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
