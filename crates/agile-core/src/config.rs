use crate::error::{AgileError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// CommandsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Token replaced by the operator's argument string.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    /// Project-relative command directories, highest priority first.
    #[serde(default = "default_command_dirs")]
    pub dirs: Vec<String>,
    /// Also load `~/.claude/commands` after the project directories.
    #[serde(default = "default_true")]
    pub include_user_commands: bool,
}

fn default_placeholder() -> String {
    "$ARGUMENTS".to_string()
}

fn default_command_dirs() -> Vec<String> {
    vec![paths::CLAUDE_COMMANDS_DIR.to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            placeholder: default_placeholder(),
            dirs: default_command_dirs(),
            include_user_commands: default_true(),
        }
    }
}

impl CommandsConfig {
    /// Resolve the directories to scan, in priority order.
    pub fn search_dirs(&self, root: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.dirs.iter().map(|d| root.join(d)).collect();
        if self.include_user_commands {
            if let Some(user) = paths::user_commands_dir() {
                if !dirs.contains(&user) {
                    dirs.push(user);
                }
            }
        }
        dirs
    }
}

// ---------------------------------------------------------------------------
// DocumentsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Directory generated artifacts are written under.
    #[serde(default = "default_documents_root")]
    pub root: String,
}

fn default_documents_root() -> String {
    "project-documents".to_string()
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_documents_root(),
        }
    }
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,
    /// Custom path to the `claude` binary (default: `claude` on PATH).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_path: Option<String>,
}

fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}

fn default_max_turns() -> u32 {
    40
}

fn default_permission_mode() -> String {
    "acceptEdits".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_turns: default_max_turns(),
            permission_mode: default_permission_mode(),
            claude_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            commands: CommandsConfig::default(),
            documents: DocumentsConfig::default(),
            agent: AgentConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(AgileError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.commands.placeholder.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "commands.placeholder is empty; arguments can never be bound".into(),
            });
        }

        let mut seen = HashSet::new();
        for dir in &self.commands.dirs {
            if !seen.insert(dir.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("command directory '{dir}' listed more than once"),
                });
            }
        }

        if self.agent.max_turns == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "agent.max_turns is 0; every run will stop immediately".into(),
            });
        }

        if self.documents.root.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "documents.root is empty; artifacts land in the project root".into(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::new("shop");
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project.name, "shop");
        assert_eq!(loaded.commands.placeholder, "$ARGUMENTS");
        assert_eq!(loaded.agent, AgentConfig::default());
    }

    #[test]
    fn config_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(AgileError::NotInitialized)
        ));
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str("project:\n  name: x\n").unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.commands.dirs, vec![".claude/commands".to_string()]);
        assert!(cfg.commands.include_user_commands);
        assert_eq!(cfg.documents.root, "project-documents");
        assert_eq!(cfg.agent.max_turns, 40);
    }

    #[test]
    fn default_config_has_no_warnings() {
        assert!(Config::new("p").validate().is_empty());
    }

    #[test]
    fn validate_flags_empty_placeholder_and_duplicates() {
        let mut cfg = Config::new("p");
        cfg.commands.placeholder = "  ".into();
        cfg.commands.dirs.push(".claude/commands".into());
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));
        assert!(warnings.iter().any(|w| w.message.contains("more than once")));
    }

    #[test]
    fn search_dirs_project_first() {
        let mut cfg = CommandsConfig::default();
        cfg.include_user_commands = false;
        cfg.dirs.push("extra/commands".into());
        let dirs = cfg.search_dirs(Path::new("/p"));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/p/.claude/commands"),
                PathBuf::from("/p/extra/commands")
            ]
        );
    }
}
