use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const AGILE_DIR: &str = ".agile";
pub const CONFIG_FILE: &str = ".agile/config.yaml";

pub const PROJECT_STATE_DIR: &str = "project-state";
pub const WORKFLOW_STATE_FILE: &str = "project-state/workflow-state.json";

pub const MACHINE_DATA_DIR: &str = "machine-data";
pub const DOCUMENT_REGISTRY_FILE: &str = "machine-data/project-document-registry.json";
pub const DOCUMENT_REGISTRY_LOCK_FILE: &str = "machine-data/project-document-registry.lock";

pub const CLAUDE_COMMANDS_DIR: &str = ".claude/commands";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn agile_dir(root: &Path) -> PathBuf {
    root.join(AGILE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn workflow_state_path(root: &Path) -> PathBuf {
    root.join(WORKFLOW_STATE_FILE)
}

pub fn document_registry_path(root: &Path) -> PathBuf {
    root.join(DOCUMENT_REGISTRY_FILE)
}

/// Advisory lock guarding read-modify-write cycles on the registry file.
pub fn document_registry_lock_path(root: &Path) -> PathBuf {
    root.join(DOCUMENT_REGISTRY_LOCK_FILE)
}

pub fn project_commands_dir(root: &Path) -> PathBuf {
    root.join(CLAUDE_COMMANDS_DIR)
}

/// `~/.claude/commands`, when a home directory can be determined.
pub fn user_commands_dir() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(CLAUDE_COMMANDS_DIR))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
