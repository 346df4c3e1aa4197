use crate::error::{AgileError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// ToolReference
// ---------------------------------------------------------------------------

/// An external capability a command may invoke, e.g. `Read` or
/// `Task(security_specialist)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ToolReference {
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subagent_type: Option<String>,
}

static TOOL_RE: OnceLock<Regex> = OnceLock::new();

fn tool_re() -> &'static Regex {
    TOOL_RE.get_or_init(|| {
        Regex::new(r"^([^\s()]+)\s*(?:\(\s*(.*?)\s*\))?$").expect("static regex is valid")
    })
}

impl ToolReference {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            subagent_type: None,
        }
    }

    pub fn with_subagent(tool_name: impl Into<String>, subagent: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            subagent_type: Some(subagent.into()),
        }
    }

    /// Parse `Name` or `Name(subagent)`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let caps = tool_re()
            .captures(s)
            .ok_or_else(|| AgileError::Validation(format!("malformed tool reference '{s}'")))?;
        let tool_name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if tool_name.is_empty() {
            return Err(AgileError::Validation("tool name must not be empty".into()));
        }
        let subagent_type = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty());
        Ok(Self {
            tool_name: tool_name.to_string(),
            subagent_type,
        })
    }

    /// The form passed to the LLM runtime's allowed-tools list.
    pub fn as_allowed_tool(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ToolReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subagent_type {
            Some(sub) => write!(f, "{}({})", self.tool_name, sub),
            None => f.write_str(&self.tool_name),
        }
    }
}

/// Split a comma-separated tool list, ignoring commas inside parentheses
/// (`Bash(git add, git commit), Read`).
fn split_tool_list(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum ToolList {
    #[default]
    None,
    Csv(String),
    List(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Frontmatter {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    argument_hint: Option<String>,
    #[serde(default)]
    allowed_tools: ToolList,
    #[serde(default)]
    default_argument: Option<String>,
    #[serde(default)]
    requires_argument: bool,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Split markdown into (frontmatter yaml, body). Content without a leading
/// `---` has no frontmatter.
fn split_frontmatter<'a>(content: &'a str, path: &Path) -> Result<(Option<&'a str>, &'a str)> {
    let trimmed = content.trim_start_matches('\u{feff}');
    let Some(rest) = trimmed.strip_prefix("---") else {
        return Ok((None, trimmed));
    };
    let Some(end) = rest.find("\n---") else {
        return Err(AgileError::InvalidFrontmatter {
            path: path.display().to_string(),
            reason: "missing closing '---' delimiter".into(),
        });
    };
    let yaml = &rest[..end];
    let after = &rest[end + 4..];
    // Drop the remainder of the closing delimiter line.
    let body = match after.find('\n') {
        Some(nl) => &after[nl + 1..],
        None => "",
    };
    Ok((Some(yaml), body))
}

// ---------------------------------------------------------------------------
// CommandDefinition
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]*$").expect("static regex is valid")
    })
}

pub fn validate_command_name(name: &str) -> Result<()> {
    if name.len() > 128 || !name_re().is_match(name) {
        return Err(AgileError::Validation(format!(
            "invalid command name '{name}'"
        )));
    }
    Ok(())
}

/// A named prompt template plus the metadata needed to dispatch it.
/// Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,
    pub template_path: PathBuf,
    /// Prompt body after the frontmatter. Forwarded verbatim apart from
    /// argument binding.
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub argument_hint: String,
    #[serde(default)]
    pub allowed_tools: BTreeSet<ToolReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_argument: Option<String>,
    #[serde(default)]
    pub requires_argument: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CommandDefinition {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            template_path: PathBuf::from(format!("{name}.md")),
            name,
            template: template.into(),
            description: None,
            argument_hint: String::new(),
            allowed_tools: BTreeSet::new(),
            default_argument: None,
            requires_argument: false,
            agent: None,
            category: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_argument = Some(default.into());
        self
    }

    pub fn requiring_argument(mut self) -> Self {
        self.requires_argument = true;
        self
    }

    pub fn with_tool(mut self, tool: ToolReference) -> Self {
        self.allowed_tools.insert(tool);
        self
    }

    /// Parse a command file. `name` is normally the file stem.
    pub fn parse(name: impl Into<String>, content: &str, path: PathBuf) -> Result<Self> {
        let name = name.into();
        validate_command_name(&name)?;

        let (yaml, body) = split_frontmatter(content, &path)?;
        let fm: Frontmatter = match yaml {
            Some(y) if !y.trim().is_empty() => {
                serde_yaml::from_str(y).map_err(|e| AgileError::InvalidFrontmatter {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
            _ => Frontmatter::default(),
        };

        let entries: Vec<String> = match fm.allowed_tools {
            ToolList::None => Vec::new(),
            ToolList::Csv(s) => split_tool_list(&s).into_iter().map(str::to_string).collect(),
            ToolList::List(v) => v,
        };
        let mut allowed_tools = BTreeSet::new();
        for entry in entries {
            if entry.trim().is_empty() {
                return Err(AgileError::Validation(format!(
                    "empty entry in allowed-tools of {}",
                    path.display()
                )));
            }
            allowed_tools.insert(ToolReference::parse(&entry)?);
        }

        if fm.requires_argument && fm.default_argument.is_some() {
            tracing::debug!(command = %name, "requires-argument with a default: default wins");
        }

        Ok(Self {
            name,
            template_path: path,
            template: body.to_string(),
            description: fm.description,
            argument_hint: fm.argument_hint.unwrap_or_default(),
            allowed_tools,
            default_argument: fm.default_argument,
            requires_argument: fm.requires_argument,
            agent: fm.agent,
            category: fm.category,
        })
    }

    /// Load and parse a command file, naming it after the file stem.
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| AgileError::Validation(format!("no file name: {}", path.display())))?;
        let content = std::fs::read_to_string(path)?;
        Self::parse(name, &content, path.to_path_buf())
    }

    /// Persona recorded on artifacts this command produces.
    pub fn agent_name(&self) -> &str {
        self.agent.as_deref().unwrap_or(&self.name)
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DEBUG_MD: &str = "---
description: Systematic debugging
argument-hint: <issue description>
allowed-tools: Read, Grep, Task(debugger_agent), Bash(git log, git diff)
requires-argument: true
agent: debugger_agent
---

Help with: $ARGUMENTS
";

    #[test]
    fn parse_full_frontmatter() {
        let cmd = CommandDefinition::parse("debug", DEBUG_MD, "debug.md".into()).unwrap();
        assert_eq!(cmd.name, "debug");
        assert_eq!(cmd.description(), "Systematic debugging");
        assert_eq!(cmd.argument_hint, "<issue description>");
        assert!(cmd.requires_argument);
        assert_eq!(cmd.agent_name(), "debugger_agent");
        assert_eq!(cmd.template, "\nHelp with: $ARGUMENTS\n");
        assert_eq!(cmd.allowed_tools.len(), 4);
        assert!(cmd
            .allowed_tools
            .contains(&ToolReference::with_subagent("Task", "debugger_agent")));
        assert!(cmd
            .allowed_tools
            .contains(&ToolReference::with_subagent("Bash", "git log, git diff")));
    }

    #[test]
    fn parse_without_frontmatter() {
        let cmd = CommandDefinition::parse("plain", "Just do $ARGUMENTS", "plain.md".into())
            .unwrap();
        assert_eq!(cmd.template, "Just do $ARGUMENTS");
        assert!(cmd.allowed_tools.is_empty());
        assert!(!cmd.requires_argument);
        assert_eq!(cmd.agent_name(), "plain");
    }

    #[test]
    fn parse_tool_list_as_yaml_sequence() {
        let md = "---\nallowed-tools:\n  - Read\n  - Task(coder_agent)\ndefault-argument: Full scope\n---\nbody";
        let cmd = CommandDefinition::parse("x", md, "x.md".into()).unwrap();
        assert_eq!(cmd.default_argument.as_deref(), Some("Full scope"));
        assert_eq!(cmd.template, "body");
        let tools: Vec<String> = cmd.allowed_tools.iter().map(|t| t.to_string()).collect();
        assert_eq!(tools, vec!["Read", "Task(coder_agent)"]);
    }

    #[test]
    fn unclosed_frontmatter_rejected() {
        let err = CommandDefinition::parse("x", "---\ndescription: oops\n", "x.md".into())
            .unwrap_err();
        assert!(matches!(err, AgileError::InvalidFrontmatter { .. }));
    }

    #[test]
    fn empty_tool_entry_rejected() {
        let md = "---\nallowed-tools: Read, , Grep\n---\nbody";
        let err = CommandDefinition::parse("x", md, "x.md".into()).unwrap_err();
        assert!(matches!(err, AgileError::Validation(_)));
    }

    #[test]
    fn unknown_frontmatter_keys_ignored() {
        let md = "---\nmodel: opus\ndescription: d\n---\nbody";
        let cmd = CommandDefinition::parse("x", md, "x.md".into()).unwrap();
        assert_eq!(cmd.description(), "d");
    }

    #[test]
    fn invalid_names_rejected() {
        for name in ["", "has space", "/slash", "-dash"] {
            assert!(
                CommandDefinition::parse(name, "t", "t.md".into()).is_err(),
                "expected invalid: {name}"
            );
        }
    }

    #[test]
    fn tool_reference_roundtrips_display() {
        let t = ToolReference::parse(" Task( tester ) ").unwrap();
        assert_eq!(t.tool_name, "Task");
        assert_eq!(t.subagent_type.as_deref(), Some("tester"));
        assert_eq!(t.as_allowed_tool(), "Task(tester)");
        assert!(ToolReference::parse("   ").is_err());
    }

    #[test]
    fn load_uses_file_stem() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sprint-retrospective.md");
        std::fs::write(&path, "Retro for $ARGUMENTS").unwrap();
        let cmd = CommandDefinition::load(&path).unwrap();
        assert_eq!(cmd.name, "sprint-retrospective");
        assert_eq!(cmd.template_path, path);
    }
}
