use crate::command::CommandDefinition;
use crate::error::{AgileError, Result};

pub const DEFAULT_PLACEHOLDER: &str = "$ARGUMENTS";

/// Substitutes the operator's argument string into a command template.
#[derive(Debug, Clone)]
pub struct ArgumentBinder {
    placeholder: String,
}

impl Default for ArgumentBinder {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER)
    }
}

impl ArgumentBinder {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Bind `args` into the command's template.
    ///
    /// Non-blank `args` are inserted exactly as given. Blank `args` fall back
    /// to the command's declared default. With no default, a command that
    /// requires an argument fails with `MissingDefault`; any other command
    /// binds the empty string.
    pub fn bind(&self, def: &CommandDefinition, args: &str) -> Result<String> {
        let value = if !args.trim().is_empty() {
            args
        } else if let Some(default) = def.default_argument.as_deref() {
            default
        } else if def.requires_argument {
            return Err(AgileError::MissingDefault(def.name.clone()));
        } else {
            ""
        };
        Ok(self.substitute(&def.template, value))
    }

    /// Replace every occurrence of the placeholder. Single pass: text
    /// inserted from `value` is never rescanned.
    pub fn substitute(&self, template: &str, value: &str) -> String {
        if self.placeholder.is_empty() {
            return template.to_string();
        }
        template.replace(&self.placeholder, value)
    }

    pub fn placeholder_count(&self, template: &str) -> usize {
        if self.placeholder.is_empty() {
            return 0;
        }
        template.matches(&self.placeholder).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binder() -> ArgumentBinder {
        ArgumentBinder::default()
    }

    #[test]
    fn binds_every_occurrence() {
        let def = CommandDefinition::new("debug", "Help with: $ARGUMENTS\n\nAgain: $ARGUMENTS.");
        let out = binder().bind(&def, "null pointer in parser").unwrap();
        assert_eq!(
            out,
            "Help with: null pointer in parser\n\nAgain: null pointer in parser."
        );
        assert_eq!(binder().placeholder_count(&out), 0);
    }

    #[test]
    fn non_placeholder_content_is_untouched() {
        let template = "# Title\n$ARGUMENTS\n- keep $HOME and $1 as-is\n";
        let def = CommandDefinition::new("x", template);
        let out = binder().bind(&def, "scope").unwrap();
        assert_eq!(out, "# Title\nscope\n- keep $HOME and $1 as-is\n");
        // Reversing the substitution recovers the template exactly.
        assert_eq!(out.replacen("scope", "$ARGUMENTS", 1), template);
    }

    #[test]
    fn empty_args_use_default() {
        let def = CommandDefinition::new("analyze", "Analyze: $ARGUMENTS").with_default("Full scope");
        assert_eq!(binder().bind(&def, "").unwrap(), "Analyze: Full scope");
        assert_eq!(binder().bind(&def, "   ").unwrap(), "Analyze: Full scope");
    }

    #[test]
    fn empty_args_required_without_default_fails() {
        let def = CommandDefinition::new("debug", "Help with: $ARGUMENTS").requiring_argument();
        let err = binder().bind(&def, "").unwrap_err();
        assert!(matches!(err, AgileError::MissingDefault(n) if n == "debug"));
    }

    #[test]
    fn empty_args_optional_without_default_binds_empty() {
        let def = CommandDefinition::new("status", "Status $ARGUMENTS");
        assert_eq!(binder().bind(&def, "").unwrap(), "Status ");
    }

    #[test]
    fn required_with_default_uses_default() {
        let def = CommandDefinition::new("x", "$ARGUMENTS")
            .requiring_argument()
            .with_default("everything");
        assert_eq!(binder().bind(&def, "").unwrap(), "everything");
    }

    #[test]
    fn custom_placeholder() {
        let b = ArgumentBinder::new("{{input}}");
        let def = CommandDefinition::new("x", "Do {{input}} now, not $ARGUMENTS");
        assert_eq!(b.bind(&def, "it").unwrap(), "Do it now, not $ARGUMENTS");
    }

    #[test]
    fn surrounding_whitespace_is_kept() {
        let def = CommandDefinition::new("x", "[$ARGUMENTS]");
        assert_eq!(binder().bind(&def, "  padded  ").unwrap(), "[  padded  ]");
    }

    #[test]
    fn args_containing_placeholder_are_not_rescanned() {
        let def = CommandDefinition::new("x", "[$ARGUMENTS]");
        assert_eq!(binder().bind(&def, "$ARGUMENTS").unwrap(), "[$ARGUMENTS]");
    }
}
