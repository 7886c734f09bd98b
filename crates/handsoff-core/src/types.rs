//! Decision vocabulary shared by every tier of the permission cascade.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The category of action being gated.
///
/// Known tool names map onto dedicated variants; anything else is carried
/// through as [`OperationKind::Other`] so an unfamiliar tool can never crash
/// the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    /// File read.
    Read,
    /// File write.
    Write,
    /// In-place file edit.
    Edit,
    /// Notebook cell edit.
    NotebookEdit,
    /// Shell command.
    Bash,
    /// Content search.
    Grep,
    /// File name search.
    Glob,
    /// Sub-task delegation.
    Task,
    /// Skill invocation.
    Skill,
    /// Network fetch.
    WebFetch,
    /// Web search.
    WebSearch,
    /// Language server query.
    Lsp,
    /// Question addressed to the user.
    AskUserQuestion,
    /// Todo list update.
    TodoWrite,
    /// Any tool without a dedicated variant.
    Other(String),
}

impl OperationKind {
    /// Map a host tool name onto an operation kind.
    #[must_use]
    pub fn from_tool_name(name: &str) -> Self {
        match name {
            "Read" => Self::Read,
            "Write" => Self::Write,
            "Edit" => Self::Edit,
            "NotebookEdit" => Self::NotebookEdit,
            "Bash" => Self::Bash,
            "Grep" => Self::Grep,
            "Glob" => Self::Glob,
            "Task" => Self::Task,
            "Skill" => Self::Skill,
            "WebFetch" => Self::WebFetch,
            "WebSearch" => Self::WebSearch,
            "LSP" => Self::Lsp,
            "AskUserQuestion" => Self::AskUserQuestion,
            "TodoWrite" => Self::TodoWrite,
            other => Self::Other(other.to_string()),
        }
    }

    /// The host tool name for this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Read => "Read",
            Self::Write => "Write",
            Self::Edit => "Edit",
            Self::NotebookEdit => "NotebookEdit",
            Self::Bash => "Bash",
            Self::Grep => "Grep",
            Self::Glob => "Glob",
            Self::Task => "Task",
            Self::Skill => "Skill",
            Self::WebFetch => "WebFetch",
            Self::WebSearch => "WebSearch",
            Self::Lsp => "LSP",
            Self::AskUserQuestion => "AskUserQuestion",
            Self::TodoWrite => "TodoWrite",
            Self::Other(name) => name,
        }
    }

    /// Whether targets of this kind are shell command lines.
    #[must_use]
    pub fn is_shell(&self) -> bool {
        matches!(self, Self::Bash)
    }
}

impl From<String> for OperationKind {
    fn from(name: String) -> Self {
        Self::from_tool_name(&name)
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission tier.
///
/// `Deny` and `Allow` are terminal; `Ask` triggers escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Refuse the operation.
    Deny,
    /// Defer to a higher authority.
    Ask,
    /// Permit the operation.
    Allow,
}

impl Tier {
    /// Rule tiers in evaluation order. The first match in this order wins.
    pub const EVALUATION_ORDER: [Tier; 3] = [Tier::Deny, Tier::Ask, Tier::Allow];

    /// Lowercase tier name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deny => "deny",
            Self::Ask => "ask",
            Self::Allow => "allow",
        }
    }

    /// Parse the leading token of a free-form verdict, case-insensitively.
    ///
    /// `"Allow."` and `"deny because ..."` both parse; anything whose first
    /// characters are not a tier name yields `None`.
    #[must_use]
    pub fn from_leading_token(text: &str) -> Option<Self> {
        let lowered = text.trim_start().to_ascii_lowercase();
        Self::EVALUATION_ORDER
            .into_iter()
            .find(|tier| lowered.starts_with(tier.as_str()))
    }

    /// Whether this tier ends the cascade.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Ask)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which authority produced a final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionSource {
    /// The static rule table.
    Rules,
    /// The secondary judge model.
    JudgeModel,
    /// A human approver.
    Human,
    /// An internal fault forced the fail-safe default.
    ErrorFallback,
}

impl DecisionSource {
    /// Stable kebab-case name, used in logs and audit file names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rules => "rules",
            Self::JudgeModel => "judge-model",
            Self::Human => "human",
            Self::ErrorFallback => "error-fallback",
        }
    }
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a permission rule was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleSource {
    /// Compiled into the binary.
    Builtin,
    /// The committed project configuration file.
    ProjectConfig,
    /// The uncommitted local/user configuration file.
    UserConfig,
}

impl RuleSource {
    /// Stable kebab-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::ProjectConfig => "project-config",
            Self::UserConfig => "user-config",
        }
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_round_trip_through_kind() {
        for name in ["Read", "Bash", "LSP", "TodoWrite", "mcp__github__create_issue"] {
            assert_eq!(OperationKind::from_tool_name(name).as_str(), name);
        }
        assert_eq!(OperationKind::from_tool_name("LSP"), OperationKind::Lsp);
    }

    #[test]
    fn kind_serializes_as_tool_name() {
        let json = serde_json::to_string(&OperationKind::WebFetch).unwrap();
        assert_eq!(json, "\"WebFetch\"");
        let kind: OperationKind = serde_json::from_str("\"Mystery\"").unwrap();
        assert_eq!(kind, OperationKind::Other("Mystery".to_string()));
    }

    #[test]
    fn leading_token_parsing_is_case_insensitive() {
        assert_eq!(Tier::from_leading_token("ALLOW"), Some(Tier::Allow));
        assert_eq!(Tier::from_leading_token("  deny: destructive"), Some(Tier::Deny));
        assert_eq!(Tier::from_leading_token("Ask. unclear intent"), Some(Tier::Ask));
        assert_eq!(Tier::from_leading_token("I think allow"), None);
        assert_eq!(Tier::from_leading_token(""), None);
    }

    #[test]
    fn only_ask_is_non_terminal() {
        assert!(Tier::Deny.is_terminal());
        assert!(Tier::Allow.is_terminal());
        assert!(!Tier::Ask.is_terminal());
    }

    #[test]
    fn evaluation_order_is_deny_ask_allow() {
        assert_eq!(Tier::EVALUATION_ORDER, [Tier::Deny, Tier::Ask, Tier::Allow]);
    }

    #[test]
    fn source_names_are_kebab_case() {
        assert_eq!(DecisionSource::JudgeModel.to_string(), "judge-model");
        assert_eq!(DecisionSource::ErrorFallback.to_string(), "error-fallback");
        assert_eq!(RuleSource::ProjectConfig.to_string(), "project-config");
        let json = serde_json::to_string(&DecisionSource::Human).unwrap();
        assert_eq!(json, "\"human\"");
    }
}
