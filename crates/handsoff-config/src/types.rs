//! Configuration types.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration. This crate has no dependencies on other handsoff crates;
//! rule specs are converted into matcher rules by `handsoff-permission`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
///
/// Permission rule tables are not part of the merged tree: they are kept per
/// layer (see [`LayerRules`](crate::LayerRules)) so each rule remembers which
/// file it came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Secondary judge model tier.
    pub judge: JudgeConfig,
    /// Human approval tier over Telegram.
    pub approval: ApprovalConfig,
    /// Poll loop and worker pool.
    pub server: ServerConfig,
    /// External work tracker (GitHub project board).
    pub tracker: TrackerConfig,
    /// Decision audit trail.
    pub audit: AuditConfig,
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// One `[permissions]` table: rule specs grouped by tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Rules that permit an operation.
    pub allow: Vec<RuleSpec>,
    /// Rules that escalate an operation.
    pub ask: Vec<RuleSpec>,
    /// Rules that refuse an operation.
    pub deny: Vec<RuleSpec>,
}

impl PermissionsConfig {
    /// Whether the table carries no rules at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.ask.is_empty() && self.deny.is_empty()
    }
}

/// A rule as written in a config file.
///
/// Either a bare regex (applies to shell commands) or a table naming the
/// tool explicitly:
///
/// ```toml
/// allow = ["^npm test", { tool = "Read", pattern = "^/srv/" }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSpec {
    /// A shell command pattern.
    Pattern(String),
    /// A pattern scoped to a named tool.
    Scoped {
        /// Tool name, `Bash` when omitted.
        #[serde(default = "default_rule_tool")]
        tool: String,
        /// Regex searched against the operation target.
        pattern: String,
    },
}

fn default_rule_tool() -> String {
    "Bash".to_owned()
}

impl RuleSpec {
    /// The tool this rule applies to.
    #[must_use]
    pub fn tool(&self) -> &str {
        match self {
            Self::Pattern(_) => "Bash",
            Self::Scoped { tool, .. } => tool,
        }
    }

    /// The regex source.
    #[must_use]
    pub fn pattern(&self) -> &str {
        match self {
            Self::Pattern(pattern) | Self::Scoped { pattern, .. } => pattern,
        }
    }
}

// ---------------------------------------------------------------------------
// JudgeConfig
// ---------------------------------------------------------------------------

/// The secondary judge model, invoked as an external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Whether rule-silent operations are sent to the judge.
    pub enabled: bool,
    /// Program to run.
    pub command: String,
    /// Arguments; the prompt is written to standard input.
    pub args: Vec<String>,
    /// Bound on a single judgment call.
    pub timeout_secs: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "claude".to_owned(),
            args: vec!["--model".to_owned(), "haiku".to_owned(), "-p".to_owned()],
            timeout_secs: 30,
        }
    }
}

impl JudgeConfig {
    /// The judgment bound as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// ApprovalConfig
// ---------------------------------------------------------------------------

/// Human approval over the Telegram Bot API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Whether `ask` outcomes are escalated to a human.
    pub enabled: bool,
    /// Bot API token.
    #[serde(skip_serializing)]
    pub token: String,
    /// Chat the requests are posted to.
    pub chat_id: String,
    /// How long to wait for a reply.
    pub timeout_secs: u64,
    /// Upper bound on a single long-poll call.
    pub poll_interval_secs: u64,
    /// Responders whose commands are honoured. Empty means anyone in the chat.
    pub allowed_user_ids: Vec<i64>,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: String::new(),
            chat_id: String::new(),
            timeout_secs: 60,
            poll_interval_secs: 5,
            allowed_user_ids: Vec::new(),
        }
    }
}

impl std::fmt::Debug for ApprovalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalConfig")
            .field("enabled", &self.enabled)
            .field("has_token", &!self.token.is_empty())
            .field("chat_id", &self.chat_id)
            .field("timeout_secs", &self.timeout_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("allowed_user_ids", &self.allowed_user_ids)
            .finish()
    }
}

impl ApprovalConfig {
    /// Whether a token and a chat id are both present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }

    /// Whether the human tier should actually run.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.has_credentials()
    }

    /// The reply bound as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The long-poll bound as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Poll loop and worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Poll period, `<N>m` or `<N>s`.
    pub period: String,
    /// Worker slots. Zero disables the scheduler entirely.
    pub num_workers: usize,
    /// Bound on a single `wt`/`gh` invocation.
    pub spawn_timeout_secs: u64,
    /// Worktree helper program.
    pub wt_command: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            period: "5m".to_owned(),
            num_workers: 5,
            spawn_timeout_secs: 120,
            wt_command: "wt".to_owned(),
        }
    }
}

impl ServerConfig {
    /// The poll period as a [`Duration`].
    ///
    /// # Errors
    ///
    /// Returns a validation error if `period` is not `<N>m` or `<N>s`.
    pub fn period(&self) -> ConfigResult<Duration> {
        parse_period(&self.period)
    }

    /// The external call bound as a [`Duration`].
    #[must_use]
    pub fn spawn_timeout(&self) -> Duration {
        Duration::from_secs(self.spawn_timeout_secs)
    }
}

/// Parse a poll period such as `5m` or `300s`.
///
/// # Errors
///
/// Returns a validation error for any other shape, including a missing unit.
pub fn parse_period(raw: &str) -> ConfigResult<Duration> {
    let invalid = || ConfigError::ValidationError {
        field: "server.period".to_owned(),
        message: format!("invalid period '{raw}'; use <N>m or <N>s"),
    };

    let raw = raw.trim();
    if let Some(minutes) = raw.strip_suffix('m') {
        let value: u64 = minutes.parse().map_err(|_| invalid())?;
        value
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(invalid)
    } else if let Some(seconds) = raw.strip_suffix('s') {
        seconds
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| invalid())
    } else {
        Err(invalid())
    }
}

// ---------------------------------------------------------------------------
// TrackerConfig
// ---------------------------------------------------------------------------

/// GitHub project board and repository the poll loop watches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Organization or user that owns the project board.
    pub owner: String,
    /// Project board number.
    pub project_number: u64,
    /// `owner/name` slug of the repository.
    pub repo: String,
    /// Board status that marks an issue as ready.
    pub ready_status: String,
    /// Label an issue must carry to be picked up.
    pub ready_label: String,
    /// Label marking pull requests eligible for conflict repair.
    pub pr_label: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            project_number: 0,
            repo: String::new(),
            ready_status: "Plan Accepted".to_owned(),
            ready_label: "handsoff:plan".to_owned(),
            pr_label: "handsoff:pr".to_owned(),
        }
    }
}

impl TrackerConfig {
    /// Whether a project board is configured.
    #[must_use]
    pub fn has_project(&self) -> bool {
        !self.owner.is_empty() && self.project_number > 0
    }

    /// Web link to an issue, when the repository slug is known.
    #[must_use]
    pub fn issue_url(&self, issue: u64) -> Option<String> {
        (!self.repo.is_empty()).then(|| format!("https://github.com/{}/issues/{issue}", self.repo))
    }
}

// ---------------------------------------------------------------------------
// AuditConfig
// ---------------------------------------------------------------------------

/// Decision audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Whether decisions are appended to the per-source log files.
    pub enabled: bool,
}
