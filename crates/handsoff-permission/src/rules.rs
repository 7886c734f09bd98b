//! The static rule table.
//!
//! # Evaluation order
//!
//! 1. Every `deny` rule, in table order
//! 2. Every `ask` rule, in table order
//! 3. Every `allow` rule, in table order
//!
//! The first rule whose tool matches and whose pattern is found in the
//! target wins. Tier decides precedence, not source: a builtin `deny` can
//! never be overridden by a configured `allow`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use handsoff_config::{ConfigLayer, LayerRules, RuleSpec};
use handsoff_core::{OperationKind, RuleSource, Tier};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{PermissionError, PermissionResult};

/// One `(tool, pattern, tier, source)` rule.
#[derive(Clone)]
pub struct PermissionRule {
    /// Tool the rule applies to.
    pub kind: OperationKind,
    /// Regex source, searched anywhere in the target.
    pub pattern: String,
    /// Tier returned on a match.
    pub tier: Tier,
    /// Where the rule was loaded from.
    pub source: RuleSource,
    compiled: Result<Regex, String>,
}

impl fmt::Debug for PermissionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionRule")
            .field("kind", &self.kind)
            .field("pattern", &self.pattern)
            .field("tier", &self.tier)
            .field("source", &self.source)
            .field("valid", &self.compiled.is_ok())
            .finish()
    }
}

impl PermissionRule {
    /// Build a rule. A pattern that does not compile is kept, and reported
    /// as a fault each time it is consulted.
    #[must_use]
    pub fn new(
        kind: OperationKind,
        pattern: impl Into<String>,
        tier: Tier,
        source: RuleSource,
    ) -> Self {
        let pattern = pattern.into();
        let compiled = Regex::new(&pattern).map_err(|e| e.to_string());
        Self {
            kind,
            pattern,
            tier,
            source,
            compiled,
        }
    }

    /// Whether the pattern compiled.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.compiled.is_ok()
    }

    /// Whether the rule applies to `kind` and its pattern occurs in `target`.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::PatternFault`] when the rule applies to
    /// `kind` but its pattern did not compile.
    pub fn matches(&self, kind: &OperationKind, target: &str) -> PermissionResult<bool> {
        if &self.kind != kind {
            return Ok(false);
        }
        match &self.compiled {
            Ok(regex) => Ok(regex.is_match(target)),
            Err(reason) => Err(PermissionError::PatternFault {
                pattern: self.pattern.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

/// A rule that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// The rule's tier.
    pub tier: Tier,
    /// Where the rule came from.
    pub source: RuleSource,
    /// The pattern that matched.
    pub pattern: String,
}

/// An ordered set of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<PermissionRule>,
    restricted: bool,
}

impl RuleTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled-in rules.
    #[must_use]
    pub fn builtin() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .map(|(tool, pattern, tier)| {
                PermissionRule::new(
                    OperationKind::from_tool_name(tool),
                    *pattern,
                    *tier,
                    RuleSource::Builtin,
                )
            })
            .collect();
        Self {
            rules,
            restricted: false,
        }
    }

    /// The table used when configured rules could not be read.
    ///
    /// Builtin rules still apply, but nothing is allowed without a human:
    /// the gate holds every automatic `allow` at `ask`.
    #[must_use]
    pub fn restricted() -> Self {
        Self {
            restricted: true,
            ..Self::builtin()
        }
    }

    /// Whether automatic `allow` decisions are held at `ask`.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    /// Builtin rules followed by the rules of each config layer.
    #[must_use]
    pub fn with_layers(layers: &[LayerRules]) -> Self {
        let mut table = Self::builtin();
        for layer in layers {
            table.extend_from_layer(layer);
        }
        table
    }

    /// Append the rules a config layer declares.
    pub fn extend_from_layer(&mut self, layer: &LayerRules) {
        let source = match layer.layer {
            ConfigLayer::Project => RuleSource::ProjectConfig,
            _ => RuleSource::UserConfig,
        };
        let permissions = &layer.permissions;
        for (tier, specs) in [
            (Tier::Deny, &permissions.deny),
            (Tier::Ask, &permissions.ask),
            (Tier::Allow, &permissions.allow),
        ] {
            for spec in specs {
                self.push_spec(spec, tier, source);
            }
        }
        debug!(path = %layer.path.display(), source = %source, "Loaded permission rules");
    }

    fn push_spec(&mut self, spec: &RuleSpec, tier: Tier, source: RuleSource) {
        let rule = PermissionRule::new(
            OperationKind::from_tool_name(spec.tool()),
            spec.pattern(),
            tier,
            source,
        );
        if !rule.is_valid() {
            warn!(pattern = spec.pattern(), source = %source, "Rule pattern does not compile");
        }
        self.rules.push(rule);
    }

    /// Append a rule.
    pub fn push(&mut self, rule: PermissionRule) {
        self.rules.push(rule);
    }

    /// Append a rule, builder style.
    #[must_use]
    pub fn with_rule(mut self, rule: PermissionRule) -> Self {
        self.push(rule);
        self
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules, in table order.
    pub fn iter(&self) -> impl Iterator<Item = &PermissionRule> {
        self.rules.iter()
    }

    /// Find the first matching rule in deny, ask, allow order.
    ///
    /// `None` means no rule applies and the request must be escalated.
    #[must_use]
    pub fn evaluate(&self, kind: &OperationKind, target: &str) -> Option<RuleMatch> {
        for tier in Tier::EVALUATION_ORDER {
            for rule in self.rules.iter().filter(|r| r.tier == tier) {
                match rule.matches(kind, target) {
                    Ok(true) => {
                        return Some(RuleMatch {
                            tier,
                            source: rule.source,
                            pattern: rule.pattern.clone(),
                        });
                    },
                    Ok(false) => {},
                    Err(e) => warn!(error = %e, tool = %kind, "Skipping rule"),
                }
            }
        }
        None
    }
}

/// Loads the configured rule table once per process.
///
/// The table is rebuilt only after [`RuleCache::invalidate`].
#[derive(Debug)]
pub struct RuleCache {
    workspace: Option<PathBuf>,
    user_dir: Option<PathBuf>,
    cached: Mutex<Option<Arc<RuleTable>>>,
}

impl RuleCache {
    /// Load rules for `workspace` and `~/.handsoff` on first use.
    #[must_use]
    pub fn new(workspace: Option<&Path>) -> Self {
        Self {
            workspace: workspace.map(Path::to_path_buf),
            user_dir: handsoff_config::loader::user_dir(),
            cached: Mutex::new(None),
        }
    }

    /// A cache primed with `table`.
    #[must_use]
    pub fn with_table(table: RuleTable) -> Self {
        Self {
            workspace: None,
            user_dir: None,
            cached: Mutex::new(Some(Arc::new(table))),
        }
    }

    /// Read user-level rules from `dir` instead of `~/.handsoff`.
    #[must_use]
    pub fn with_user_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_dir = Some(dir.into());
        self
    }

    /// The table for a workspace, read now.
    ///
    /// Only the `[permissions]` tables are read, so an invalid setting
    /// elsewhere in a file does not drop its rules. Rules that cannot be
    /// read at all leave the [restricted](RuleTable::restricted) table.
    #[must_use]
    pub fn load_table(workspace: Option<&Path>, user_dir: Option<&Path>) -> RuleTable {
        match handsoff_config::loader::load_rules_with(workspace, user_dir) {
            Ok(layers) => RuleTable::with_layers(&layers),
            Err(e) => {
                warn!(error = %e, "Could not read configured rules, holding allows at ask");
                RuleTable::restricted()
            },
        }
    }

    /// The current table, loading it if needed.
    pub fn table(&self) -> Arc<RuleTable> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = cached.as_ref() {
            return Arc::clone(table);
        }

        let table = Self::load_table(self.workspace.as_deref(), self.user_dir.as_deref());
        let table = Arc::new(table);
        *cached = Some(Arc::clone(&table));
        table
    }

    /// Drop the cached table so the next lookup reloads configuration.
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// The compiled-in rules, grouped by tier.
const BUILTIN_RULES: &[(&str, &str, Tier)] = &[
    // Destructive operations
    ("Bash", r"^cd", Tier::Deny),
    ("Bash", r"^rm -rf", Tier::Deny),
    ("Bash", r"^sudo", Tier::Deny),
    ("Bash", r"^git reset", Tier::Deny),
    ("Bash", r"^git restore", Tier::Deny),
    // Secret files
    ("Read", r"^\.env$", Tier::Deny),
    ("Read", r"^\.env\.", Tier::Deny),
    ("Read", r".*/licenses/.*", Tier::Deny),
    ("Read", r".*/secrets?/.*", Tier::Deny),
    ("Read", r".*/config/credentials\.json$", Tier::Deny),
    ("Read", r"/.*\.key$", Tier::Deny),
    ("Read", r".*\.pem$", Tier::Deny),
    // Git and GitHub writes
    ("Bash", r"^git checkout", Tier::Ask),
    ("Bash", r"^gh api", Tier::Ask),
    ("Bash", r"^gh project item-edit", Tier::Ask),
    // Interpreters and `test` without -f/-d
    ("Bash", r"^python3", Tier::Ask),
    ("Bash", r"^test(\s+($|[^\s-]|-($|[^fd]))|$)", Tier::Ask),
    // Skills
    ("Skill", r"^open-pr$", Tier::Allow),
    ("Skill", r"^open-issue$", Tier::Allow),
    ("Skill", r"^fork-dev-branch$", Tier::Allow),
    ("Skill", r"^commit-msg$", Tier::Allow),
    ("Skill", r"^review-standard$", Tier::Allow),
    ("Skill", r"^external-consensus$", Tier::Allow),
    ("Skill", r"^milestone$", Tier::Allow),
    ("Skill", r"^code-review$", Tier::Allow),
    ("Skill", r"^pull-request$", Tier::Allow),
    // Web
    ("WebSearch", r".*", Tier::Allow),
    ("WebFetch", r".*", Tier::Allow),
    // Files; secrets are caught by the deny rules above
    ("Write", r".*", Tier::Allow),
    ("Edit", r".*", Tier::Allow),
    ("Read", r"^/.*", Tier::Allow),
    // Shell file operations
    ("Bash", r"^chmod \+x", Tier::Allow),
    ("Bash", r"^test -f", Tier::Allow),
    ("Bash", r"^test -d", Tier::Allow),
    ("Bash", r"^date", Tier::Allow),
    ("Bash", r"^echo", Tier::Allow),
    ("Bash", r"^cat", Tier::Allow),
    ("Bash", r"^find", Tier::Allow),
    ("Bash", r"^ls", Tier::Allow),
    ("Bash", r"^wc", Tier::Allow),
    ("Bash", r"^grep", Tier::Allow),
    ("Bash", r"^rg", Tier::Allow),
    ("Bash", r"^tree", Tier::Allow),
    ("Bash", r"^tee", Tier::Allow),
    ("Bash", r"^awk", Tier::Allow),
    ("Bash", r"^xargs ls", Tier::Allow),
    ("Bash", r"^xargs wc", Tier::Allow),
    // Build tools
    ("Bash", r"^ninja", Tier::Allow),
    ("Bash", r"^cmake", Tier::Allow),
    ("Bash", r"^mkdir", Tier::Allow),
    ("Bash", r"^make (all|build|check|lint|setup|test)", Tier::Allow),
    ("Bash", r"^module load", Tier::Allow),
    // Git reads and rebases onto the main line
    ("Bash", r"^git (status|diff|log|show|rev-parse)", Tier::Allow),
    ("Bash", r"^git fetch (origin|upstream)", Tier::Allow),
    ("Bash", r"^git rebase (origin|upstream) (main|master)", Tier::Allow),
    ("Bash", r"^git rebase --continue", Tier::Allow),
    // GitHub reads
    ("Bash", r"^gh search", Tier::Allow),
    ("Bash", r"^gh run (view|list)", Tier::Allow),
    ("Bash", r"^gh pr (view|checks|list|diff|create)", Tier::Allow),
    ("Bash", r"^gh issue (list|view|create)", Tier::Allow),
    ("Bash", r"^gh label list", Tier::Allow),
    ("Bash", r"^gh project (list|field-list|view|item-list)", Tier::Allow),
    ("Bash", r"^\.claude/skills/external-consensus/scripts/external-consensus\.sh", Tier::Allow),
    // Git writes on the worker's own branch
    ("Bash", r"^git add", Tier::Allow),
    ("Bash", r"^git push", Tier::Allow),
    ("Bash", r"^git commit", Tier::Allow),
];
