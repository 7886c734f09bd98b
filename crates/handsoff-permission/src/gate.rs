//! The decision cascade.
//!
//! ```text
//! rules ──deny/allow──────────────────────────────▶ done
//!   │ ask
//!   ├──────────────────────────▶ human ──────────▶ done
//!   │ silent                       ▲
//!   └──▶ judge ──deny/allow──▶ done│
//!          │ ask ──────────────────┘
//! ```
//!
//! Every request produces a decision. Faults inside a tier resolve to
//! `ask`, and a panic anywhere in the cascade resolves to `ask` with the
//! `error-fallback` source.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use handsoff_audit::DecisionLog;
use handsoff_config::Config;
use handsoff_core::{DecisionSource, OperationKind, Tier};
use handsoff_telegram::{ApprovalChannel, ApprovalOutcome, ApprovalSettings, TelegramBot};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::extract::extract_target;
use crate::judge::Judge;
use crate::normalize::normalize_command;
use crate::rules::{RuleCache, RuleTable};

/// One gated operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    /// The requested tool.
    pub kind: OperationKind,
    /// Target as extracted from the payload.
    pub raw_target: String,
    /// Target used for rule matching.
    pub normalized_target: String,
    /// Requesting session.
    pub session_id: String,
    /// JSONL transcript of the session, if the host provided one.
    pub transcript: Option<PathBuf>,
}

impl DecisionRequest {
    /// Build a request. Shell targets are normalized for matching.
    #[must_use]
    pub fn new(
        kind: OperationKind,
        raw_target: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        let raw_target = raw_target.into();
        let normalized_target = if kind.is_shell() {
            normalize_command(&raw_target)
        } else {
            raw_target.clone()
        };
        Self {
            kind,
            raw_target,
            normalized_target,
            session_id: session_id.into(),
            transcript: None,
        }
    }

    /// Build a request from a tool payload.
    #[must_use]
    pub fn from_payload(
        kind: OperationKind,
        payload: &Value,
        session_id: impl Into<String>,
    ) -> Self {
        let target = extract_target(&kind, payload);
        Self::new(kind, target, session_id)
    }

    /// Attach the session transcript.
    #[must_use]
    pub fn with_transcript(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript = Some(path.into());
        self
    }
}

/// The outcome of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionResult {
    /// Final tier.
    pub tier: Tier,
    /// Authority that produced it.
    pub source: DecisionSource,
}

impl DecisionResult {
    /// A decision from `source`.
    #[must_use]
    pub fn new(tier: Tier, source: DecisionSource) -> Self {
        Self { tier, source }
    }

    /// The fail-safe decision.
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(Tier::Ask, DecisionSource::ErrorFallback)
    }
}

/// Runs the cascade for each gated operation.
#[derive(Debug)]
pub struct PermissionGate {
    rules: RuleCache,
    judge: Judge,
    approval: Option<ApprovalChannel>,
    audit: Option<DecisionLog>,
}

impl PermissionGate {
    /// A gate with only the rule tier active.
    #[must_use]
    pub fn new(rules: RuleCache) -> Self {
        Self {
            rules,
            judge: Judge::disabled(),
            approval: None,
            audit: None,
        }
    }

    /// Assemble a gate from configuration.
    ///
    /// The human tier is enabled only when approval is configured with
    /// credentials; the decision log only when auditing is enabled.
    #[must_use]
    pub fn from_config(config: &Config, rules: RuleCache, session_dir: &Path) -> Self {
        let mut gate = Self::new(rules).with_judge(Judge::new(config.judge.clone()));

        let approval = &config.approval;
        if approval.is_active() {
            let settings = ApprovalSettings::new(approval.chat_id.clone())
                .with_timeout(approval.timeout())
                .with_poll_interval(approval.poll_interval())
                .with_allowed_users(approval.allowed_user_ids.iter().copied());
            let bot = TelegramBot::new(approval.token.clone());
            gate = gate.with_approval(ApprovalChannel::new(Arc::new(bot), settings));
        }

        if config.audit.enabled {
            gate = gate.with_audit(DecisionLog::new(session_dir));
        }
        gate
    }

    /// Use `judge` for rule-silent requests.
    #[must_use]
    pub fn with_judge(mut self, judge: Judge) -> Self {
        self.judge = judge;
        self
    }

    /// Escalate `ask` outcomes to a human over `channel`.
    #[must_use]
    pub fn with_approval(mut self, channel: ApprovalChannel) -> Self {
        self.approval = Some(channel);
        self
    }

    /// Record every decision in `log`.
    #[must_use]
    pub fn with_audit(mut self, log: DecisionLog) -> Self {
        self.audit = Some(log);
        self
    }

    /// The rule cache backing the rule tier.
    #[must_use]
    pub fn rules(&self) -> &RuleCache {
        &self.rules
    }

    /// Decide one request. Never fails and never defaults to `allow`.
    pub async fn decide(&self, request: &DecisionRequest) -> DecisionResult {
        let result = match AssertUnwindSafe(self.cascade(request)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    tool = %request.kind,
                    target = %request.raw_target,
                    "Decision cascade panicked, falling back to ask"
                );
                DecisionResult::fallback()
            },
        };

        info!(
            tool = %request.kind,
            decision = %result.tier,
            source = %result.source,
            "Permission decided"
        );
        self.record(request, result);
        result
    }

    async fn cascade(&self, request: &DecisionRequest) -> DecisionResult {
        let table = self.rules.table();
        if let Some(hit) = table.evaluate(&request.kind, &request.normalized_target) {
            debug!(
                tool = %request.kind,
                pattern = %hit.pattern,
                rule_source = %hit.source,
                tier = %hit.tier,
                "Rule matched"
            );
            let tier = restrict(&table, hit.tier);
            if tier.is_terminal() {
                return DecisionResult::new(tier, DecisionSource::Rules);
            }
            // `ask` goes straight to a human; the judge is skipped.
            return self
                .ask_human(request)
                .await
                .unwrap_or(DecisionResult::new(Tier::Ask, DecisionSource::Rules));
        }

        let judged = match self
            .judge
            .evaluate(&request.kind, &request.raw_target, request.transcript.as_deref())
            .await
        {
            Ok(tier) => tier,
            Err(e) => {
                warn!(
                    error = %e,
                    tool = %request.kind,
                    target = %request.raw_target,
                    "Judge tier failed"
                );
                Tier::Ask
            },
        };
        let judged = restrict(&table, judged);
        if judged.is_terminal() {
            return DecisionResult::new(judged, DecisionSource::JudgeModel);
        }

        self.ask_human(request)
            .await
            .unwrap_or(DecisionResult::new(Tier::Ask, DecisionSource::JudgeModel))
    }

    /// `None` when no human tier is configured.
    async fn ask_human(&self, request: &DecisionRequest) -> Option<DecisionResult> {
        let channel = self.approval.as_ref()?;
        let outcome = channel
            .request(request.kind.as_str(), &request.raw_target, &request.session_id)
            .await;
        if let ApprovalOutcome::Inconclusive(reason) = outcome {
            warn!(
                tool = %request.kind,
                target = %request.raw_target,
                %reason,
                "Human approval inconclusive"
            );
        }
        Some(DecisionResult::new(outcome.tier(), DecisionSource::Human))
    }

    fn record(&self, request: &DecisionRequest, result: DecisionResult) {
        let Some(log) = &self.audit else {
            return;
        };
        if let Err(e) = log.record(
            &request.session_id,
            &request.kind,
            &request.raw_target,
            result.tier,
            result.source,
        ) {
            warn!(error = %e, "Failed to record decision");
        }
    }
}

/// Hold `allow` at `ask` when the table is missing configured rules.
fn restrict(table: &RuleTable, tier: Tier) -> Tier {
    if table.is_restricted() && tier == Tier::Allow {
        debug!("Configured rules unavailable, holding allow at ask");
        Tier::Ask
    } else {
        tier
    }
}
