//! GitHub work tracker driven through the `gh` CLI.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use handsoff_config::TrackerConfig;
use handsoff_core::{BoundedCall, RepairItem, WorkError, WorkItem, WorkResult, WorkTracker};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::command::run_checked;

/// Upper bound on project items fetched per cycle.
pub const PROJECT_ITEM_LIMIT: u32 = 500;

static ISSUE_BRANCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^issue-(\d+)").expect("invalid regex"));
static BODY_ISSUE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\d+)").expect("invalid regex"));

/// Output of `gh project item-list --format json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectItems {
    /// Board items.
    #[serde(default)]
    pub items: Vec<ProjectItem>,
}

/// One project board item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectItem {
    /// The linked issue or draft.
    #[serde(default)]
    pub content: Option<ItemContent>,
    /// Labels of the linked issue.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Board status column.
    #[serde(default)]
    pub status: Option<String>,
}

/// Content of a board item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemContent {
    /// Issue number; absent for draft items.
    #[serde(default)]
    pub number: Option<u64>,
    /// Issue title.
    #[serde(default)]
    pub title: String,
}

/// One entry of `gh pr list --json number,headRefName,mergeable,body,closingIssuesReferences`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// Pull request number.
    pub number: u64,
    /// Source branch.
    #[serde(default)]
    pub head_ref_name: String,
    /// `MERGEABLE`, `CONFLICTING` or `UNKNOWN`.
    #[serde(default)]
    pub mergeable: String,
    /// Description.
    #[serde(default)]
    pub body: Option<String>,
    /// Issues the pull request closes.
    #[serde(default)]
    pub closing_issues_references: Vec<IssueRef>,
}

/// A referenced issue.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct IssueRef {
    /// Issue number.
    pub number: u64,
}

/// Board items in the ready column that carry the ready label.
#[must_use]
pub fn filter_ready(items: &[ProjectItem], config: &TrackerConfig) -> Vec<WorkItem> {
    items
        .iter()
        .filter_map(|item| {
            let content = item.content.as_ref()?;
            let issue = content.number?;
            let status = item.status.as_deref().unwrap_or_default();
            if status != config.ready_status {
                debug!(issue, status, "Skipping issue, not ready");
                return None;
            }
            if !item.labels.iter().any(|l| *l == config.ready_label) {
                debug!(issue, label = %config.ready_label, "Skipping issue, label missing");
                return None;
            }
            Some(WorkItem::new(issue, content.title.clone()))
        })
        .collect()
}

/// Pull requests with merge conflicts. `UNKNOWN` is left for the next cycle.
#[must_use]
pub fn filter_conflicting(prs: &[PullRequest]) -> Vec<RepairItem> {
    prs.iter()
        .filter(|pr| {
            debug!(pr = pr.number, mergeable = %pr.mergeable, "Pull request mergeability");
            pr.mergeable == "CONFLICTING"
        })
        .map(|pr| RepairItem {
            pr: pr.number,
            issue: resolve_issue(pr),
        })
        .collect()
}

/// The issue a pull request implements: an `issue-<N>` branch, then the
/// first closing reference, then the first `#<N>` in the body.
#[must_use]
pub fn resolve_issue(pr: &PullRequest) -> Option<u64> {
    first_number(&ISSUE_BRANCH, &pr.head_ref_name)
        .or_else(|| pr.closing_issues_references.first().map(|r| r.number))
        .or_else(|| first_number(&BODY_ISSUE_REF, pr.body.as_deref()?))
}

fn first_number(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Reads ready issues and conflicting pull requests from GitHub.
#[derive(Debug, Clone)]
pub struct GhTracker {
    config: TrackerConfig,
    program: String,
    timeout: Duration,
}

impl GhTracker {
    /// A tracker for `config`, bounding each `gh` call by `timeout`.
    #[must_use]
    pub fn new(config: TrackerConfig, timeout: Duration) -> Self {
        Self {
            config,
            program: "gh".to_string(),
            timeout,
        }
    }

    /// Use a different `gh` binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// The tracked board and repository.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn project_args(&self) -> Vec<String> {
        vec![
            "project".to_string(),
            "item-list".to_string(),
            self.config.project_number.to_string(),
            "--owner".to_string(),
            self.config.owner.clone(),
            "--format".to_string(),
            "json".to_string(),
            "--limit".to_string(),
            PROJECT_ITEM_LIMIT.to_string(),
        ]
    }

    fn pr_args(&self) -> Vec<String> {
        let mut args = vec!["pr".to_string(), "list".to_string()];
        if !self.config.repo.is_empty() {
            args.extend(["-R".to_string(), self.config.repo.clone()]);
        }
        args.extend(
            [
                "--label",
                self.config.pr_label.as_str(),
                "--state",
                "open",
                "--json",
                "number,headRefName,mergeable,body,closingIssuesReferences",
            ]
            .map(str::to_string),
        );
        args
    }

    async fn run_json<T: DeserializeOwned>(&self, args: Vec<String>) -> WorkResult<T> {
        let call = BoundedCall::new(&self.program, self.timeout).args(args);
        let stdout = run_checked(&call).await?;
        serde_json::from_str(&stdout).map_err(|e| WorkError::Parse(e.to_string()))
    }
}

#[async_trait]
impl WorkTracker for GhTracker {
    async fn ready_items(&self) -> WorkResult<Vec<WorkItem>> {
        if !self.config.has_project() {
            debug!("No project board configured");
            return Ok(Vec::new());
        }
        let board: ProjectItems = self.run_json(self.project_args()).await?;
        let ready = filter_ready(&board.items, &self.config);
        debug!(items = board.items.len(), ready = ready.len(), "Project board read");
        Ok(ready)
    }

    async fn repair_items(&self) -> WorkResult<Vec<RepairItem>> {
        let prs: Vec<PullRequest> = self.run_json(self.pr_args()).await?;
        Ok(filter_conflicting(&prs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TrackerConfig {
        TrackerConfig {
            owner: "acme".to_string(),
            project_number: 3,
            repo: "acme/widgets".to_string(),
            ..TrackerConfig::default()
        }
    }

    #[test]
    fn ready_needs_status_and_label() {
        let board: ProjectItems = serde_json::from_str(
            r#"{"items": [
                {"content": {"number": 1, "title": "Ready", "type": "Issue"},
                 "labels": ["bug", "handsoff:plan"], "status": "Plan Accepted"},
                {"content": {"number": 2, "title": "No label"},
                 "labels": ["bug"], "status": "Plan Accepted"},
                {"content": {"number": 3, "title": "Wrong column"},
                 "labels": ["handsoff:plan"], "status": "In Progress"},
                {"content": {"title": "Draft"},
                 "labels": ["handsoff:plan"], "status": "Plan Accepted"},
                {"labels": [], "status": null}
            ], "totalCount": 5}"#,
        )
        .unwrap();

        assert_eq!(
            filter_ready(&board.items, &config()),
            vec![WorkItem::new(1, "Ready")]
        );
    }

    #[test]
    fn only_conflicting_prs_need_repair() {
        let prs: Vec<PullRequest> = serde_json::from_str(
            r#"[
                {"number": 10, "headRefName": "issue-4-fix", "mergeable": "CONFLICTING",
                 "body": "", "closingIssuesReferences": []},
                {"number": 11, "headRefName": "issue-5", "mergeable": "UNKNOWN"},
                {"number": 12, "headRefName": "issue-6", "mergeable": "MERGEABLE"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            filter_conflicting(&prs),
            vec![RepairItem {
                pr: 10,
                issue: Some(4)
            }]
        );
    }

    #[test]
    fn issue_resolution_order() {
        let mut pr = PullRequest {
            number: 1,
            head_ref_name: "issue-7-add-cache".to_string(),
            closing_issues_references: vec![IssueRef { number: 8 }],
            body: Some("Fixes #9".to_string()),
            ..PullRequest::default()
        };
        assert_eq!(resolve_issue(&pr), Some(7));

        pr.head_ref_name = "feature/cache".to_string();
        assert_eq!(resolve_issue(&pr), Some(8));

        pr.closing_issues_references.clear();
        assert_eq!(resolve_issue(&pr), Some(9));

        pr.body = Some("no reference".to_string());
        assert_eq!(resolve_issue(&pr), None);
    }

    #[test]
    fn branch_must_start_with_issue_prefix() {
        let pr = PullRequest {
            head_ref_name: "fix-issue-7".to_string(),
            ..PullRequest::default()
        };
        assert_eq!(resolve_issue(&pr), None);
    }

    #[test]
    fn pr_listing_scopes_to_repo_when_known() {
        let tracker = GhTracker::new(config(), Duration::from_secs(5));
        let args = tracker.pr_args();
        assert_eq!(&args[..4], ["pr", "list", "-R", "acme/widgets"]);
        assert!(args.contains(&"handsoff:pr".to_string()));

        let tracker = GhTracker::new(TrackerConfig::default(), Duration::from_secs(5));
        assert_eq!(tracker.pr_args()[2], "--label");
    }

    #[tokio::test]
    async fn unconfigured_board_has_no_ready_items() {
        let tracker = GhTracker::new(TrackerConfig::default(), Duration::from_secs(5))
            .with_program("/nonexistent/gh");
        assert!(tracker.ready_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_program_is_a_command_error() {
        let tracker =
            GhTracker::new(config(), Duration::from_secs(5)).with_program("/nonexistent/gh");
        assert!(matches!(
            tracker.repair_items().await,
            Err(WorkError::Command { .. })
        ));
    }
}
