//! Hook command - decide one `PreToolUse` request.
//!
//! Reads the request from stdin and writes exactly one decision object to
//! stdout. Nothing here fails the process; every fault still ends in a
//! decision.

use std::collections::HashMap;
use std::path::Path;

use handsoff_config::env::collect_env_vars;
use handsoff_config::{Config, loader};
use handsoff_core::HandsoffHome;
use handsoff_permission::{PermissionGate, RuleCache, handle_hook};
use tokio::io::AsyncReadExt;
use tracing::warn;

/// Settings for the hook, or defaults when they cannot be loaded.
///
/// Defaults leave the judge and the human tier off. Rules are loaded on
/// their own by [`build_gate`].
fn load_settings(
    workspace: Option<&Path>,
    user_dir: Option<&Path>,
    env: &HashMap<String, String>,
) -> Config {
    match loader::load_with(workspace, user_dir, env) {
        Ok(loaded) => loaded.config,
        Err(e) => {
            warn!(error = %e, "Could not load configuration, using default settings");
            Config::default()
        },
    }
}

/// Assemble the gate for `workspace`.
///
/// A settings error does not drop the configured rules. Rules that cannot
/// be read at all leave a restricted table with no automatic `allow`.
pub(crate) fn build_gate(
    workspace: Option<&Path>,
    user_dir: Option<&Path>,
    env: &HashMap<String, String>,
    home: &HandsoffHome,
) -> PermissionGate {
    let config = load_settings(workspace, user_dir, env);
    let rules = RuleCache::with_table(RuleCache::load_table(workspace, user_dir));
    PermissionGate::from_config(&config, rules, &home.session_dir())
}

/// Run the hook against stdin and stdout.
pub(crate) async fn run_hook(workspace: Option<&Path>) -> anyhow::Result<()> {
    let mut raw = String::new();
    if let Err(e) = tokio::io::stdin().read_to_string(&mut raw).await {
        warn!(error = %e, "Failed to read hook request");
    }

    let home = HandsoffHome::resolve().unwrap_or_else(|e| {
        warn!(error = %e, "Could not resolve state directory, using current directory");
        HandsoffHome::from_path(".")
    });
    let user_dir = loader::user_dir();
    let gate = build_gate(workspace, user_dir.as_deref(), &collect_env_vars(), &home);

    println!("{}", handle_hook(&gate, &raw).await.to_json());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use handsoff_core::Tier;
    use handsoff_test::bash_request;
    use tempfile::TempDir;

    struct Dirs {
        workspace: TempDir,
        user: TempDir,
        state: TempDir,
    }

    impl Dirs {
        fn new() -> Self {
            Self {
                workspace: tempfile::tempdir().unwrap(),
                user: tempfile::tempdir().unwrap(),
                state: tempfile::tempdir().unwrap(),
            }
        }

        fn project_file(&self, contents: &str) {
            std::fs::write(self.workspace.path().join(".handsoff.toml"), contents).unwrap();
        }

        fn gate(&self) -> PermissionGate {
            build_gate(
                Some(self.workspace.path()),
                Some(self.user.path()),
                &HashMap::new(),
                &HandsoffHome::from_path(self.state.path()),
            )
        }
    }

    async fn decide(gate: &PermissionGate, command: &str) -> Tier {
        handle_hook(gate, &bash_request(command).to_string())
            .await
            .tier()
    }

    #[tokio::test]
    async fn default_gate_applies_builtin_rules() {
        let gate = Dirs::new().gate();
        assert_eq!(decide(&gate, "cd /tmp").await, Tier::Deny);
        assert_eq!(decide(&gate, "git status").await, Tier::Allow);
    }

    #[tokio::test]
    async fn garbage_input_asks() {
        let gate = Dirs::new().gate();
        let output = handle_hook(&gate, "not json").await;
        assert_eq!(output.tier(), Tier::Ask);
        assert!(output.to_json().contains(r#""permissionDecision":"ask""#));
    }

    #[tokio::test]
    async fn project_deny_survives_invalid_server_settings() {
        let dirs = Dirs::new();
        dirs.project_file(
            "[permissions]\ndeny = [\"^git push\"]\n\n[server]\nperiod = \"5h\"\n",
        );
        let gate = dirs.gate();

        assert_eq!(decide(&gate, "git push origin main").await, Tier::Deny);
        assert_eq!(decide(&gate, "git status").await, Tier::Allow);
    }

    #[tokio::test]
    async fn unreadable_rules_never_allow() {
        let dirs = Dirs::new();
        dirs.project_file("[permissions]\ndeny = \"^git push\"\n");
        let gate = dirs.gate();

        assert_eq!(decide(&gate, "git status").await, Tier::Ask);
        assert_eq!(decide(&gate, "git push origin main").await, Tier::Ask);
        assert_eq!(decide(&gate, "cd /tmp").await, Tier::Deny);
    }
}
