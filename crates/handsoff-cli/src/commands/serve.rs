//! Serve command - run the poll loop until interrupted.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use handsoff_config::Config;
use handsoff_core::{HandsoffHome, SessionStore};
use handsoff_server::{GhTracker, PollLoop, Scheduler, WtSpawner, host_name, shutdown_signal};
use handsoff_telegram::{Notifier, StartupInfo, TelegramBot};
use tracing::info;

/// Flags of `handsoff serve`. Each overrides the environment and files.
#[derive(Debug, Default, Args)]
pub(crate) struct ServeArgs {
    /// Poll period, e.g. 5m or 300s
    #[arg(long)]
    pub(crate) period: Option<String>,

    /// Worker slots; 0 starts every ready item without a pool
    #[arg(long)]
    pub(crate) num_workers: Option<usize>,

    /// Telegram bot token for notifications
    #[arg(long)]
    pub(crate) tg_token: Option<String>,

    /// Telegram chat to notify
    #[arg(long)]
    pub(crate) tg_chat_id: Option<String>,

    /// Log to stderr instead of files under the state directory
    #[arg(long)]
    pub(crate) stderr: bool,
}

impl ServeArgs {
    /// Apply the flags that were given onto `config`.
    pub(crate) fn apply(&self, config: &mut Config) {
        if let Some(period) = &self.period {
            config.server.period.clone_from(period);
        }
        if let Some(num_workers) = self.num_workers {
            config.server.num_workers = num_workers;
        }
        if let Some(token) = &self.tg_token {
            config.approval.token.clone_from(token);
        }
        if let Some(chat_id) = &self.tg_chat_id {
            config.approval.chat_id.clone_from(chat_id);
        }
    }
}

/// How the startup notice names the watched board.
pub(crate) fn project_label(config: &Config) -> String {
    let tracker = &config.tracker;
    if tracker.has_project() {
        format!("{}/projects/{}", tracker.owner, tracker.project_number)
    } else if tracker.repo.is_empty() {
        "(none)".to_string()
    } else {
        tracker.repo.clone()
    }
}

/// Assemble the poll loop from resolved configuration.
///
/// # Errors
///
/// Returns an error if the poll period is invalid.
pub(crate) fn build_loop(
    config: &Config,
    home: &HandsoffHome,
    workspace: Option<&Path>,
) -> anyhow::Result<PollLoop> {
    let period = config.server.period().context("invalid poll period")?;

    let tracker = GhTracker::new(config.tracker.clone(), config.server.spawn_timeout());
    let spawner = match workspace {
        Some(dir) => WtSpawner::from_config(&config.server).with_working_dir(dir),
        None => WtSpawner::from_config(&config.server),
    };

    let mut poll = PollLoop::new(
        Arc::new(tracker),
        Arc::new(spawner),
        SessionStore::new(home.session_dir()),
        period,
    )
    .with_issue_links(config.tracker.clone());

    let workers = config.server.num_workers;
    if workers > 0 {
        poll = poll.with_scheduler(Scheduler::new(home.workers_dir(), workers));
    } else {
        info!("Worker pool disabled, ready items start without a slot");
    }

    let approval = &config.approval;
    if approval.has_credentials() {
        let bot = TelegramBot::new(approval.token.clone());
        poll = poll.with_notifier(Notifier::new(Arc::new(bot), approval.chat_id.clone()));
    } else {
        info!("Telegram not configured, notifications disabled");
    }

    Ok(poll)
}

/// Run the server until SIGINT or SIGTERM.
pub(crate) async fn run_serve(
    config: &Config,
    home: &HandsoffHome,
    workspace: Option<&Path>,
) -> anyhow::Result<()> {
    let poll = build_loop(config, home, workspace)?;
    poll.prepare()
        .await
        .context("failed to prepare the worker pool")?;
    let shutdown = shutdown_signal().context("failed to install signal handlers")?;

    let startup = StartupInfo {
        host: host_name(),
        project: project_label(config),
        period_secs: poll.period().as_secs(),
        workers: config.server.num_workers,
        working_dir: workspace.map_or_else(|| ".".to_string(), |p| p.display().to_string()),
    };
    poll.announce(&startup).await;

    poll.run_until(shutdown).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use handsoff_config::ServerConfig;
    use std::time::Duration;

    #[test]
    fn flags_override_loaded_values() {
        let mut config = Config::default();
        let args = ServeArgs {
            period: Some("30s".to_string()),
            num_workers: Some(0),
            tg_chat_id: Some("-100".to_string()),
            ..ServeArgs::default()
        };
        args.apply(&mut config);

        assert_eq!(config.server.period, "30s");
        assert_eq!(config.server.num_workers, 0);
        assert_eq!(config.approval.chat_id, "-100");
        assert!(config.approval.token.is_empty());
    }

    #[test]
    fn absent_flags_leave_config_alone() {
        let mut config = Config::default();
        ServeArgs::default().apply(&mut config);
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.approval.chat_id, "");
    }

    #[test]
    fn loop_honors_pool_size_and_period() {
        let tmp = tempfile::tempdir().unwrap();
        let home = HandsoffHome::from_path(tmp.path());

        let mut config = Config::default();
        config.server.period = "2m".to_string();
        config.server.num_workers = 3;
        let poll = build_loop(&config, &home, None).unwrap();
        assert_eq!(poll.period(), Duration::from_secs(120));
        assert_eq!(poll.scheduler().map(Scheduler::num_slots), Some(3));

        config.server.num_workers = 0;
        let poll = build_loop(&config, &home, None).unwrap();
        assert!(poll.scheduler().is_none());
    }

    #[test]
    fn bad_period_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.server.period = "5".to_string();
        assert!(build_loop(&config, &HandsoffHome::from_path(tmp.path()), None).is_err());
    }

    #[test]
    fn project_label_prefers_board() {
        let mut config = Config::default();
        assert_eq!(project_label(&config), "(none)");

        config.tracker.repo = "acme/widgets".to_string();
        assert_eq!(project_label(&config), "acme/widgets");

        config.tracker.owner = "acme".to_string();
        config.tracker.project_number = 4;
        assert_eq!(project_label(&config), "acme/projects/4");
    }
}
