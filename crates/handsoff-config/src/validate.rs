//! Post-merge configuration validation.
//!
//! Hard errors are reserved for values the server cannot run with. An
//! approval tier that is switched on without credentials is downgraded to
//! disabled with a warning, because the permission hook must keep answering
//! even when its configuration is incomplete.

use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, parse_period};

/// Validate (and, where safe, repair) a fully merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &mut Config) -> ConfigResult<()> {
    validate_judge(config)?;
    validate_approval(config)?;
    validate_server(config)?;
    Ok(())
}

fn validate_judge(config: &Config) -> ConfigResult<()> {
    let judge = &config.judge;

    if judge.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "judge.timeout_secs".to_owned(),
            message: "timeout must be at least one second".to_owned(),
        });
    }

    if judge.enabled && judge.command.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "judge.command".to_owned(),
            message: "judge is enabled but no command is configured".to_owned(),
        });
    }

    Ok(())
}

fn validate_approval(config: &mut Config) -> ConfigResult<()> {
    let approval = &mut config.approval;

    if approval.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "approval.timeout_secs".to_owned(),
            message: "timeout must be at least one second".to_owned(),
        });
    }

    if approval.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "approval.poll_interval_secs".to_owned(),
            message: "poll interval must be at least one second".to_owned(),
        });
    }

    if approval.enabled && !approval.has_credentials() {
        warn!("human approval is enabled but token or chat id is missing; disabling it");
        approval.enabled = false;
    }

    Ok(())
}

fn validate_server(config: &Config) -> ConfigResult<()> {
    let server = &config.server;

    if parse_period(&server.period)?.is_zero() {
        return Err(ConfigError::ValidationError {
            field: "server.period".to_owned(),
            message: "period must be greater than zero".to_owned(),
        });
    }

    if server.spawn_timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.spawn_timeout_secs".to_owned(),
            message: "timeout must be at least one second".to_owned(),
        });
    }

    if server.wt_command.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "server.wt_command".to_owned(),
            message: "worktree helper command must not be empty".to_owned(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let mut config = Config::default();
        assert!(validate(&mut config).is_ok());
    }

    #[test]
    fn approval_without_credentials_is_downgraded() {
        let mut config = Config::default();
        config.approval.enabled = true;
        config.approval.token = "token".to_owned();

        validate(&mut config).unwrap();
        assert!(!config.approval.enabled);
    }

    #[test]
    fn approval_with_credentials_stays_enabled() {
        let mut config = Config::default();
        config.approval.enabled = true;
        config.approval.token = "token".to_owned();
        config.approval.chat_id = "42".to_owned();

        validate(&mut config).unwrap();
        assert!(config.approval.enabled);
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut config = Config::default();
        config.server.period = "0s".to_owned();
        let err = validate(&mut config).unwrap_err();
        assert!(err.to_string().contains("server.period"));
    }

    #[test]
    fn unparseable_period_is_rejected() {
        let mut config = Config::default();
        config.server.period = "soon".to_owned();
        assert!(validate(&mut config).is_err());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let mut config = Config::default();
        config.judge.timeout_secs = 0;
        assert!(validate(&mut config).is_err());

        let mut config = Config::default();
        config.approval.poll_interval_secs = 0;
        assert!(validate(&mut config).is_err());
    }
}
