//! Environment variable overrides.
//!
//! Environment variables sit above every config file and below command-line
//! flags. They are applied to the merged TOML tree before deserialization,
//! so a malformed value (say, a non-numeric timeout) is skipped with a
//! warning instead of failing the whole load.

use std::collections::HashMap;

use tracing::warn;

/// Enables the judge model tier.
pub const AUTO_PERMISSION: &str = "HANDSOFF_AUTO_PERMISSION";
/// Overrides the judge program.
pub const JUDGE_COMMAND: &str = "HANDSOFF_JUDGE_COMMAND";
/// Enables the decision audit trail.
pub const DEBUG: &str = "HANDSOFF_DEBUG";
/// Overrides the poll period.
pub const PERIOD: &str = "HANDSOFF_PERIOD";
/// Overrides the worker slot count.
pub const NUM_WORKERS: &str = "HANDSOFF_NUM_WORKERS";
/// Enables the human approval tier.
pub const USE_TG: &str = "HANDSOFF_USE_TG";
/// Telegram bot token.
pub const TG_API_TOKEN: &str = "TG_API_TOKEN";
/// Telegram chat id.
pub const TG_CHAT_ID: &str = "TG_CHAT_ID";
/// Human approval timeout in seconds.
pub const TG_APPROVAL_TIMEOUT_SEC: &str = "TG_APPROVAL_TIMEOUT_SEC";
/// Long-poll bound in seconds.
pub const TG_POLL_INTERVAL_SEC: &str = "TG_POLL_INTERVAL_SEC";
/// Comma separated responder allow-list.
pub const TG_ALLOWED_USER_IDS: &str = "TG_ALLOWED_USER_IDS";

#[derive(Clone, Copy)]
enum Kind {
    Flag,
    Text,
    Integer,
    IntegerList,
}

const OVERRIDES: &[(&str, &str, &str, Kind)] = &[
    (AUTO_PERMISSION, "judge", "enabled", Kind::Flag),
    (JUDGE_COMMAND, "judge", "command", Kind::Text),
    (USE_TG, "approval", "enabled", Kind::Flag),
    (TG_API_TOKEN, "approval", "token", Kind::Text),
    (TG_CHAT_ID, "approval", "chat_id", Kind::Text),
    (TG_APPROVAL_TIMEOUT_SEC, "approval", "timeout_secs", Kind::Integer),
    (TG_POLL_INTERVAL_SEC, "approval", "poll_interval_secs", Kind::Integer),
    (TG_ALLOWED_USER_IDS, "approval", "allowed_user_ids", Kind::IntegerList),
    (PERIOD, "server", "period", Kind::Text),
    (NUM_WORKERS, "server", "num_workers", Kind::Integer),
    (DEBUG, "audit", "enabled", Kind::Flag),
];

/// Snapshot the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Interpret a boolean flag value: `1`, `true`, `on`, `enable` (any case).
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "enable"
    )
}

/// Apply every recognized variable present in `env` onto `merged`.
///
/// Returns the number of values applied.
pub fn apply_env_overrides(merged: &mut toml::Value, env: &HashMap<String, String>) -> usize {
    let mut applied: usize = 0;

    for &(var, section, key, kind) in OVERRIDES {
        let Some(raw) = env.get(var) else {
            continue;
        };
        let Some(value) = convert(var, raw, kind) else {
            continue;
        };
        if set_field(merged, section, key, value) {
            applied = applied.saturating_add(1);
        }
    }

    applied
}

fn convert(var: &str, raw: &str, kind: Kind) -> Option<toml::Value> {
    match kind {
        Kind::Flag => Some(toml::Value::Boolean(parse_flag(raw))),
        Kind::Text => Some(toml::Value::String(raw.trim().to_owned())),
        Kind::Integer => match raw.trim().parse::<i64>() {
            Ok(n) if n >= 0 => Some(toml::Value::Integer(n)),
            _ => {
                warn!(var, value = raw, "ignoring non-numeric environment override");
                None
            },
        },
        Kind::IntegerList => {
            let mut ids = Vec::new();
            for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match part.parse::<i64>() {
                    Ok(id) => ids.push(toml::Value::Integer(id)),
                    Err(_) => warn!(var, value = part, "ignoring malformed id"),
                }
            }
            Some(toml::Value::Array(ids))
        },
    }
}

fn set_field(merged: &mut toml::Value, section: &str, key: &str, value: toml::Value) -> bool {
    let Some(root) = merged.as_table_mut() else {
        return false;
    };
    let table = root
        .entry(section.to_owned())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    match table.as_table_mut() {
        Some(table) => {
            table.insert(key.to_owned(), value);
            true
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn flags_accept_the_usual_spellings() {
        for on in ["1", "true", "TRUE", "on", "Enable", " on "] {
            assert!(parse_flag(on), "{on:?} should enable");
        }
        for off in ["0", "false", "off", "", "yes"] {
            assert!(!parse_flag(off), "{off:?} should not enable");
        }
    }

    #[test]
    fn overrides_land_in_their_sections() {
        let mut merged: toml::Value = toml::from_str("[judge]\nenabled = false\n").unwrap();
        let applied = apply_env_overrides(
            &mut merged,
            &env(&[
                (AUTO_PERMISSION, "1"),
                (TG_CHAT_ID, " 12345 "),
                (TG_APPROVAL_TIMEOUT_SEC, "90"),
                (TG_ALLOWED_USER_IDS, "1, 2,,3"),
                ("UNRELATED", "x"),
            ]),
        );

        assert_eq!(applied, 4);
        assert_eq!(merged["judge"]["enabled"].as_bool(), Some(true));
        assert_eq!(merged["approval"]["chat_id"].as_str(), Some("12345"));
        assert_eq!(merged["approval"]["timeout_secs"].as_integer(), Some(90));
        let ids: Vec<i64> = merged["approval"]["allowed_user_ids"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(toml::Value::as_integer)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn malformed_numbers_are_skipped() {
        let mut merged: toml::Value = toml::from_str("[approval]\ntimeout_secs = 60\n").unwrap();
        let applied = apply_env_overrides(
            &mut merged,
            &env(&[(TG_APPROVAL_TIMEOUT_SEC, "soon"), (NUM_WORKERS, "-2")]),
        );
        assert_eq!(applied, 0);
        assert_eq!(merged["approval"]["timeout_secs"].as_integer(), Some(60));
    }
}
