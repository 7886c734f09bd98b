//! End-to-end layering tests against real files on disk.

use std::collections::HashMap;
use std::path::Path;

use handsoff_config::loader::{LOCAL_FILE, PROJECT_FILE, load_rules_with, load_with};
use handsoff_config::{ConfigError, ConfigLayer, RuleSpec};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

#[test]
fn no_files_yields_defaults() {
    let ws = TempDir::new().unwrap();
    let loaded = load_with(Some(ws.path()), None, &HashMap::new()).unwrap();

    assert!(loaded.loaded_files.is_empty());
    assert!(loaded.rules.is_empty());
    assert_eq!(loaded.config.server.num_workers, 5);
    assert!(!loaded.config.judge.enabled);
}

#[test]
fn local_overrides_project_overrides_user() {
    let user = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    write(user.path(), "config.toml", "[server]\nnum_workers = 9\nperiod = \"1m\"\n");
    write(ws.path(), PROJECT_FILE, "[server]\nnum_workers = 3\n");
    write(ws.path(), LOCAL_FILE, "[server]\nnum_workers = 1\n");

    let loaded = load_with(Some(ws.path()), Some(user.path()), &HashMap::new()).unwrap();

    assert_eq!(loaded.config.server.num_workers, 1);
    assert_eq!(loaded.config.server.period, "1m");
    assert_eq!(loaded.loaded_files.len(), 3);
}

#[test]
fn environment_beats_files() {
    let ws = TempDir::new().unwrap();
    write(ws.path(), PROJECT_FILE, "[judge]\nenabled = false\n[server]\nperiod = \"10m\"\n");

    let loaded = load_with(
        Some(ws.path()),
        None,
        &env(&[
            ("HANDSOFF_AUTO_PERMISSION", "on"),
            ("HANDSOFF_PERIOD", "30s"),
            ("HANDSOFF_NUM_WORKERS", "0"),
        ]),
    )
    .unwrap();

    assert!(loaded.config.judge.enabled);
    assert_eq!(loaded.config.server.period, "30s");
    assert_eq!(loaded.config.server.num_workers, 0);
}

#[test]
fn permission_tables_are_kept_per_layer() {
    let ws = TempDir::new().unwrap();
    write(
        ws.path(),
        PROJECT_FILE,
        r#"
        [permissions]
        allow = ["^npm test"]
        deny = [{ tool = "Read", pattern = "\\.secret$" }]
        "#,
    );
    write(
        ws.path(),
        LOCAL_FILE,
        r#"
        [permissions]
        allow = ["^cargo build"]
        "#,
    );

    let loaded = load_with(Some(ws.path()), None, &HashMap::new()).unwrap();

    assert_eq!(loaded.rules.len(), 2);
    assert_eq!(loaded.rules[0].layer, ConfigLayer::Project);
    assert_eq!(loaded.rules[1].layer, ConfigLayer::Local);
    assert_eq!(
        loaded.rules[0].permissions.allow,
        vec![RuleSpec::Pattern("^npm test".to_owned())]
    );
    assert_eq!(loaded.rules[0].permissions.deny[0].tool(), "Read");
    assert_eq!(loaded.rules[1].permissions.allow[0].pattern(), "^cargo build");
}

#[test]
fn project_file_is_found_from_a_subdirectory() {
    let ws = TempDir::new().unwrap();
    write(ws.path(), PROJECT_FILE, "[tracker]\nrepo = \"acme/widgets\"\n");
    let nested = ws.path().join("src/deep");
    std::fs::create_dir_all(&nested).unwrap();

    let loaded = load_with(Some(&nested), None, &HashMap::new()).unwrap();
    assert_eq!(loaded.config.tracker.repo, "acme/widgets");
}

#[test]
fn malformed_file_is_a_parse_error() {
    let ws = TempDir::new().unwrap();
    write(ws.path(), PROJECT_FILE, "[server\nnum_workers = ");

    let result = load_with(Some(ws.path()), None, &HashMap::new());
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

#[test]
fn approval_env_without_chat_is_downgraded() {
    let ws = TempDir::new().unwrap();
    let loaded = load_with(
        Some(ws.path()),
        None,
        &env(&[("HANDSOFF_USE_TG", "1"), ("TG_API_TOKEN", "123:abc")]),
    )
    .unwrap();

    assert!(!loaded.config.approval.enabled);
    assert_eq!(loaded.config.approval.token, "123:abc");
}

#[test]
fn rules_load_despite_invalid_server_section() {
    let ws = TempDir::new().unwrap();
    write(
        ws.path(),
        PROJECT_FILE,
        "[permissions]\ndeny = [\"^git push\"]\n[server]\nperiod = \"5h\"\n",
    );

    assert!(matches!(
        load_with(Some(ws.path()), None, &HashMap::new()),
        Err(ConfigError::ValidationError { .. })
    ));

    let rules = load_rules_with(Some(ws.path()), None).unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].layer, ConfigLayer::Project);
    assert_eq!(rules[0].permissions.deny[0].pattern(), "^git push");
}

#[test]
fn rule_loading_still_rejects_broken_toml() {
    let ws = TempDir::new().unwrap();
    write(ws.path(), LOCAL_FILE, "[permissions\ndeny = ");

    assert!(matches!(
        load_rules_with(Some(ws.path()), None),
        Err(ConfigError::ParseError { .. })
    ));
}
