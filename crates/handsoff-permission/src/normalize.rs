//! Shell command normalization for rule matching.

use std::sync::LazyLock;

use regex::Regex;

static ENV_ASSIGNMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+=\S+\s+)+").expect("invalid regex"));

static SAFETY_PREFIXES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(set\s+-[exo]\s+[a-z]*\s*&&\s*)+").expect("invalid regex")
});

/// Strip leading `NAME=value` assignments and `set -e && ` style prefixes.
///
/// The two kinds of prefix may interleave (`set -e && FOO=1 make`), so both
/// are stripped until neither matches. The result is only used for
/// matching; callers keep the raw command for logs and escalation.
#[must_use]
pub fn normalize_command(command: &str) -> String {
    let mut current = command;
    loop {
        let stripped = strip_prefix(&ENV_ASSIGNMENTS, current);
        let stripped = strip_prefix(&SAFETY_PREFIXES, stripped);
        if stripped.len() == current.len() {
            return current.to_string();
        }
        current = stripped;
    }
}

fn strip_prefix<'a>(pattern: &Regex, text: &'a str) -> &'a str {
    match pattern.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_assignments_are_stripped() {
        assert_eq!(normalize_command("FOO=1 git status"), "git status");
        assert_eq!(normalize_command("A=1 B=two  cargo test"), "cargo test");
    }

    #[test]
    fn safety_prefixes_are_stripped() {
        assert_eq!(normalize_command("set -e && ls"), "ls");
        assert_eq!(normalize_command("set -x && set -o pipefail && make test"), "make test");
        assert_eq!(normalize_command("SET -E && ls"), "ls");
    }

    #[test]
    fn interleaved_prefixes_are_all_stripped() {
        assert_eq!(normalize_command("set -e && RUST_LOG=debug cargo run"), "cargo run");
        assert_eq!(normalize_command("CI=1 set -x && rm -rf build"), "rm -rf build");
    }

    #[test]
    fn commands_without_prefixes_are_unchanged() {
        for command in ["git status", "echo a=b", "ls -la", "", "FOO=1"] {
            assert_eq!(normalize_command(command), command);
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        for command in [
            "FOO=1 git status",
            "set -e && BAR=2 set -x && make",
            "X=1 Y=2 set -o pipefail && cd /tmp",
            "plain command",
        ] {
            let once = normalize_command(command);
            assert_eq!(normalize_command(&once), once, "input: {command}");
        }
    }
}
