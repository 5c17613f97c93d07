//! Branch-and-worktree predicate deciding whether a step runs.
//!
//! Patterns are glob-like and anchored to the full string: `*` matches any run
//! of characters, `?` matches exactly one character, everything else is
//! literal. A leading `!` negates a pattern; a leading `worktree:` prefix
//! scopes a pattern to when the step is running inside a linked worktree.

use regex::Regex;

/// Decide whether a step should run given its branch filter patterns.
///
/// Rules, applied in order:
/// 1. No patterns (or empty) -> run.
/// 2. Any negation (`!pat`) matches -> skip.
/// 3. No positive patterns -> run.
/// 4. Otherwise run iff any positive pattern matches.
pub fn should_run(patterns: &[String], current_branch: &str, in_worktree: bool) -> bool {
    if patterns.is_empty() {
        return true;
    }

    let (negations, positives): (Vec<&String>, Vec<&String>) =
        patterns.iter().partition(|p| p.starts_with('!'));

    for neg in &negations {
        let inner = &neg[1..];
        if match_pattern(inner, current_branch, in_worktree) {
            return false;
        }
    }

    if positives.is_empty() {
        return true;
    }

    positives
        .iter()
        .any(|p| match_pattern(p, current_branch, in_worktree))
}

/// Match a single pattern (without a leading `!`) against the current
/// branch/worktree context.
fn match_pattern(pattern: &str, current_branch: &str, in_worktree: bool) -> bool {
    if let Some(rest) = pattern.strip_prefix("worktree:") {
        if !in_worktree {
            return false;
        }
        return match_glob(current_branch, rest);
    }
    match_glob(current_branch, pattern)
}

/// Anchored glob match: `*` -> any run of characters, `?` -> exactly one
/// character, every other character literal (escape-free; `.` is literal).
pub fn match_glob(value: &str, pattern: &str) -> bool {
    let mut regex_str = String::with_capacity(pattern.len() * 2 + 2);
    regex_str.push('^');
    for c in pattern.chars() {
        match c {
            '*' => regex_str.push_str(".*"),
            '?' => regex_str.push('.'),
            other => regex_str.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex_str.push('$');

    // The translated pattern is always a valid regex by construction.
    let re = Regex::new(&regex_str).expect("glob-to-regex translation is always valid");
    re.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_basics() {
        assert!(match_glob("feature-123", "feature-*"));
        assert!(!match_glob("v12", "v?"));
        assert!(match_glob("release-v1.0", "release-v?.?"));
    }

    #[test]
    fn glob_dot_is_literal() {
        assert!(!match_glob("releaseXv1X0", "release.v1.0"));
        assert!(match_glob("release.v1.0", "release.v1.0"));
    }

    #[test]
    fn empty_patterns_always_run() {
        assert!(should_run(&[], "anything", false));
    }

    #[test]
    fn branch_filter_mix() {
        let patterns = vec!["feature-*".to_string(), "!main".to_string()];
        assert!(should_run(&patterns, "feature-123", false));
        assert!(!should_run(&patterns, "main", false));
        assert!(!should_run(&patterns, "develop", false));
    }

    #[test]
    fn negation_alone_means_run_unless_matched() {
        let patterns = vec!["!main".to_string()];
        assert!(should_run(&patterns, "develop", false));
        assert!(!should_run(&patterns, "main", false));
    }

    #[test]
    fn worktree_prefix_requires_in_worktree() {
        let patterns = vec!["worktree:feature-*".to_string()];
        assert!(!should_run(&patterns, "feature-123", false));
        assert!(should_run(&patterns, "feature-123", true));
    }

    #[test]
    fn worktree_prefix_any_branch() {
        let patterns = vec!["worktree:*".to_string()];
        assert!(should_run(&patterns, "whatever", true));
        assert!(!should_run(&patterns, "whatever", false));
    }

    #[test]
    fn idempotent_and_order_independent_within_group() {
        let p1 = vec!["a*".to_string(), "!b*".to_string(), "!c*".to_string()];
        let p2 = vec!["!c*".to_string(), "a*".to_string(), "!b*".to_string()];
        for branch in ["a1", "b1", "c1", "d1"] {
            assert_eq!(
                should_run(&p1, branch, false),
                should_run(&p2, branch, false)
            );
            // idempotent
            let first = should_run(&p1, branch, false);
            assert_eq!(first, should_run(&p1, branch, false));
        }
    }
}
