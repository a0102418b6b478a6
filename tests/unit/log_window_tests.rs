//! Unit tests for log windowing and grep rendering.

use regex::RegexBuilder;

use rwx_bridge::mcp::tools::grep_logs::build_grep_output;
use rwx_bridge::mcp::tools::head_logs::head_window;
use rwx_bridge::mcp::tools::tail_logs::tail_window;

fn lines(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("line {i}")).collect()
}

fn as_refs(owned: &[String]) -> Vec<&str> {
    owned.iter().map(String::as_str).collect()
}

// ── head ─────────────────────────────────────────────────────────────────────

#[test]
fn head_returns_the_first_page() {
    let owned = lines(10);
    let (window, has_more) = head_window(&as_refs(&owned), 3, 0);
    assert_eq!(window, vec!["line 1", "line 2", "line 3"]);
    assert!(has_more);
}

#[test]
fn head_offset_pages_forward() {
    let owned = lines(5);
    let (window, has_more) = head_window(&as_refs(&owned), 3, 3);
    assert_eq!(window, vec!["line 4", "line 5"]);
    assert!(!has_more);
}

#[test]
fn head_offset_past_the_end_is_empty() {
    let owned = lines(2);
    let (window, has_more) = head_window(&as_refs(&owned), 3, 10);
    assert!(window.is_empty());
    assert!(!has_more);
}

// ── tail ─────────────────────────────────────────────────────────────────────

#[test]
fn tail_returns_the_last_page() {
    let owned = lines(10);
    let (window, has_more) = tail_window(&as_refs(&owned), 3, 0);
    assert_eq!(window, vec!["line 8", "line 9", "line 10"]);
    assert!(has_more);
}

#[test]
fn tail_offset_pages_backwards() {
    let owned = lines(10);
    let (window, has_more) = tail_window(&as_refs(&owned), 3, 3);
    assert_eq!(window, vec!["line 5", "line 6", "line 7"]);
    assert!(has_more);
}

#[test]
fn tail_clamps_at_the_beginning() {
    let owned = lines(4);
    let (window, has_more) = tail_window(&as_refs(&owned), 10, 0);
    assert_eq!(window.len(), 4);
    assert!(!has_more);
}

#[test]
fn tail_offset_beyond_start_is_empty() {
    let owned = lines(3);
    let (window, has_more) = tail_window(&as_refs(&owned), 2, 5);
    assert!(window.is_empty());
    assert!(!has_more);
}

// ── grep ─────────────────────────────────────────────────────────────────────

fn pattern(raw: &str) -> regex::Regex {
    RegexBuilder::new(raw)
        .case_insensitive(true)
        .build()
        .expect("valid pattern")
}

#[test]
fn matches_are_marked_and_context_surrounds_them() {
    let owned: Vec<String> = vec!["a", "b", "ERROR here", "d", "e"]
        .into_iter()
        .map(str::to_owned)
        .collect();
    let output = build_grep_output(&as_refs(&owned), &pattern("error"), 1);

    assert_eq!(output.matches_found, 1);
    assert_eq!(
        output.lines,
        vec!["    2: b", ">>> 3: ERROR here", "    4: d"]
    );
}

#[test]
fn matching_is_case_insensitive() {
    let owned: Vec<String> = vec!["Error: boom".to_owned()];
    let output = build_grep_output(&as_refs(&owned), &pattern("error"), 0);
    assert_eq!(output.matches_found, 1);
}

#[test]
fn overlapping_context_windows_do_not_duplicate_lines() {
    let owned: Vec<String> = vec!["fail one", "between", "fail two"]
        .into_iter()
        .map(str::to_owned)
        .collect();
    let output = build_grep_output(&as_refs(&owned), &pattern("fail"), 2);

    // All three lines appear once; the separator splits the match groups
    // even though their context overlaps entirely.
    let content_lines: Vec<&String> = output
        .lines
        .iter()
        .filter(|line| line.as_str() != "---")
        .collect();
    assert_eq!(content_lines.len(), 3);
    assert_eq!(output.matches_found, 2);
}

#[test]
fn groups_are_separated_but_not_after_the_last() {
    let owned: Vec<String> = vec!["error a", "x", "x", "x", "x", "error b"]
        .into_iter()
        .map(str::to_owned)
        .collect();
    let output = build_grep_output(&as_refs(&owned), &pattern("error"), 0);

    assert_eq!(
        output.lines,
        vec![">>> 1: error a", "---", ">>> 6: error b"]
    );
}

#[test]
fn no_matches_yields_empty_output() {
    let owned = lines(5);
    let output = build_grep_output(&as_refs(&owned), &pattern("nomatch"), 3);
    assert_eq!(output.matches_found, 0);
    assert!(output.lines.is_empty());
}
