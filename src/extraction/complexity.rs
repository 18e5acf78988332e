//! Cyclomatic complexity: count decision points in a function body and add
//! one for the entry path.
//!
//! The body text is whatever the parser handed back as `raw_body` — we don't
//! need a real AST walk for this: decision points are lexical keywords and
//! operators that are vanishingly unlikely to appear inside a string or
//! comment in a way that would change the count by more than one or two in
//! pathological cases, which is an acceptable trade for staying
//! language-agnostic.

use regex::Regex;
use std::sync::LazyLock;

static DECISION_POINTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(if|else if|elif|for|foreach|while|case|catch|except|and|or)\b|(\?\?)|(&&)|(\|\|)|(\?\s*[^:]+:)",
    )
    .expect("static regex is valid")
});

/// Count decision points (branches, loops, logical short-circuits, catch
/// clauses) in `body` and return `decision_points + 1`.
pub fn cyclomatic_complexity(body: &str) -> u32 {
    let count = DECISION_POINTS.find_iter(body).count() as u32;
    count + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_function_has_complexity_one() {
        let body = "{ let x = 1; return x; }";
        assert_eq!(cyclomatic_complexity(body), 1);
    }

    #[test]
    fn single_if_has_complexity_two() {
        let body = "{ if (x > 0) { return x; } return 0; }";
        assert_eq!(cyclomatic_complexity(body), 2);
    }

    #[test]
    fn branches_loops_and_short_circuits_each_count() {
        let body = "{ if (a && b) { for (i = 0; i < 10; i++) { while (x) {} } } else if (c) {} }";
        // if, &&, for, while, else if => 5 decision points + 1
        assert_eq!(cyclomatic_complexity(body), 6);
    }

    #[test]
    fn catch_clause_counts() {
        let body = "try { risky(); } catch (e) { handle(e); }";
        assert_eq!(cyclomatic_complexity(body), 2);
    }
}
