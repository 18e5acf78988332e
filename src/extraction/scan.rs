//! Language-agnostic text scanning for call sites and type references.
//!
//! The syntax-tree producer is an external collaborator whose node-kind
//! vocabulary is language-specific; rather than special-case every
//! grammar's "call expression" / "type reference" node kinds, extraction
//! locates them with a deterministic scan over each declaration's raw source
//! text. This is a documented scope decision (see DESIGN.md).

use regex::Regex;
use std::sync::LazyLock;

/// A call expression found in a function body: a dotted-path callee name,
/// its line (relative to the start of the body, 0-based), and whether the
/// call is computed (`obj[expr]()`) rather than a direct name/dotted path,
/// and whether it's awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCallSite {
    pub callee_expr: String,
    pub line_offset: u32,
    pub direct: bool,
    pub awaited: bool,
}

/// A bare identifier referenced as a type, e.g. from a parameter type or
/// return-type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTypeReference {
    pub type_name: String,
}

// Matches `await foo.bar.baz(` / `foo.bar(` / `foo(`, capturing the dotted
// path before the opening paren. Deliberately excludes control-flow
// keywords that can be immediately followed by `(` (if/for/while/switch/catch)
// so they are never mistaken for calls.
static CALL_SITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<await>\bawait\s+)?(?P<path>[A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*)*)\s*\(")
        .expect("static regex is valid")
});

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "function", "return", "typeof", "new", "in", "of",
];

/// Scan a declaration body for call expressions, in source order.
pub fn scan_call_sites(body: &str) -> Vec<RawCallSite> {
    let mut out = Vec::new();
    for caps in CALL_SITE.captures_iter(body) {
        let path = caps.name("path").unwrap().as_str();
        let leaf = path.rsplit('.').next().unwrap_or(path);
        if CONTROL_KEYWORDS.contains(&leaf) {
            continue;
        }
        let start = caps.get(0).unwrap().start();
        let line_offset = body[..start].matches('\n').count() as u32;
        out.push(RawCallSite {
            callee_expr: path.to_string(),
            line_offset,
            direct: true,
            awaited: caps.name("await").is_some(),
        });
    }
    out
}

// Matches bare capitalized identifiers (the common convention for type
// names across the languages this spec targets) inside a signature/
// return-type expression, excluding primitive keywords.
static TYPE_IDENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z0-9_]*\b").expect("static regex is valid")
});

const PRIMITIVE_TYPES: &[&str] = &[
    "String", "Int", "Boolean", "Float", "Double", "Object", "Array", "Promise", "Void", "Self",
];

/// Scan a type expression (signature, return type, declared type) for
/// referenced type names.
pub fn scan_type_references(expr: &str) -> Vec<RawTypeReference> {
    TYPE_IDENT
        .find_iter(expr)
        .map(|m| m.as_str())
        .filter(|name| !PRIMITIVE_TYPES.contains(name))
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .map(|name| RawTypeReference {
            type_name: name.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_direct_call() {
        let sites = scan_call_sites("foo();");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].callee_expr, "foo");
        assert!(!sites[0].awaited);
    }

    #[test]
    fn finds_dotted_call() {
        let sites = scan_call_sites("axios.get(url);");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].callee_expr, "axios.get");
    }

    #[test]
    fn finds_awaited_call() {
        let sites = scan_call_sites("let x = await fetchData();");
        assert_eq!(sites.len(), 1);
        assert!(sites[0].awaited);
        assert_eq!(sites[0].callee_expr, "fetchData");
    }

    #[test]
    fn ignores_control_flow_keywords() {
        let sites = scan_call_sites("if (x) { for (;;) {} }");
        assert!(sites.is_empty());
    }

    #[test]
    fn line_offset_is_relative_to_body_start() {
        let body = "line0();\nline1();\nline2();";
        let sites = scan_call_sites(body);
        assert_eq!(sites.len(), 3);
        assert_eq!(sites[0].line_offset, 0);
        assert_eq!(sites[1].line_offset, 1);
        assert_eq!(sites[2].line_offset, 2);
    }

    #[test]
    fn type_reference_scan_skips_primitives() {
        let refs = scan_type_references("fn foo(x: String, y: UserProfile) -> Promise<Response>");
        let names: Vec<_> = refs.iter().map(|r| r.type_name.as_str()).collect();
        assert!(names.contains(&"UserProfile"));
        assert!(names.contains(&"Response"));
        assert!(!names.contains(&"String"));
        assert!(!names.contains(&"Promise"));
    }

    #[test]
    fn type_reference_scan_dedupes() {
        let refs = scan_type_references("fn foo(a: Widget, b: Widget) -> Widget");
        assert_eq!(refs.len(), 1);
    }
}
