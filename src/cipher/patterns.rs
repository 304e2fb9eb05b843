//! Structural patterns for artifacts inside obfuscated player scripts
//!
//! The platform reshuffles its player script frequently, so every artifact is
//! described by one or more declarative shapes tried in a fixed priority
//! order. Shapes that need backreferences (a function body referring back to
//! its own parameter name) use `fancy_regex`; the rest use plain `regex`.

use fancy_regex::Regex as FancyRegex;
use once_cell::sync::Lazy;
use regex::Regex;

/// A JavaScript identifier.
const VARIABLE_PART: &str = "[a-zA-Z_$][a-zA-Z_0-9$]*";

/// An identifier as an object-literal key, optionally quoted.
const VARIABLE_PART_KEY: &str = "[\"']?[a-zA-Z_$][a-zA-Z_0-9$]*[\"']?";

/// `signatureTimestamp:19834` or `sts:19834`, the numeric token in group 2.
static TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(signatureTimestamp|sts):(\d+)").expect("timestamp pattern"));

/// A declaration splitting a string literal on the empty separator, with an
/// optional strict-mode prologue kept outside the captured code.
static GLOBAL_VARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:'use\s+strict';)?(?P<code>(?:var|let|const)\s*(?P<varname>[A-Za-z0-9_$]+)\s*=\s*(?:'[^']+'|"[^"]+")\.split\((?:""|'')\))"#,
    )
    .expect("global vars pattern")
});

/// An object literal with at least three `key: function(...) {...}` members:
/// the helper primitives the decipher function delegates to.
static ACTIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?s)(?:var|let|const)\s+([$A-Za-z0-9_]+)\s*=\s*\{{(?:\s*{key}\s*:\s*function\s*\([^)]*\)\s*\{{.*?\}}\s*,){{2,}}\s*{key}\s*:\s*function\s*\([^)]*\)\s*\{{.*?\}}\s*\}};?",
        key = VARIABLE_PART_KEY
    ))
    .expect("actions pattern")
});

/// Recognized shapes of the signature decipher function, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigShape {
    /// `function(a){ return X(a); }`, one-line delegation to another function.
    Delegating,
    /// `function(a){ a=a.split(""); ... return a.join(""); }`
    SplitJoin,
    /// `function(a){ ... return a; }`, structurally valid but usually identity.
    BareReturn,
}

pub struct SigShapePattern {
    pub shape: SigShape,
    regex: FancyRegex,
}

impl SigShapePattern {
    /// All matches of this shape, in text order.
    pub fn candidates<'a>(&self, script: &'a str) -> Vec<&'a str> {
        self.regex
            .find_iter(script)
            .filter_map(Result::ok)
            .map(|m| m.as_str())
            .collect()
    }
}

/// Ordered sig-function shape descriptors. Earlier shapes win ties.
pub static SIG_FUNCTION_SHAPES: Lazy<Vec<SigShapePattern>> = Lazy::new(|| {
    vec![
        SigShapePattern {
            shape: SigShape::Delegating,
            regex: FancyRegex::new(&format!(
                r"(?s)function(?:\s+{vp})?\s*\(\s*{vp}(?:\s*,[^)]*)?\)\s*\{{\s*return\s*{vp}\([^)]*\);?\s*\}}",
                vp = VARIABLE_PART
            ))
            .expect("delegating sig pattern"),
        },
        SigShapePattern {
            shape: SigShape::SplitJoin,
            regex: FancyRegex::new(&format!(
                r#"(?s)function(?:\s+{vp})?\s*\(\s*({vp})(?:\s*,[^)]*)?\)\s*\{{[^{{}}]*?\1=\1\.split\(""\);.*?return\s+\1\.join\(""\)\s*;?\}}"#,
                vp = VARIABLE_PART
            ))
            .expect("split/join sig pattern"),
        },
        SigShapePattern {
            shape: SigShape::BareReturn,
            regex: FancyRegex::new(&format!(
                r"(?s)function(?:\s+{vp})?\s*\(\s*({vp})(?:\s*,[^)]*)?\)\s*\{{[^{{}}]*?return\s+\1\s*;?\}}",
                vp = VARIABLE_PART
            ))
            .expect("bare return sig pattern"),
        },
    ]
});

/// Which n-function shape matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NShape {
    /// Array-indexed call, try/catch returning `... + param`, array-indexed return.
    Strict,
    /// Only requires a try/catch whose catch returns an expression referencing
    /// the caught value or the parameter.
    Relaxed,
}

static N_FUNCTION_STRICT: Lazy<FancyRegex> = Lazy::new(|| {
    FancyRegex::new(&format!(
        r"(?s)function(?:\s+{vp})?\(\s*({vp})\s*\)\s*\{{(?:var|let|const)\s*({vp})=\1\[{vp}\[\d+\]\]\({vp}\[\d+\]\).*?catch\(\s*(\w+)\s*\)\s*\{{\s*return.*?\+\s*\1\s*\}}\s*return\s*\2\[{vp}\[\d+\]\]\({vp}\[\d+\]\)\}};",
        vp = VARIABLE_PART
    ))
    .expect("strict n pattern")
});

static N_FUNCTION_RELAXED: Lazy<FancyRegex> = Lazy::new(|| {
    FancyRegex::new(&format!(
        r"(?s)function(?:\s+{vp})?\(\s*({vp})\s*\)\s*\{{.*?try\s*\{{.*?\}}\s*catch\(\s*({vp})\s*\)\s*\{{\s*return[^}}]*?\+\s*(?:\1|\2)[^}}]*?\}}.*?return[^}}]*?\}};",
        vp = VARIABLE_PART
    ))
    .expect("relaxed n pattern")
});

/// Property-form n function header, `N: function(args) {`, used by the
/// permissive fallback extractor. Case-insensitive.
pub static N_PROPERTY_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bN\s*:\s*function\s*\(([^)]*)\)\s*\{").expect("n property header"));

/// First numeric timestamp token, if present.
pub fn find_timestamp(script: &str) -> Option<&str> {
    TIMESTAMP
        .captures(script)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
}

/// Global-variables declaration code, without any strict-mode prologue.
pub fn find_global_vars(script: &str) -> Option<&str> {
    GLOBAL_VARS
        .captures(script)
        .and_then(|c| c.name("code"))
        .map(|m| m.as_str())
}

/// The helper-actions object declaration, whole source text.
pub fn find_actions(script: &str) -> Option<&str> {
    ACTIONS.find(script).map(|m| m.as_str())
}

/// The n function source, strict shape first, relaxed fallback second.
pub fn find_n_function(script: &str) -> Option<(NShape, &str)> {
    if let Some(m) = N_FUNCTION_STRICT.find(script).ok().flatten() {
        return Some((NShape::Strict, m.as_str()));
    }
    N_FUNCTION_RELAXED
        .find(script)
        .ok()
        .flatten()
        .map(|m| (NShape::Relaxed, m.as_str()))
}

/// First declared parameter name of a function source, if any.
pub fn first_parameter_name(fn_source: &str) -> Option<&str> {
    let open = fn_source.find('(')?;
    let close = fn_source[open + 1..].find(')')? + open + 1;
    let inside = fn_source[open + 1..close].trim();
    if inside.is_empty() {
        return None;
    }
    let first = inside.split(',').next()?.trim();
    if first.is_empty() { None } else { Some(first) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_both_tags() {
        assert_eq!(find_timestamp("var a=1;signatureTimestamp:19834,"), Some("19834"));
        assert_eq!(find_timestamp("xx sts:20001 yy"), Some("20001"));
        assert_eq!(find_timestamp("no numbers here"), None);
    }

    #[test]
    fn test_global_vars_with_prologue() {
        let script = r#"'use strict';var gP="abc-def".split("");other"#;
        assert_eq!(find_global_vars(script), Some(r#"var gP="abc-def".split("")"#));
    }

    #[test]
    fn test_global_vars_let_and_single_quotes() {
        let script = "let kQ='xyz'.split('');";
        assert_eq!(find_global_vars(script), Some("let kQ='xyz'.split('')"));
    }

    #[test]
    fn test_actions_requires_three_members() {
        let three = r#"var XY={a:function(b){b.reverse()},c:function(b,d){b.splice(0,d)},e:function(b,d){var f=b[0];b[0]=b[d%b.length];b[d%b.length]=f}};"#;
        assert!(find_actions(three).is_some());

        let two = r#"var XY={a:function(b){b.reverse()},c:function(b,d){b.splice(0,d)}};"#;
        assert!(find_actions(two).is_none());
    }

    #[test]
    fn test_actions_quoted_keys() {
        let script = r#"let q={"a":function(b){b.reverse()},'c':function(b,d){b.splice(0,d)},e:function(b){b.pop()}};"#;
        assert!(find_actions(script).is_some());
    }

    #[test]
    fn test_sig_shape_priority_order() {
        let shapes = &*SIG_FUNCTION_SHAPES;
        assert_eq!(shapes[0].shape, SigShape::Delegating);
        assert_eq!(shapes[1].shape, SigShape::SplitJoin);
        assert_eq!(shapes[2].shape, SigShape::BareReturn);
    }

    #[test]
    fn test_sig_split_join_shape() {
        let script = r#"function sig(p){p=p.split("");Xq.a(p,2);return p.join("")}"#;
        let found = SIG_FUNCTION_SHAPES[1].candidates(script);
        assert_eq!(found, vec![script]);
    }

    #[test]
    fn test_sig_delegating_shape() {
        let script = "function(a){return Wc(a);}";
        assert_eq!(SIG_FUNCTION_SHAPES[0].candidates(script), vec![script]);
    }

    #[test]
    fn test_sig_bare_return_shape() {
        let script = "function(p){return p;}";
        assert_eq!(SIG_FUNCTION_SHAPES[2].candidates(script), vec![script]);
    }

    #[test]
    fn test_n_function_strict() {
        let script = concat!(
            r#"function(a){var b=a[Zq[0]](Zq[1]),c=[];"#,
            r#"try{b=c[0](b)}catch(e){return"bad_"+a}"#,
            r#"return b[Zq[2]](Zq[3])};"#
        );
        let (shape, src) = find_n_function(script).expect("should match");
        assert_eq!(shape, NShape::Strict);
        assert_eq!(src, script);
    }

    #[test]
    fn test_n_function_relaxed_fallback() {
        let script = r#"function(n){var c=n;try{c=c.split("").reverse().join("")}catch(f){return "err_"+n}return c};"#;
        let (shape, _) = find_n_function(script).expect("should match");
        assert_eq!(shape, NShape::Relaxed);
    }

    #[test]
    fn test_n_function_no_match() {
        assert!(find_n_function("function(a){return a+1};").is_none());
    }

    #[test]
    fn test_first_parameter_name() {
        assert_eq!(first_parameter_name("function(abc, d){}"), Some("abc"));
        assert_eq!(first_parameter_name("function x( q ){}"), Some("q"));
        assert_eq!(first_parameter_name("function(){}"), None);
    }
}
