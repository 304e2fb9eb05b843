//! Brace-aware scanning of raw player-script text
//!
//! Function bodies in minified player scripts legally contain `{`/`}` inside
//! string literals, comments, and regex literals. A naive depth counter
//! miscounts those, so this scanner tracks all three lexical contexts.

use crate::error::UnsigError;

/// Returns the byte offset of the `}` that closes the body starting at
/// `body_start`, where `body_start` points just past the opening `{`
/// (depth 1). Fails with [`UnsigError::UnterminatedBody`] when the text
/// ends before depth returns to zero.
pub fn matching_brace_end(script: &str, body_start: usize) -> Result<usize, UnsigError> {
    let bytes = script.as_bytes();
    let len = bytes.len();
    let mut idx = body_start;
    let mut depth: u32 = 1;

    let mut in_string = false;
    let mut string_quote = 0u8;
    let mut escape = false;
    let mut in_regex = false;
    let mut in_regex_class = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;
    // Last significant byte outside strings/comments, used to decide whether
    // a `/` opens a regex literal or is a division operator.
    let mut last_significant = 0u8;

    while idx < len && depth > 0 {
        let c = bytes[idx];

        if in_line_comment {
            if c == b'\n' || c == b'\r' {
                in_line_comment = false;
            }
            idx += 1;
            continue;
        }
        if in_block_comment {
            if c == b'*' && idx + 1 < len && bytes[idx + 1] == b'/' {
                in_block_comment = false;
                idx += 2;
                continue;
            }
            idx += 1;
            continue;
        }
        if in_string {
            if escape {
                escape = false;
            } else if c == b'\\' {
                escape = true;
            } else if c == string_quote {
                in_string = false;
                last_significant = c;
            }
            idx += 1;
            continue;
        }
        if in_regex {
            if escape {
                escape = false;
            } else if c == b'\\' {
                escape = true;
            } else if c == b'[' {
                in_regex_class = true;
            } else if c == b']' {
                in_regex_class = false;
            } else if c == b'/' && !in_regex_class {
                in_regex = false;
                last_significant = c;
            }
            idx += 1;
            continue;
        }

        match c {
            b'/' => {
                if idx + 1 < len && bytes[idx + 1] == b'/' {
                    in_line_comment = true;
                    idx += 2;
                    continue;
                }
                if idx + 1 < len && bytes[idx + 1] == b'*' {
                    in_block_comment = true;
                    idx += 2;
                    continue;
                }
                if divides(last_significant) {
                    // Division, not a regex literal.
                    last_significant = c;
                } else {
                    in_regex = true;
                    in_regex_class = false;
                    escape = false;
                }
            }
            b'\'' | b'"' | b'`' => {
                in_string = true;
                string_quote = c;
                escape = false;
            }
            b'{' => {
                depth += 1;
                last_significant = c;
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(idx);
                }
                last_significant = c;
            }
            _ => {
                if !c.is_ascii_whitespace() {
                    last_significant = c;
                }
            }
        }
        idx += 1;
    }

    Err(UnsigError::UnterminatedBody(body_start))
}

/// A `/` preceded by one of these is a division operator: the end of an
/// identifier, a call/index expression, or a literal.
fn divides(prev: u8) -> bool {
    prev.is_ascii_alphanumeric()
        || prev == b'_'
        || prev == b'$'
        || prev == b')'
        || prev == b']'
        || prev == b'\''
        || prev == b'"'
        || prev == b'`'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(src: &str) -> &str {
        let start = src.find('{').unwrap() + 1;
        let end = matching_brace_end(src, start).unwrap();
        &src[start..end]
    }

    #[test]
    fn test_plain_nested_braces() {
        let src = "function(a){if(a){a=1}else{a=2}return a} trailing";
        assert_eq!(body_of(src), "if(a){a=1}else{a=2}return a");
    }

    #[test]
    fn test_braces_inside_strings() {
        let src = r#"function(a){var b="}}}";var c='{{';return b+c} x"#;
        assert_eq!(body_of(src), r#"var b="}}}";var c='{{';return b+c"#);
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let src = r#"function(a){var b="\"}";return b}"#;
        assert_eq!(body_of(src), r#"var b="\"}";return b"#);
    }

    #[test]
    fn test_template_literal() {
        let src = "function(a){var b=`}${a}`;return b}";
        assert_eq!(body_of(src), "var b=`}${a}`;return b");
    }

    #[test]
    fn test_braces_inside_comments() {
        let src = "function(a){// closing } here\nvar b=1;/* } } */return b}";
        assert_eq!(body_of(src), "// closing } here\nvar b=1;/* } } */return b");
    }

    #[test]
    fn test_regex_literal_with_brace() {
        let src = "function(a){var r=/[}]{2}/;return a.replace(r,\"\")}";
        assert_eq!(body_of(src), "var r=/[}]{2}/;return a.replace(r,\"\")");
    }

    #[test]
    fn test_division_is_not_regex_start() {
        // `b/2` must not open a regex literal that would swallow the rest.
        let src = "function(a){var b=4;var c=b/2;return c}";
        assert_eq!(body_of(src), "var b=4;var c=b/2;return c");
    }

    #[test]
    fn test_division_after_paren() {
        let src = "function(a){var c=(a+1)/2;return c}";
        assert_eq!(body_of(src), "var c=(a+1)/2;return c");
    }

    #[test]
    fn test_unterminated_body() {
        let src = "function(a){var b=\"unclosed";
        let start = src.find('{').unwrap() + 1;
        let err = matching_brace_end(src, start).unwrap_err();
        assert!(matches!(err, UnsigError::UnterminatedBody(_)));
    }

    #[test]
    fn test_unterminated_nested() {
        let src = "function(a){if(a){return a}";
        let start = src.find('{').unwrap() + 1;
        assert!(matching_brace_end(src, start).is_err());
    }
}
