//! JSONC comment stripping: single-line `// ...` and multi-line `/* ... */`
//! comments removed before parsing, string-literal-aware so that `//` or `/*`
//! inside a JSON string is left untouched. Stripping is JSON-preserving: any
//! already-valid JSON text passes through unchanged.

/// Strip comments from JSONC text, returning plain JSON.
pub fn strip(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    let bytes = input.as_bytes();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                consume_string(&mut chars, &mut out, bytes);
            }
            '/' if matches!(bytes.get(i + 1), Some(b'/')) => {
                chars.next();
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if matches!(bytes.get(i + 1), Some(b'*')) => {
                chars.next();
                let mut prev = '\0';
                for (_, c) in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    if c == '\n' {
                        out.push('\n');
                    }
                    prev = c;
                }
            }
            other => out.push(other),
        }
    }

    out
}

fn consume_string(
    chars: &mut std::iter::Peekable<std::str::CharIndices>,
    out: &mut String,
    _bytes: &[u8],
) {
    let mut escaped = false;
    for (_, c) in chars.by_ref() {
        out.push(c);
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => break,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_comments() {
        let input = "{\n  \"a\": 1, // comment\n  \"b\": 2\n}";
        let stripped = strip(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn strips_block_comments() {
        let input = "{/* leading */ \"a\": 1 /* trailing */}";
        let stripped = strip(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn leaves_slashes_in_strings_alone() {
        let input = r#"{"url": "http://example.com", "note": "a // b /* c */"}"#;
        let stripped = strip(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["url"], "http://example.com");
        assert_eq!(value["note"], "a // b /* c */");
    }

    #[test]
    fn valid_json_passes_through_unchanged_in_meaning() {
        let input = r#"{"a":1,"b":[1,2,3],"c":"x"}"#;
        let stripped = strip(input);
        let original: serde_json::Value = serde_json::from_str(input).unwrap();
        let roundtrip: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(original, roundtrip);
    }

    #[test]
    fn escaped_quote_inside_string_does_not_end_it_early() {
        let input = r#"{"a": "quote \" still inside // not a comment"}"#;
        let stripped = strip(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], "quote \" still inside // not a comment");
    }
}
