//! Input sanitization applied to every field before rule checks.
//!
//! Strings are trimmed, stripped of markup, and HTML-escaped; everything else
//! passes through untouched. The sanitized value is what validation sees and
//! what ultimately gets stored, so a `<script>` payload never survives past
//! this point.

use serde_json::Value;

/// Sanitizes a single JSON value. Only strings are transformed.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(s)),
        other => other.clone(),
    }
}

/// Trim, strip tags, then escape the HTML-special characters.
pub fn sanitize_str(input: &str) -> String {
    escape_html(&strip_tags(input.trim()))
}

/// Removes `<...>` sequences. An unclosed `<` swallows the rest of the
/// string; a bare `>` outside a tag is kept.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Empty for validation purposes: `null`, `""`, or whitespace-only.
/// `false` and `0` are values, not absences.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(sanitize_str("  hello world  "), "hello world");
        assert_eq!(sanitize_str("\t\ntabbed\n"), "tabbed");
    }

    #[test]
    fn test_strips_tags() {
        assert_eq!(sanitize_str("<b>bold</b> text"), "bold text");
        assert_eq!(
            sanitize_str("<script>alert('x')</script>Report"),
            "alert(&#039;x&#039;)Report"
        );
        // unclosed tag swallows the remainder; the space ahead of it stays
        // because trimming happens before stripping
        assert_eq!(sanitize_str("before <img src=x"), "before ");
        // a lone closing angle bracket survives and is escaped
        assert_eq!(sanitize_str("a > b"), "a &gt; b");
    }

    #[test]
    fn test_escapes_special_characters() {
        assert_eq!(sanitize_str("Tom & Jerry"), "Tom &amp; Jerry");
        assert_eq!(sanitize_str("say \"hi\""), "say &quot;hi&quot;");
        assert_eq!(sanitize_str("it's"), "it&#039;s");
    }

    #[test]
    fn test_idempotent_on_benign_text() {
        let once = sanitize_str("Ship the release");
        let twice = sanitize_str(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "Ship the release");
    }

    #[test]
    fn test_non_strings_pass_through() {
        assert_eq!(sanitize(&json!(42)), json!(42));
        assert_eq!(sanitize(&json!(true)), json!(true));
        assert_eq!(sanitize(&Value::Null), Value::Null);
    }

    #[test]
    fn test_is_empty() {
        assert!(is_empty(&Value::Null));
        assert!(is_empty(&json!("")));
        assert!(is_empty(&json!("   ")));
        assert!(!is_empty(&json!("x")));
        assert!(!is_empty(&json!(0)));
        assert!(!is_empty(&json!(false)));
    }
}
