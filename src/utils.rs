//! Helpers for pulling structured data out of free-text model replies.
//!
//! Models are told to answer with bare JSON but routinely wrap it in prose or
//! code fences. Extraction takes the greedy span from the first opening bracket
//! to the last closing one; when that span does not parse, the first balanced
//! bracketed structure that does parse wins. Nothing found means an empty
//! container, never an error.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

static ARRAY_SPAN: LazyLock<Regex> = LazyLock::new(|| greedy(r"\[.*\]"));
static OBJECT_SPAN: LazyLock<Regex> = LazyLock::new(|| greedy(r"\{.*\}"));

fn greedy(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .dot_matches_new_line(true)
        .build()
        .expect("valid regex")
}

/// First JSON array in `text`, or an empty vec.
pub fn extract_json_array(text: &str) -> Vec<Value> {
    match find_json(text, &ARRAY_SPAN, '[', ']') {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// First JSON object in `text`, or an empty map.
pub fn extract_json_object(text: &str) -> Map<String, Value> {
    match find_json(text, &OBJECT_SPAN, '{', '}') {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// String items of the first JSON array in `text`, trimmed, blanks dropped.
pub fn extract_string_list(text: &str) -> Vec<String> {
    extract_json_array(text)
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .collect()
}

fn find_json(text: &str, span: &Regex, open: char, close: char) -> Option<Value> {
    let greedy = span.find(text)?;
    if let Ok(value) = serde_json::from_str::<Value>(greedy.as_str()) {
        return Some(value);
    }

    text.char_indices()
        .filter(|(_, ch)| *ch == open)
        .filter_map(|(start, _)| {
            balanced_end(&text[start..], open, close).map(|len| &text[start..start + len])
        })
        .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
}

/// Byte length of the bracketed structure `slice` starts with, skipping
/// brackets inside JSON strings. `None` when it never closes.
fn balanced_end(slice: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in slice.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// At most `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Upper-cases the first letter of every run of letters and lower-cases the rest,
/// so `"acme corp"` and `"ACME CORP"` both become `"Acme Corp"`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;
    for ch in text.chars() {
        if prev_is_letter {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        prev_is_letter = ch.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_array_wrapped_in_prose_and_fences() {
        let raw = "Sure! Here you go:\n```json\n[\"Smartphones\",\n \"Wearables\"]\n```\nEnjoy.";
        assert_eq!(
            extract_json_array(raw),
            vec![json!("Smartphones"), json!("Wearables")]
        );
    }

    #[test]
    fn greedy_span_prefers_outermost_object() {
        let raw =
            r#"{"brand_visibility": {"Acme": 91}, "brand_mentions": {"Acme": 88, "Rival": 71}}"#;
        let map = extract_json_object(raw);
        assert_eq!(map.len(), 2);
        assert_eq!(map["brand_mentions"]["Rival"], json!(71));
    }

    #[test]
    fn falls_back_to_first_balanced_structure_when_greedy_span_is_invalid() {
        let raw = r#"Result: {"valid": true, "company": "Acme"} (note: {not json})"#;
        let map = extract_json_object(raw);
        assert_eq!(map["company"], json!("Acme"));
    }

    #[test]
    fn brackets_inside_strings_do_not_confuse_the_scan() {
        let raw = r#"x ["a]b", "c"] trailing ] junk"#;
        assert_eq!(extract_json_array(raw), vec![json!("a]b"), json!("c")]);
    }

    #[test]
    fn malformed_or_missing_json_yields_empty_containers() {
        assert!(extract_json_array("no brackets here").is_empty());
        assert!(extract_json_array("[unterminated").is_empty());
        assert!(extract_json_object("{'single': 'quotes'}").is_empty());
        assert!(extract_json_object("").is_empty());
    }

    #[test]
    fn string_list_drops_non_strings_and_blanks() {
        let raw = r#"["One sentence?", 3, "  ", {"x": 1}, " Two. "]"#;
        assert_eq!(extract_string_list(raw), vec!["One sentence?", "Two."]);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn title_case_matches_word_capitalization() {
        assert_eq!(title_case("acme corp"), "Acme Corp");
        assert_eq!(title_case("SAMSUNG"), "Samsung");
        assert_eq!(title_case("e-ink labs"), "E-Ink Labs");
        assert_eq!(title_case(&title_case("mcdonald's")), title_case("mcdonald's"));
    }
}
