//! JSON extraction and repair for model output
//!
//! Generation models wrap their JSON in markdown fences, stop mid-object when
//! they hit the token ceiling, or trail off after the closing brace. This
//! module turns that unreliable text into a `serde_json::Value` or a
//! recoverable error - it never guesses content, only completes structure.
//!
//! Repair strategies, tried in order:
//! 1. Parse as-is (after fence stripping)
//! 2. Append the closing brackets an unterminated object/array still needs
//! 3. Truncate to the last structurally complete line and close from there

use thiserror::Error;
use tracing::{debug, warn};

/// Payloads shorter than this cannot be a usable plan; treat them as a
/// failed generation rather than attempting repair.
const MIN_VIABLE_LEN: usize = 100;

/// Errors from JSON extraction - both variants are recoverable upstream
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Payload too short to be a usable document ({len} chars)")]
    TooShort { len: usize },

    #[error("Unparseable payload after repair attempts: {0}")]
    Unparseable(#[source] serde_json::Error),
}

/// Extract a JSON value from raw model output, repairing if necessary
pub fn decode(raw: &str) -> Result<serde_json::Value, DecodeError> {
    let cleaned = strip_code_fence(raw);
    let len = cleaned.chars().count();
    debug!(raw_len = raw.len(), cleaned_len = len, "decode: called");

    if len < MIN_VIABLE_LEN {
        return Err(DecodeError::TooShort { len });
    }

    let direct_err = match serde_json::from_str(cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(balanced) = balance_brackets(cleaned)
        && let Ok(value) = serde_json::from_str(&balanced)
    {
        warn!("decode: recovered payload by appending closing brackets");
        return Ok(value);
    }

    if let Some(truncated) = truncate_to_balanced(cleaned)
        && let Ok(value) = serde_json::from_str(&truncated)
    {
        warn!("decode: recovered payload by truncating to last complete line");
        return Ok(value);
    }

    warn!(error = %direct_err, "decode: all repair strategies failed");
    Err(DecodeError::Unparseable(direct_err))
}

/// Strip a markdown code fence, returning the inner text trimmed
///
/// Handles both ```json and bare ``` fences; a missing closing fence takes
/// the remainder of the text.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();

    let after_open = if let Some(pos) = trimmed.find("```json") {
        &trimmed[pos + 7..]
    } else if let Some(pos) = trimmed.find("```") {
        &trimmed[pos + 3..]
    } else {
        return trimmed;
    };

    match after_open.find("```") {
        Some(close) => after_open[..close].trim(),
        None => after_open.trim(),
    }
}

/// Append whatever closers an unterminated JSON document still needs
///
/// Scans with a string-state machine and tracks open delimiters. A text that
/// ends inside a string literal gets the quote closed first. Returns `None`
/// when the text is already balanced or closes a bracket that was never
/// opened (structural damage appending cannot fix).
fn balance_brackets(text: &str) -> Option<String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => stack.push(c),
            '}' if !in_string => {
                if stack.pop() != Some('{') {
                    return None;
                }
            }
            ']' if !in_string => {
                if stack.pop() != Some('[') {
                    return None;
                }
            }
            _ => {}
        }
    }

    if escaped || (!in_string && stack.is_empty()) {
        return None;
    }

    let mut repaired = text.to_string();
    if in_string {
        repaired.push('"');
    }
    for opener in stack.iter().rev() {
        repaired.push(match opener {
            '{' => '}',
            _ => ']',
        });
    }
    Some(repaired)
}

/// Cut the text back to the last line where nesting returned to a sane
/// boundary, then close the document
///
/// Useful when the model stopped mid-value: bracket appending alone would
/// produce `"title": }` style damage, but dropping the torn line leaves a
/// parseable prefix.
fn truncate_to_balanced(text: &str) -> Option<String> {
    let mut kept: Vec<&str> = Vec::new();
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut cut_at: Option<usize> = None;

    for (i, line) in text.lines().enumerate() {
        for c in line.chars() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' if in_string => escaped = true,
                '"' => in_string = !in_string,
                '{' | '[' if !in_string => depth += 1,
                '}' | ']' if !in_string => depth -= 1,
                _ => {}
            }
        }
        kept.push(line);

        // Record the last line that ends on a clean structural boundary.
        let t = line.trim_end().trim_end_matches(',').trim_end();
        if !in_string && depth >= 1 && (t.ends_with('}') || t.ends_with(']')) {
            cut_at = Some(i);
        }
    }

    let cut = cut_at?;
    let prefix = kept[..=cut].join("\n");
    let trimmed = prefix.trim_end().trim_end_matches(',').to_string();
    balance_brackets(&trimmed).or(Some(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Long enough to clear the viability floor.
    fn plan_json() -> String {
        serde_json::json!({
            "yearly": ["完成网页开发入门"],
            "monthly": {"第1个月": {"goal": "HTML与CSS基础", "output": "静态页面"}},
            "weekly": {"第1周": [{"id": "w1-1", "title": "学习HTML标签"}]},
        })
        .to_string()
    }

    #[test]
    fn test_decode_plain_json() {
        let value = decode(&plan_json()).unwrap();
        assert_eq!(value["yearly"][0], "完成网页开发入门");
    }

    #[test]
    fn test_decode_strips_json_fence() {
        let wrapped = format!("好的，以下是拆解结果：\n```json\n{}\n```\n希望有帮助", plan_json());
        let value = decode(&wrapped).unwrap();
        assert_eq!(value["weekly"]["第1周"][0]["id"], "w1-1");
    }

    #[test]
    fn test_decode_strips_bare_fence() {
        let wrapped = format!("```\n{}\n```", plan_json());
        assert!(decode(&wrapped).is_ok());
    }

    #[test]
    fn test_decode_too_short() {
        let err = decode("{}").unwrap_err();
        assert!(matches!(err, DecodeError::TooShort { len: 2 }));
    }

    #[test]
    fn test_decode_repairs_missing_brackets() {
        let full = plan_json();
        // Chop off the closing "}}" -> unterminated object.
        let torn = &full[..full.len() - 2];
        let value = decode(torn).unwrap();
        assert!(value["monthly"]["第1个月"]["goal"].is_string());
    }

    #[test]
    fn test_decode_repairs_torn_line() {
        let torn = concat!(
            "{\n",
            "  \"monthly\": {\n",
            "    \"第1个月\": {\"goal\": \"HTML与CSS基础\", \"output\": \"完成三个静态页面作品\"}\n",
            "  },\n",
            "  \"weekly\": {\n",
            "    \"第1周\": [{\"id\": \"w1-1\", \"title\": \"学习HTML常用标签\"}],\n",
            "    \"第2周\": [{\"id\": \"w2-1\", \"title\": \"学习CSS选择器与盒模"
        );
        let value = decode(torn).unwrap();
        assert_eq!(value["monthly"]["第1个月"]["goal"], "HTML与CSS基础");
        assert!(value["weekly"]["第1周"][0]["title"].is_string());
    }

    #[test]
    fn test_decode_truncates_dangling_key() {
        // Ends right after a key's colon, so appending closers alone yields
        // invalid JSON and the line-truncation path has to kick in.
        let torn = concat!(
            "{\n",
            "  \"monthly\": {\n",
            "    \"第1个月\": {\"goal\": \"HTML与CSS基础\", \"output\": \"完成三个静态页面作品\"}\n",
            "  },\n",
            "  \"weekly\": {\n",
            "    \"第1周\": [{\"id\": \"w1-1\", \"title\": \"学习HTML常用标签\"}],\n",
            "    \"第2周\": [{\"id\": \"w2-1\", \"title\":"
        );
        let value = decode(torn).unwrap();
        assert_eq!(value["weekly"]["第1周"][0]["id"], "w1-1");
        assert!(value["weekly"].get("第2周").is_none() || value["weekly"]["第2周"].is_array());
    }

    #[test]
    fn test_decode_unparseable() {
        let garbage = "这不是JSON，模型今天完全没有按格式输出，只是写了一大段散文来描述它对这个学习计划的看法，抱歉。它觉得你应该先学习基础知识，然后再逐步深入，每天坚持练习，保持耐心，定期复盘自己的进度，并且在遇到困难时及时寻求帮助。";
        assert!(garbage.chars().count() >= 100);
        assert!(matches!(decode(garbage), Err(DecodeError::Unparseable(_))));
    }

    #[test]
    fn test_balance_brackets_rejects_mismatch() {
        assert!(balance_brackets("{\"a\": [1, 2}").is_none());
    }

    #[test]
    fn test_balance_brackets_ignores_brackets_in_strings() {
        let repaired = balance_brackets("{\"a\": \"值 {with [brackets\"").unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&repaired).is_ok());
    }

    proptest! {
        // Dropping up to 10 trailing closers must always be recoverable.
        #[test]
        fn prop_decode_recovers_truncated_tails(k in 0usize..10) {
            let full = plan_json();
            let cut = full.len().saturating_sub(k);
            if full.is_char_boundary(cut) {
                let torn = &full[..cut];
                if torn.chars().count() >= 100 {
                    prop_assert!(decode(torn).is_ok());
                }
            }
        }
    }
}
