//! Code block extraction from model responses.
//!
//! Models wrap generated code in markdown fences, usually with a language
//! tag. Language-tagged fences are preferred; untagged fences are the
//! fallback. Callers that get nothing back treat the whole response as the
//! payload, since some models answer with bare code.

use regex::Regex;

/// Extracts fenced code blocks for `language` from a model response.
///
/// Blocks tagged with the exact language come first, then untagged or
/// differently-tagged fences. Returned blocks are trimmed; empty blocks are
/// dropped.
pub fn extract_code(response: &str, language: &str) -> Vec<String> {
    let mut codes = Vec::new();

    let tagged = format!(r"(?s)```{}[ \t]*\r?\n(.*?)```", regex::escape(language));
    if let Ok(re) = Regex::new(&tagged) {
        for cap in re.captures_iter(response) {
            push_trimmed(&mut codes, &cap[1]);
        }
    }

    if codes.is_empty() {
        if let Ok(re) = Regex::new(r"(?s)```[a-zA-Z0-9_+-]*[ \t]*\r?\n(.*?)```") {
            for cap in re.captures_iter(response) {
                push_trimmed(&mut codes, &cap[1]);
            }
        }
    }

    codes
}

fn push_trimmed(codes: &mut Vec<String>, block: &str) {
    let trimmed = block.trim();
    if !trimmed.is_empty() {
        codes.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_language_tagged_block() {
        let response = "Here you go:\n```python\nprint('hi')\n```\nEnjoy!";
        let codes = extract_code(response, "python");
        assert_eq!(codes, vec!["print('hi')"]);
    }

    #[test]
    fn prefers_tagged_over_untagged() {
        let response = "```\nwrong\n```\n```rust\nfn main() {}\n```";
        let codes = extract_code(response, "rust");
        assert_eq!(codes, vec!["fn main() {}"]);
    }

    #[test]
    fn falls_back_to_untagged_fence() {
        let response = "Sure:\n```\nx = 1\n```";
        let codes = extract_code(response, "python");
        assert_eq!(codes, vec!["x = 1"]);
    }

    #[test]
    fn multiple_blocks_keep_order() {
        let response = "```py\nfirst\n```\ntext\n```py\nsecond\n```";
        let codes = extract_code(response, "py");
        assert_eq!(codes, vec!["first", "second"]);
    }

    #[test]
    fn no_fence_yields_nothing() {
        assert!(extract_code("just prose, no code", "python").is_empty());
    }
}
