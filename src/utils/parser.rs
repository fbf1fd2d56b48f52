//! Text extraction primitives for external command output.

use regex::Regex;

/// Extract first match from content using regex pattern with capture group.
/// Pattern must contain exactly one capture group for the value to extract.
/// Content is trimmed before matching.
pub fn extract_first(content: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(content.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Last whitespace-separated token of the output, if any.
pub fn last_token(output: &str) -> Option<&str> {
    output.split_whitespace().last()
}

/// Parse output into non-empty lines.
pub fn lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().filter(|line| !line.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_first_returns_capture_group() {
        assert_eq!(
            extract_first("  4821;cluster  ", r"^(\d+)"),
            Some("4821".to_string())
        );
    }

    #[test]
    fn extract_first_returns_none_without_match() {
        assert_eq!(extract_first("failed", r"^(\d+)$"), None);
    }

    #[test]
    fn extract_first_returns_none_for_invalid_pattern() {
        assert_eq!(extract_first("4821", r"(\d+"), None);
    }

    #[test]
    fn last_token_ignores_trailing_whitespace() {
        assert_eq!(last_token("Submitted batch job 4821\n"), Some("4821"));
        assert_eq!(last_token("   \n"), None);
        assert_eq!(last_token(""), None);
    }

    #[test]
    fn lines_skips_blank_lines() {
        let collected: Vec<&str> = lines("--time=01:00:00\n\n  \n--mem=8G").collect();
        assert_eq!(collected, vec!["--time=01:00:00", "--mem=8G"]);
    }
}
