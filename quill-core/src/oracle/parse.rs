//! Interpreting free-form oracle text
//!
//! Two shapes are recognized:
//! - a JSON object (the first balanced `{...}` in the text that decodes into
//!   the response shape), possibly wrapped in prose or a code fence
//! - a markdown narrative with a `REVIEW SUMMARY: <verdict>` line and
//!   `BLOCKING:` / `IMPORTANT:` / `SUGGESTIONS:` bullet sections
//!
//! Anything else is `Unparseable`.

use serde::Deserialize;

use crate::review::{Category, ReviewIssue, Severity, Verdict};

/// A unit review interpreted from oracle text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitResponse {
    pub verdict: Verdict,
    pub summary: Option<String>,
    pub issues: Vec<ReviewIssue>,
}

/// Result of interpreting oracle text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    /// JSON object in the requested shape
    Structured(UnitResponse),
    /// Recognized markdown narrative
    Narrative(UnitResponse),
    /// Nothing recognizable, raw text kept
    Unparseable(String),
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    verdict: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(default)]
    severity: String,
    #[serde(default)]
    category: String,
    #[serde(alias = "description")]
    message: String,
    #[serde(default, alias = "location_line")]
    line: Option<u32>,
}

impl RawResponse {
    fn into_unit_response(self) -> Option<UnitResponse> {
        let verdict = Verdict::parse(&self.verdict)?;
        let issues = self
            .issues
            .into_iter()
            .map(|raw| ReviewIssue {
                severity: Severity::parse(&raw.severity),
                category: Category::parse(&raw.category),
                message: raw.message,
                line: raw.line,
            })
            .collect();

        Some(UnitResponse {
            verdict,
            summary: self.summary.filter(|s| !s.trim().is_empty()),
            issues,
        })
    }
}

/// Interpret raw oracle text
pub fn parse_response(raw: &str) -> ParsedResponse {
    if let Some(response) = parse_structured(raw) {
        return ParsedResponse::Structured(response);
    }

    if let Some(response) = parse_narrative(raw) {
        return ParsedResponse::Narrative(response);
    }

    ParsedResponse::Unparseable(raw.to_string())
}

fn parse_structured(raw: &str) -> Option<UnitResponse> {
    let mut rest = raw;
    while let Some((start, end)) = first_json_object(rest) {
        let candidate = &rest[start..end];
        if let Ok(parsed) = serde_json::from_str::<RawResponse>(candidate) {
            if let Some(response) = parsed.into_unit_response() {
                return Some(response);
            }
        }
        rest = &rest[start + 1..];
    }
    None
}

/// Byte range of the first balanced `{...}` in `text`, string-literal aware
pub fn first_json_object(text: &str) -> Option<(usize, usize)> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + offset + 1));
                }
            }
            _ => {}
        }
    }

    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Blocking,
    Important,
    Suggestions,
    Other,
}

fn parse_narrative(raw: &str) -> Option<UnitResponse> {
    let mut verdict = None;
    let mut summary_lines: Vec<&str> = Vec::new();
    let mut issues = Vec::new();
    let mut section = Section::None;

    for line in raw.lines() {
        let trimmed = line.trim().trim_start_matches('#').trim();
        let upper = trimmed.to_ascii_uppercase();

        if let Some(label) = upper
            .strip_prefix("REVIEW SUMMARY:")
            .or_else(|| upper.strip_prefix("VERDICT:"))
        {
            let label = label.trim().trim_matches(|c| c == '*' || c == '[' || c == ']');
            verdict = Verdict::parse(label);
            section = Section::None;
            continue;
        }

        let heading = upper.trim_matches('*').trim_end_matches(':');
        let next = match heading {
            "BLOCKING" => Some(Section::Blocking),
            "IMPORTANT" => Some(Section::Important),
            "SUGGESTIONS" => Some(Section::Suggestions),
            "POSITIVE" | "POSITIVES" => Some(Section::Other),
            _ => None,
        };
        if let Some(next) = next {
            section = next;
            continue;
        }

        let bullet = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "));

        match (section, bullet) {
            (Section::Blocking, Some(item)) => {
                issues.push(narrative_issue(Severity::Critical, item))
            }
            (Section::Important, Some(item)) => issues.push(narrative_issue(Severity::High, item)),
            (Section::Suggestions, Some(item)) => issues.push(narrative_issue(Severity::Low, item)),
            (Section::None, None) if verdict.is_some() && !trimmed.is_empty() => {
                summary_lines.push(trimmed)
            }
            _ => {}
        }
    }

    let verdict = verdict?;
    let summary = if summary_lines.is_empty() {
        None
    } else {
        Some(summary_lines.join(" "))
    };

    Some(UnitResponse {
        verdict,
        summary,
        issues,
    })
}

fn narrative_issue(severity: Severity, item: &str) -> ReviewIssue {
    let item = item.trim();
    let lower = item.to_ascii_lowercase();
    let category = if lower.contains("security")
        || lower.contains("injection")
        || lower.contains("vulnerab")
    {
        Category::Security
    } else {
        Category::Other
    };

    let mut issue = ReviewIssue::new(severity, category, item);
    if let Some(line) = location_line(item) {
        issue = issue.at_line(line);
    }
    issue
}

/// Line number from a leading `path:line` or `line N` reference
fn location_line(item: &str) -> Option<u32> {
    let first = item.split_whitespace().next()?;
    if let Some((_, line)) = first.trim_end_matches([':', ',']).rsplit_once(':') {
        if let Ok(n) = line.parse() {
            return Some(n);
        }
    }

    let lower = item.to_ascii_lowercase();
    let idx = lower.find("line ")?;
    lower[idx + 5..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_plain_json() {
        let raw = r#"{"verdict":"approve","summary":"Clean change","issues":[]}"#;
        match parse_response(raw) {
            ParsedResponse::Structured(r) => {
                assert_eq!(r.verdict, Verdict::Approve);
                assert_eq!(r.summary.as_deref(), Some("Clean change"));
                assert!(r.issues.is_empty());
            }
            other => panic!("expected Structured, got {:?}", other),
        }
    }

    #[test]
    fn test_parses_fenced_json_with_prose() {
        let raw = "Here is my review:\n```json\n{\"verdict\": \"request_changes\", \"issues\": [\
            {\"severity\": \"High\", \"category\": \"security\", \"message\": \"SQL built with format! {user}\", \"line\": 12}\
            ]}\n```\nThanks!";
        match parse_response(raw) {
            ParsedResponse::Structured(r) => {
                assert_eq!(r.verdict, Verdict::RequestChanges);
                assert_eq!(r.issues.len(), 1);
                assert_eq!(r.issues[0].severity, Severity::High);
                assert_eq!(r.issues[0].category, Category::Security);
                assert_eq!(r.issues[0].line, Some(12));
                assert!(r.issues[0].message.contains("{user}"));
            }
            other => panic!("expected Structured, got {:?}", other),
        }
    }

    #[test]
    fn test_skips_leading_unrelated_object() {
        let raw = r#"Config used: {"temperature": 0} and the review {"verdict":"comment","issues":[]}"#;
        assert!(matches!(
            parse_response(raw),
            ParsedResponse::Structured(UnitResponse { verdict: Verdict::Comment, .. })
        ));
    }

    #[test]
    fn test_first_json_object_respects_strings() {
        let text = r#"x {"a": "}{", "b": {"c": 1}} y"#;
        let (start, end) = first_json_object(text).unwrap();
        assert_eq!(&text[start..end], r#"{"a": "}{", "b": {"c": 1}}"#);
        assert_eq!(first_json_object("no braces"), None);
        assert_eq!(first_json_object("{ unclosed"), None);
    }

    #[test]
    fn test_parses_narrative_shape() {
        let raw = "REVIEW SUMMARY: REQUEST_CHANGES\n\
                   The login flow is mostly fine.\n\n\
                   BLOCKING:\n\
                   - src/auth.rs:42 password compared with ==\n\n\
                   IMPORTANT:\n\
                   - Missing error handling on line 7\n\n\
                   SUGGESTIONS:\n\
                   - Rename `x` to `attempts`\n\n\
                   POSITIVE:\n\
                   - Good test coverage\n";
        match parse_response(raw) {
            ParsedResponse::Narrative(r) => {
                assert_eq!(r.verdict, Verdict::RequestChanges);
                assert_eq!(r.summary.as_deref(), Some("The login flow is mostly fine."));
                assert_eq!(r.issues.len(), 3);
                assert_eq!(r.issues[0].severity, Severity::Critical);
                assert_eq!(r.issues[0].line, Some(42));
                assert_eq!(r.issues[1].severity, Severity::High);
                assert_eq!(r.issues[1].line, Some(7));
                assert_eq!(r.issues[2].severity, Severity::Low);
            }
            other => panic!("expected Narrative, got {:?}", other),
        }
    }

    #[test]
    fn test_narrative_security_keyword_sets_category() {
        let raw = "REVIEW SUMMARY: COMMENT\nIMPORTANT:\n- Possible SQL injection in query builder\n";
        match parse_response(raw) {
            ParsedResponse::Narrative(r) => assert_eq!(r.issues[0].category, Category::Security),
            other => panic!("expected Narrative, got {:?}", other),
        }
    }

    #[test]
    fn test_json_with_unknown_verdict_falls_through() {
        let raw = r#"{"verdict":"ship it","issues":[]}"#;
        assert!(matches!(parse_response(raw), ParsedResponse::Unparseable(_)));
    }

    #[test]
    fn test_unparseable_keeps_raw_text() {
        let raw = "I could not review this change, sorry.";
        assert_eq!(
            parse_response(raw),
            ParsedResponse::Unparseable(raw.to_string())
        );
    }
}
