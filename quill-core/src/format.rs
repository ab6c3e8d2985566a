//! Rendering an aggregated result into size-bounded messages
//!
//! Lengths are counted in characters. A rendering that fits the platform
//! limit is published as a single message. Longer renderings are split at
//! paragraph breaks into chunks of at most `limit - buffer` characters, the
//! buffer leaving room for the part header of continuation messages. When
//! the content needs more than `1 + max_continuation_messages` chunks the
//! last allowed chunk is cut short and ends with a truncation notice.

use std::fmt::Write;

use crate::config::OutputConfig;
use crate::publish::TOOL_SIGNATURE;
use crate::review::{AggregatedResult, FormattedOutput, UnitStatus, Verdict};

/// Appended to the last message when content had to be dropped
pub const TRUNCATION_NOTICE: &str =
    "\n\n---\n*Review truncated: the full output exceeds the platform message limit.*";

/// Smallest buffer that always fits a part header
const MIN_BUFFER: usize = 32;

const PARAGRAPH_BREAK: &str = "\n\n";

/// Renders and splits review output
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Render and split an aggregated result
    pub fn format(&self, result: &AggregatedResult) -> FormattedOutput {
        self.split(&render(result))
    }

    /// Split already rendered text into bounded messages
    pub fn split(&self, text: &str) -> FormattedOutput {
        let limit = self.config.platform_message_limit;
        if char_len(text) <= limit {
            return FormattedOutput {
                primary_message: text.to_string(),
                continuation_messages: Vec::new(),
                truncated: false,
            };
        }

        let capacity = self.chunk_capacity();
        let max_chunks = 1 + self.config.max_continuation_messages;
        let mut chunks = pack(text, capacity);

        let truncated = chunks.len() > max_chunks;
        if truncated {
            let overflow = chunks.split_off(max_chunks - 1).join(PARAGRAPH_BREAK);
            let keep = capacity.saturating_sub(char_len(TRUNCATION_NOTICE));
            let mut last = take_chars(&overflow, keep).trim_end().to_string();
            last.push_str(TRUNCATION_NOTICE);
            chunks.push(last);
        }

        let total = chunks.len();
        let mut chunks = chunks.into_iter();
        let primary_message = chunks.next().unwrap_or_default();
        let continuation_messages = chunks
            .enumerate()
            .map(|(i, chunk)| format!("{}{}", part_header(i + 2, total), chunk))
            .collect();

        FormattedOutput {
            primary_message,
            continuation_messages,
            truncated,
        }
    }

    fn chunk_capacity(&self) -> usize {
        let buffer = self.config.continuation_buffer.max(MIN_BUFFER);
        self.config
            .platform_message_limit
            .saturating_sub(buffer)
            .max(1)
    }
}

fn part_header(part: usize, total: usize) -> String {
    format!("*(continued, part {} of {})*\n\n", part, total)
}

/// Greedily pack paragraphs into chunks of at most `capacity` characters
fn pack(text: &str, capacity: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for paragraph in text.split(PARAGRAPH_BREAK) {
        let len = char_len(paragraph);
        let joined_len = if current.is_empty() {
            len
        } else {
            current_len + PARAGRAPH_BREAK.len() + len
        };

        if joined_len <= capacity {
            if !current.is_empty() {
                current.push_str(PARAGRAPH_BREAK);
            }
            current.push_str(paragraph);
            current_len = joined_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if len <= capacity {
            current.push_str(paragraph);
            current_len = len;
        } else {
            let mut pieces = hard_split(paragraph, capacity);
            if let Some(tail) = pieces.pop() {
                chunks.extend(pieces);
                current_len = char_len(&tail);
                current = tail;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split one oversized paragraph, preferring line breaks
fn hard_split(paragraph: &str, capacity: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = paragraph;

    while char_len(rest) > capacity {
        let window = take_chars(rest, capacity);
        let cut = match window.rfind('\n') {
            Some(idx) if idx > 0 => idx,
            _ => window.len(),
        };
        pieces.push(rest[..cut].to_string());
        rest = rest[cut..].strip_prefix('\n').unwrap_or(&rest[cut..]);
    }

    pieces.push(rest.to_string());
    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Prefix of at most `n` characters
fn take_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn verdict_badge(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Approve => "✅ Approve",
        Verdict::RequestChanges => "❌ Request Changes",
        Verdict::Comment => "💬 Comment",
    }
}

/// Full markdown rendering of a result, starting with the tool signature
pub fn render(result: &AggregatedResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", TOOL_SIGNATURE);
    let _ = writeln!(out, "## Quill review: {}", verdict_badge(result.overall_verdict));
    out.push('\n');
    let _ = write!(
        out,
        "Confidence: {:.0}% | Issues: {} | Reviewed: {}/{}",
        result.confidence * 100.0,
        result.issue_counts.total,
        result.reviewed_units(),
        result.per_unit_summary.len()
    );

    out.push_str(PARAGRAPH_BREAK);
    out.push_str(result.narrative_text.trim());

    if result.issue_counts.total > 0 {
        let counts: Vec<String> = result
            .issue_counts
            .by_severity
            .iter()
            .map(|(severity, n)| format!("{} {}", n, severity.as_str()))
            .collect();
        out.push_str(PARAGRAPH_BREAK);
        let _ = write!(out, "### Issues ({})", counts.join(", "));

        // one paragraph per issue keeps split points between issues
        for located in &result.prioritized_issues {
            let issue = &located.issue;
            out.push_str(PARAGRAPH_BREAK);
            let marker = if issue.is_blocking() { "🚫" } else { "-" };
            let _ = write!(
                out,
                "{} **{}** `{}` ({})",
                marker,
                issue.severity.as_str(),
                located.unit_id,
                issue.category.as_str()
            );
            if let Some(line) = issue.line {
                let _ = write!(out, " line {}", line);
            }
            let _ = write!(out, ": {}", issue.message.trim());
        }
    }

    if result.per_unit_summary.len() > 1 {
        out.push_str(PARAGRAPH_BREAK);
        out.push_str("### Files");
        for unit in &result.per_unit_summary {
            out.push_str(PARAGRAPH_BREAK);
            match unit.status {
                UnitStatus::Success => {
                    let verdict = unit.verdict.map(|v| v.to_string()).unwrap_or_default();
                    let _ = write!(
                        out,
                        "- `{}`: {} ({} issue{})",
                        unit.unit_id,
                        verdict,
                        unit.issue_count,
                        if unit.issue_count == 1 { "" } else { "s" }
                    );
                    if let Some(summary) = unit.summary.as_deref() {
                        let _ = write!(out, ". {}", summary.trim());
                    }
                }
                UnitStatus::Skipped | UnitStatus::Failed => {
                    let label = if unit.status == UnitStatus::Skipped {
                        "skipped"
                    } else {
                        "failed"
                    };
                    let _ = write!(
                        out,
                        "- `{}`: {} ({})",
                        unit.unit_id,
                        label,
                        unit.failure_reason.as_deref().unwrap_or("no reason recorded")
                    );
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::review::{Category, ReviewIssue, Severity, UnitOutcome};

    fn formatter(limit: usize, buffer: usize, max_continuations: usize) -> Formatter {
        Formatter::new(OutputConfig {
            max_continuation_messages: max_continuations,
            platform_message_limit: limit,
            continuation_buffer: buffer,
        })
    }

    fn paragraphs(count: usize, len: usize) -> String {
        (0..count)
            .map(|i| {
                let c = char::from(b'a' + (i % 26) as u8);
                c.to_string().repeat(len)
            })
            .collect::<Vec<_>>()
            .join(PARAGRAPH_BREAK)
    }

    fn strip_header(message: &str) -> &str {
        message.split_once(")*\n\n").map(|(_, body)| body).unwrap_or(message)
    }

    fn assert_bounds(output: &FormattedOutput, limit: usize, max_continuations: usize) {
        assert!(output.continuation_messages.len() <= max_continuations);
        for message in output.messages() {
            assert!(char_len(message) <= limit, "message of {} chars", char_len(message));
        }
    }

    #[test]
    fn test_exactly_at_limit_has_no_continuations() {
        let text = "x".repeat(1_000);
        let output = formatter(1_000, 100, 5).split(&text);
        assert_eq!(output.primary_message, text);
        assert!(output.continuation_messages.is_empty());
        assert!(!output.truncated);
    }

    #[test]
    fn test_one_over_limit_has_one_continuation() {
        let text = paragraphs(2, 500);
        assert_eq!(char_len(&text), 1_002);

        let output = formatter(1_001, 100, 5).split(&text);
        assert_eq!(output.continuation_messages.len(), 1);
        assert!(!output.truncated);
        assert_eq!(output.primary_message, "a".repeat(500));
        assert_eq!(
            output.continuation_messages[0],
            format!("{}{}", part_header(2, 2), "b".repeat(500))
        );
        assert_bounds(&output, 1_001, 5);
    }

    #[test]
    fn test_large_narrative_covers_full_content() {
        // 140 paragraphs of 998 chars plus breaks, just under 140,000 chars
        let text = paragraphs(140, 998);
        assert_eq!(char_len(&text), 140 * 998 + 139 * 2);

        let output = formatter(65_536, 200, 5).split(&text);
        assert!(!output.truncated);
        assert_eq!(output.continuation_messages.len(), 2);
        assert_bounds(&output, 65_536, 5);

        let rebuilt: Vec<&str> = output.messages().map(strip_header).collect();
        assert_eq!(rebuilt.join(PARAGRAPH_BREAK), text);
    }

    #[test]
    fn test_overflow_truncates_last_chunk() {
        let text = paragraphs(40, 300);
        let output = formatter(1_000, 100, 2).split(&text);

        assert!(output.truncated);
        assert_eq!(output.continuation_messages.len(), 2);
        assert_bounds(&output, 1_000, 2);
        let last = output.continuation_messages.last().unwrap();
        assert!(last.ends_with(TRUNCATION_NOTICE));
        assert!(last.starts_with(&part_header(3, 3)));
    }

    #[test]
    fn test_overflow_without_continuations_truncates_primary() {
        let text = paragraphs(10, 300);
        let output = formatter(1_000, 100, 0).split(&text);

        assert!(output.truncated);
        assert!(output.continuation_messages.is_empty());
        assert!(output.primary_message.starts_with(&"a".repeat(300)));
        assert!(output.primary_message.ends_with(TRUNCATION_NOTICE));
        assert!(char_len(&output.primary_message) <= 1_000);
    }

    #[test]
    fn test_oversized_paragraph_is_hard_split() {
        let text = "é".repeat(2_500);
        let output = formatter(1_000, 100, 5).split(&text);

        assert!(!output.truncated);
        assert_eq!(output.continuation_messages.len(), 2);
        assert_bounds(&output, 1_000, 5);
        let rebuilt: String = output.messages().map(strip_header).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_hard_split_prefers_line_breaks() {
        let pieces = hard_split("aaaa\nbbbb\ncccc", 10);
        assert_eq!(pieces, vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_format_is_deterministic() {
        let outcomes = vec![
            UnitOutcome::success(
                "src/a.rs",
                Verdict::Comment,
                vec![ReviewIssue::new(Severity::High, Category::Bug, "unchecked index").at_line(4)],
                Some("Adds parsing.".into()),
                "",
            ),
            UnitOutcome::skipped("assets/big.json", "too large to review"),
        ];
        let result = Aggregator::new(0.1).aggregate(&outcomes);
        let formatter = formatter(65_536, 200, 5);

        let first = formatter.format(&result);
        let second = formatter.format(&result);
        assert_eq!(first, second);

        assert!(first.primary_message.starts_with(TOOL_SIGNATURE));
        assert!(first.primary_message.contains("💬 Comment"));
        assert!(first.primary_message.contains("`src/a.rs` (bug) line 4: unchecked index"));
        assert!(first.primary_message.contains("`assets/big.json`: skipped (too large to review)"));
    }

    #[test]
    fn test_huge_result_stays_within_bounds() {
        let issues: Vec<ReviewIssue> = (0..5_000)
            .map(|i| {
                let message = format!("{} {}", i, "nit ".repeat(20));
                ReviewIssue::new(Severity::Low, Category::Style, message)
            })
            .collect();
        let outcome = UnitOutcome::success("<whole-change>", Verdict::Comment, issues, None, "");
        let result = Aggregator::new(0.1).aggregate(&[outcome]);

        let output = formatter(65_536, 200, 5).format(&result);
        assert!(output.truncated);
        assert_bounds(&output, 65_536, 5);
    }
}
