//! Unit outcomes, aggregated results and formatted output

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Verdict at unit or aggregate level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Changes approved
    Approve,
    /// Changes need work
    RequestChanges,
    /// General comment, no strong opinion
    Comment,
}

impl Verdict {
    /// Parse a verdict label leniently (`APPROVE`, `request-changes`, `Approved`, ...)
    pub fn parse(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "approve" | "approved" | "lgtm" => Some(Verdict::Approve),
            "request_changes" | "changes_requested" | "reject" => Some(Verdict::RequestChanges),
            "comment" | "commented" | "neutral" => Some(Verdict::Comment),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approve => write!(f, "Approve"),
            Verdict::RequestChanges => write!(f, "Request Changes"),
            Verdict::Comment => write!(f, "Comment"),
        }
    }
}

/// Issue severity, ordered from most to least severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Parse a severity label, unknown labels map to `Info`
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" | "blocker" | "blocking" | "fatal" => Severity::Critical,
            "high" | "major" | "error" | "important" => Severity::High,
            "medium" | "moderate" | "warning" | "warn" => Severity::Medium,
            "low" | "minor" | "nit" | "suggestion" => Severity::Low,
            _ => Severity::Info,
        }
    }

    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

/// Issue category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Bug,
    Performance,
    Maintainability,
    Style,
    Testing,
    Documentation,
    Other,
}

impl Category {
    /// Parse a category label, unknown labels map to `Other`
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "security" | "vulnerability" | "vuln" => Category::Security,
            "bug" | "correctness" | "logic" => Category::Bug,
            "performance" | "perf" => Category::Performance,
            "maintainability" | "design" | "complexity" => Category::Maintainability,
            "style" | "formatting" | "readability" => Category::Style,
            "testing" | "tests" | "test" => Category::Testing,
            "documentation" | "docs" => Category::Documentation,
            _ => Category::Other,
        }
    }

    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Security => "security",
            Category::Bug => "bug",
            Category::Performance => "performance",
            Category::Maintainability => "maintainability",
            Category::Style => "style",
            Category::Testing => "testing",
            Category::Documentation => "documentation",
            Category::Other => "other",
        }
    }
}

/// A single review issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub severity: Severity,
    pub category: Category,
    /// Description of the issue
    pub message: String,
    /// Line number within the unit, if known
    pub line: Option<u32>,
}

impl ReviewIssue {
    /// Create a new review issue
    pub fn new(severity: Severity, category: Category, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            line: None,
        }
    }

    /// Add line number
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Whether this issue alone forces `RequestChanges`
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Critical || self.category == Category::Security
    }
}

impl std::fmt::Display for ReviewIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}] ", self.severity.as_str(), self.category.as_str())?;
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }
        write!(f, "{}", self.message)
    }
}

/// Status of one attempted unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    /// Oracle produced a usable review
    Success,
    /// Unit was not reviewed (too large, retries exhausted)
    Skipped,
    /// Unit hit a non-retryable failure
    Failed,
}

/// Result of analyzing one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub unit_id: String,
    pub status: UnitStatus,
    /// The unit's own verdict, present on success
    pub verdict: Option<Verdict>,
    /// Issues in the order the oracle reported them
    pub issues: Vec<ReviewIssue>,
    /// Short summary written by the oracle
    pub summary: Option<String>,
    /// Raw oracle response text
    pub raw_text: String,
    /// Why the unit was skipped or failed
    pub failure_reason: Option<String>,
}

impl UnitOutcome {
    /// Successful outcome
    pub fn success(
        unit_id: impl Into<String>,
        verdict: Verdict,
        issues: Vec<ReviewIssue>,
        summary: Option<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            status: UnitStatus::Success,
            verdict: Some(verdict),
            issues,
            summary,
            raw_text: raw_text.into(),
            failure_reason: None,
        }
    }

    /// Skipped outcome with the reason recorded
    pub fn skipped(unit_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            status: UnitStatus::Skipped,
            verdict: None,
            issues: Vec::new(),
            summary: None,
            raw_text: String::new(),
            failure_reason: Some(reason.into()),
        }
    }

    /// Failed outcome with the reason recorded
    pub fn failed(unit_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: UnitStatus::Failed,
            ..Self::skipped(unit_id, reason)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UnitStatus::Success
    }
}

/// An issue tagged with the unit it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedIssue {
    pub unit_id: String,
    pub issue: ReviewIssue,
}

/// Issue tallies across all successful units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: BTreeMap<Category, usize>,
    pub total: usize,
}

impl IssueCounts {
    /// Count one issue
    pub fn record(&mut self, issue: &ReviewIssue) {
        *self.by_severity.entry(issue.severity).or_default() += 1;
        *self.by_category.entry(issue.category).or_default() += 1;
        self.total += 1;
    }

    /// Count for one severity
    pub fn severity(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    /// Count for one category
    pub fn category(&self, category: Category) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }
}

/// Per-unit line in the aggregated summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub unit_id: String,
    pub status: UnitStatus,
    pub verdict: Option<Verdict>,
    pub issue_count: usize,
    pub summary: Option<String>,
    pub failure_reason: Option<String>,
}

impl From<&UnitOutcome> for UnitSummary {
    fn from(outcome: &UnitOutcome) -> Self {
        Self {
            unit_id: outcome.unit_id.clone(),
            status: outcome.status,
            verdict: outcome.verdict,
            issue_count: outcome.issues.len(),
            summary: outcome.summary.clone(),
            failure_reason: outcome.failure_reason.clone(),
        }
    }
}

/// One verdict for the whole change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub overall_verdict: Verdict,
    /// 0.0..=1.0
    pub confidence: f64,
    pub issue_counts: IssueCounts,
    /// Units not reviewed (skipped or failed)
    pub skipped_units: usize,
    /// Input order preserved
    pub per_unit_summary: Vec<UnitSummary>,
    /// Issues ordered by severity, then by unit order
    pub prioritized_issues: Vec<LocatedIssue>,
    /// Prose summary of the review
    pub narrative_text: String,
}

impl AggregatedResult {
    /// Number of units that produced a review
    pub fn reviewed_units(&self) -> usize {
        self.per_unit_summary
            .iter()
            .filter(|u| u.status == UnitStatus::Success)
            .count()
    }
}

/// Output ready for publishing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedOutput {
    pub primary_message: String,
    pub continuation_messages: Vec<String>,
    pub truncated: bool,
}

impl FormattedOutput {
    /// All messages in publishing order
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_message.as_str())
            .chain(self.continuation_messages.iter().map(String::as_str))
    }
}
