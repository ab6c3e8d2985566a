//! Merging unit outcomes into one verdict
//!
//! Verdict precedence:
//! 1. any blocking issue (critical severity or security category) in a
//!    successful unit: `RequestChanges`
//! 2. at least one unit reviewed, every reviewed unit approved, and the
//!    skipped fraction within tolerance: `Approve`
//! 3. otherwise `Comment`

use crate::review::{
    AggregatedResult, IssueCounts, LocatedIssue, UnitOutcome, UnitSummary, Verdict,
};

/// Weight of issue density in the confidence score
const DENSITY_WEIGHT: f64 = 0.25;

/// Pure, deterministic aggregation of unit outcomes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregator {
    skip_tolerance: f64,
}

impl Aggregator {
    /// `skip_tolerance` is the largest skipped fraction that still allows `Approve`
    pub fn new(skip_tolerance: f64) -> Self {
        Self {
            skip_tolerance: skip_tolerance.clamp(0.0, 1.0),
        }
    }

    pub fn aggregate(&self, outcomes: &[UnitOutcome]) -> AggregatedResult {
        let total = outcomes.len();
        let successes: Vec<&UnitOutcome> = outcomes.iter().filter(|o| o.is_success()).collect();
        let reviewed = successes.len();
        let skipped_units = total - reviewed;

        let mut issue_counts = IssueCounts::default();
        let mut prioritized_issues = Vec::new();
        for outcome in &successes {
            for issue in &outcome.issues {
                issue_counts.record(issue);
                prioritized_issues.push(LocatedIssue {
                    unit_id: outcome.unit_id.clone(),
                    issue: issue.clone(),
                });
            }
        }
        // stable: unit order is kept within a rank
        prioritized_issues.sort_by_key(|l| (!l.issue.is_blocking(), l.issue.severity));

        let blocking = prioritized_issues
            .iter()
            .filter(|l| l.issue.is_blocking())
            .count();

        let skip_ratio = if total == 0 {
            0.0
        } else {
            skipped_units as f64 / total as f64
        };

        let overall_verdict = if blocking > 0 {
            Verdict::RequestChanges
        } else if reviewed > 0
            && successes.iter().all(|o| o.verdict == Some(Verdict::Approve))
            && skip_ratio <= self.skip_tolerance
        {
            Verdict::Approve
        } else {
            Verdict::Comment
        };

        let confidence = confidence(total, reviewed, issue_counts.total);
        let narrative_text = narrative(overall_verdict, total, reviewed, blocking, &successes);

        AggregatedResult {
            overall_verdict,
            confidence,
            issue_counts,
            skipped_units,
            per_unit_summary: outcomes.iter().map(UnitSummary::from).collect(),
            prioritized_issues,
            narrative_text,
        }
    }
}

/// Coverage scaled down by issue density
///
/// Adding skipped units never raises the score.
fn confidence(total: usize, reviewed: usize, issues: usize) -> f64 {
    if total == 0 || reviewed == 0 {
        return 0.0;
    }
    let coverage = reviewed as f64 / total as f64;
    let density = issues as f64 / reviewed as f64;
    coverage / (1.0 + density * DENSITY_WEIGHT)
}

fn narrative(
    verdict: Verdict,
    total: usize,
    reviewed: usize,
    blocking: usize,
    successes: &[&UnitOutcome],
) -> String {
    if total == 0 {
        return "No reviewable changes were found.".to_string();
    }

    let mut text = if total == 1 {
        String::new()
    } else {
        format!("Reviewed {} of {} files. ", reviewed, total)
    };

    match verdict {
        Verdict::RequestChanges => text.push_str(&format!(
            "Found {} blocking issue{} that should be addressed before merging.",
            blocking,
            if blocking == 1 { "" } else { "s" }
        )),
        Verdict::Approve => text.push_str("No blocking issues found."),
        Verdict::Comment if reviewed == 0 => {
            text.push_str("None of the changes could be reviewed.")
        }
        Verdict::Comment => {
            text.push_str("No blocking issues found, but some points need attention.")
        }
    }

    if let [only] = successes {
        if let Some(summary) = only.summary.as_deref() {
            text.push_str("\n\n");
            text.push_str(summary.trim());
        }
    }

    text
}
