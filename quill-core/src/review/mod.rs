//! Review data model
//!
//! Requests and units are transient, held for one pipeline run. Outcomes,
//! aggregated results and formatted output are derived from them and
//! cached per `(target, revision)`.

pub mod notification;
pub mod outcome;
pub mod request;

pub use notification::{NotificationDecision, PullRequestEvent, ReviewNotification};
pub use outcome::{
    AggregatedResult, Category, FormattedOutput, IssueCounts, LocatedIssue, ReviewIssue,
    Severity, UnitOutcome, UnitStatus, UnitSummary, Verdict,
};
pub use request::{
    AnalysisUnit, ChangedUnit, ContentRef, ContextMetadata, ReviewRequest, TargetId,
    WHOLE_CHANGE_UNIT,
};
