use std::fmt;

use serde::{Deserialize, Serialize};

/// Summary of all reviewers' latest feedback on a PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    ReviewRequired,
    ChangesRequested,
    AllApproved,
    Approved,
    ReviewInProgress,
    Unknown,
}

impl ReviewState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewState::ReviewRequired => "REVIEW_REQUIRED",
            ReviewState::ChangesRequested => "CHANGES_REQUESTED",
            ReviewState::AllApproved => "ALL_APPROVED",
            ReviewState::Approved => "APPROVED",
            ReviewState::ReviewInProgress => "REVIEW_IN_PROGRESS",
            ReviewState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single submitted review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    Other(String),
}

impl From<&str> for ReviewVerdict {
    fn from(raw: &str) -> Self {
        match raw {
            "APPROVED" => ReviewVerdict::Approved,
            "CHANGES_REQUESTED" => ReviewVerdict::ChangesRequested,
            "COMMENTED" => ReviewVerdict::Commented,
            "DISMISSED" => ReviewVerdict::Dismissed,
            "PENDING" => ReviewVerdict::Pending,
            other => ReviewVerdict::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewEvent {
    pub reviewer: String,
    pub verdict: ReviewVerdict,
    pub submitted_at: Option<i64>,
}
