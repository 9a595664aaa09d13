use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::domain::pull_request::PullRequest;
use crate::domain::review::{ReviewEvent, ReviewState, ReviewVerdict};

/// One page of search results as cached: the raw response body plus whether
/// the API advertised a next page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub data: serde_json::Value,
    #[serde(default)]
    pub has_next: bool,
}

impl SearchPage {
    pub fn new(items: Vec<serde_json::Value>, total_count: Option<u64>, has_next: bool) -> Self {
        Self {
            data: serde_json::json!({
                "total_count": total_count,
                "items": items,
            }),
            has_next,
        }
    }

    fn raw_items(&self) -> &[serde_json::Value] {
        self.data
            .get("items")
            .and_then(|items| items.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_items().is_empty()
    }

    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.raw_items()
            .iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(pr) => Some(pr),
                Err(err) => {
                    warn!(error = %err, "skipping undecodable search item");
                    None
                }
            })
            .collect()
    }
}

/// Cached review summary for one PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub state: ReviewState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewUser {
    pub login: String,
}

/// Element of `GET /repos/{owner}/{repo}/pulls/{number}/reviews`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPayload {
    pub user: Option<ReviewUser>,
    pub state: String,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

impl ReviewPayload {
    /// `None` for reviews left by deleted accounts.
    pub fn into_event(self) -> Option<ReviewEvent> {
        let reviewer = self.user?.login;
        let submitted_at = self
            .submitted_at
            .as_deref()
            .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
            .map(OffsetDateTime::unix_timestamp);
        Some(ReviewEvent {
            reviewer,
            verdict: ReviewVerdict::from(self.state.as_str()),
            submitted_at,
        })
    }
}
