use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::review::{ReviewEvent, ReviewState, ReviewVerdict};
use crate::repo::Cache;
use crate::repo::github::model::ReviewRecord;
use crate::repo::github::{ApiError, GithubApi, parse_pr_api_url};

#[derive(Debug, Error)]
enum ReviewFetchError {
    #[error("not a pull request API url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Keeps each reviewer's most recent verdict. Newer `submitted_at` wins; on a
/// tie the event later in the list wins. Undated events count as oldest.
pub fn latest_per_reviewer(
    events: impl IntoIterator<Item = ReviewEvent>,
) -> HashMap<String, ReviewVerdict> {
    let mut latest: HashMap<String, (Option<i64>, ReviewVerdict)> = HashMap::new();
    for event in events {
        let newer = latest
            .get(&event.reviewer)
            .is_none_or(|(seen_at, _)| event.submitted_at >= *seen_at);
        if newer {
            latest.insert(event.reviewer, (event.submitted_at, event.verdict));
        }
    }
    latest
        .into_iter()
        .map(|(reviewer, (_, verdict))| (reviewer, verdict))
        .collect()
}

pub fn classify(latest: &HashMap<String, ReviewVerdict>) -> ReviewState {
    let verdicts = || latest.values();
    if latest.is_empty() {
        ReviewState::ReviewRequired
    } else if verdicts().any(|v| *v == ReviewVerdict::ChangesRequested) {
        ReviewState::ChangesRequested
    } else if verdicts().all(|v| *v == ReviewVerdict::Approved) {
        ReviewState::AllApproved
    } else if verdicts().any(|v| *v == ReviewVerdict::Approved) {
        ReviewState::Approved
    } else {
        ReviewState::ReviewInProgress
    }
}

/// Review state of the PR behind `pr_api_url`. Failures are logged and
/// reported as `Unknown`, which is not cached.
pub fn review_state<A>(api: &A, cache: &mut dyn Cache<ReviewRecord>, pr_api_url: &str) -> ReviewState
where
    A: GithubApi + ?Sized,
{
    if let Some(record) = cache.get(pr_api_url) {
        debug!(pr = pr_api_url, state = %record.state, "review state served from cache");
        return record.state;
    }
    match fetch_review_state(api, pr_api_url) {
        Ok(state) => {
            cache.put(pr_api_url, ReviewRecord { state });
            state
        }
        Err(err) => {
            warn!(pr = pr_api_url, error = %err, "failed to get review state");
            ReviewState::Unknown
        }
    }
}

fn fetch_review_state<A>(api: &A, pr_api_url: &str) -> Result<ReviewState, ReviewFetchError>
where
    A: GithubApi + ?Sized,
{
    let pr = parse_pr_api_url(pr_api_url)
        .ok_or_else(|| ReviewFetchError::InvalidUrl(pr_api_url.to_string()))?;
    let events = api
        .list_reviews(&pr)?
        .into_iter()
        .filter_map(|payload| payload.into_event());
    Ok(classify(&latest_per_reviewer(events)))
}
