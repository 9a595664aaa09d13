use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;

use super::model::{ReviewPayload, ReviewUser, SearchPage};
use super::{ApiError, GithubApi, PrRef};

pub const FAKE_API_BASE: &str = "https://api.test";

/// Scripted `GithubApi` that records every call.
#[derive(Clone, Default)]
pub struct FakeApi {
    search: HashMap<String, Result<SearchPage, ApiError>>,
    reviews: HashMap<PrRef, Result<Vec<ReviewPayload>, ApiError>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeApi {
    pub fn with_search(mut self, url: impl Into<String>, page: SearchPage) -> Self {
        self.search.insert(url.into(), Ok(page));
        self
    }

    pub fn with_search_error(mut self, url: impl Into<String>, err: ApiError) -> Self {
        self.search.insert(url.into(), Err(err));
        self
    }

    pub fn with_reviews(mut self, pr: PrRef, reviews: Vec<ReviewPayload>) -> Self {
        self.reviews.insert(pr, Ok(reviews));
        self
    }

    pub fn with_reviews_error(mut self, pr: PrRef, err: ApiError) -> Self {
        self.reviews.insert(pr, Err(err));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl GithubApi for FakeApi {
    fn api_base(&self) -> &str {
        FAKE_API_BASE
    }

    fn search_page(&self, url: &str) -> Result<SearchPage, ApiError> {
        self.record(format!("search {url}"));
        self.search.get(url).cloned().unwrap_or_else(|| {
            Err(ApiError::Status {
                status: 404,
                message: "Not Found".into(),
            })
        })
    }

    fn list_reviews(&self, pr: &PrRef) -> Result<Vec<ReviewPayload>, ApiError> {
        self.record(format!("reviews {}/{}#{}", pr.owner, pr.repo, pr.number));
        self.reviews.get(pr).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn pr_ref(owner: &str, repo: &str, number: u64) -> PrRef {
    PrRef {
        owner: owner.into(),
        repo: repo.into(),
        number,
    }
}

pub fn pr_api_url(owner: &str, repo: &str, number: u64) -> String {
    format!("{FAKE_API_BASE}/repos/{owner}/{repo}/issues/{number}")
}

/// Search item shaped like the real API response.
pub fn search_item(owner: &str, repo: &str, number: u64, title: &str) -> serde_json::Value {
    json!({
        "number": number,
        "title": title,
        "state": "open",
        "html_url": format!("https://github.test/{owner}/{repo}/pull/{number}"),
        "url": pr_api_url(owner, repo, number),
        "repository_url": format!("{FAKE_API_BASE}/repos/{owner}/{repo}"),
        "user": {"login": "alice"},
        "labels": []
    })
}

pub fn review(login: &str, state: &str, submitted_at: Option<&str>) -> ReviewPayload {
    ReviewPayload {
        user: Some(ReviewUser {
            login: login.into(),
        }),
        state: state.into(),
        submitted_at: submitted_at.map(str::to_string),
    }
}
