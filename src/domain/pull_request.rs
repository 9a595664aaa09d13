use serde::{Deserialize, Serialize};

use super::review::ReviewState;

/// Subset of a search result item that the viewer cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub title: String,
    pub html_url: String,
    /// API url of the pull request, used as its identity.
    pub url: String,
    pub repository_url: String,
}

impl PullRequest {
    /// Last path segment of `repository_url`.
    pub fn repo_name(&self) -> &str {
        self.repository_url.rsplit('/').next().unwrap_or_default()
    }

    /// Second-to-last path segment of `repository_url`.
    pub fn repo_owner(&self) -> &str {
        self.repository_url.rsplit('/').nth(1).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Title,
    State,
    Repo,
    Url,
}

impl Column {
    pub const ALL: [Column; 4] = [Column::Title, Column::State, Column::Repo, Column::Url];

    pub fn heading(self) -> &'static str {
        match self {
            Column::Title => "Title",
            Column::State => "State",
            Column::Repo => "Repo",
            Column::Url => "URL",
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }
}

/// One line of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRow {
    pub title: String,
    pub state: ReviewState,
    pub repo: String,
    pub url: String,
}

impl PrRow {
    pub fn new(pr: &PullRequest, state: ReviewState) -> Self {
        Self {
            title: pr.title.clone(),
            state,
            repo: pr.repo_name().to_string(),
            url: pr.html_url.clone(),
        }
    }

    pub fn value(&self, column: Column) -> &str {
        match column {
            Column::Title => &self.title,
            Column::State => self.state.as_str(),
            Column::Repo => &self.repo,
            Column::Url => &self.url,
        }
    }
}
