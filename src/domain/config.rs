use std::fmt;

use serde::{Deserialize, Serialize};

/// User settings persisted between runs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub show_others_only: bool,
}

impl Config {
    pub fn with_token(token: Option<String>) -> Self {
        Self {
            token: token.unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn filter_label(&self) -> &'static str {
        if self.show_others_only {
            "others' repos"
        } else {
            "my repos"
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .field("show_others_only", &self.show_others_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_token() {
        let cfg = Config {
            username: "alice".into(),
            token: "ghp_secret".into(),
            show_others_only: false,
        };
        let out = format!("{cfg:?}");
        assert!(out.contains("alice"));
        assert!(!out.contains("ghp_secret"));
    }

    #[test]
    fn missing_fields_default() {
        let cfg: Config = serde_json::from_str(r#"{"username":"bob"}"#).unwrap();
        assert_eq!(cfg.username, "bob");
        assert!(cfg.token.is_empty());
        assert!(!cfg.show_others_only);
    }
}
