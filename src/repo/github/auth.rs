use std::process::Command;

use tracing::debug;

const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Trimmed token, or `None` when nothing is left.
fn usable(raw: &str) -> Option<String> {
    let token = raw.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn env_token() -> Option<String> {
    let raw = std::env::var(TOKEN_ENV).ok()?;
    let token = usable(&raw);
    if token.is_none() {
        debug!(var = TOKEN_ENV, "ignoring blank token variable");
    }
    token
}

/// Asks the GitHub CLI for its stored token, scoped to `GH_HOST` when set.
fn gh_cli_token() -> Option<String> {
    let mut cmd = Command::new("gh");
    cmd.args(["auth", "token"]);
    if let Some(host) = std::env::var("GH_HOST").ok().as_deref().and_then(usable) {
        cmd.args(["--hostname", host.as_str()]);
    }

    let output = match cmd.output() {
        Ok(output) => output,
        Err(err) => {
            debug!(error = %err, "gh cli not available");
            return None;
        }
    };
    if !output.status.success() {
        debug!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "gh cli has no token"
        );
        return None;
    }
    usable(&String::from_utf8_lossy(&output.stdout))
}

/// Token for a fresh install: `GITHUB_TOKEN`, then `gh auth token`.
pub fn resolve_fallback_token() -> Option<String> {
    env_token().or_else(gh_cli_token)
}
