//! GitHub API proxy tools

use super::{optional_str, optional_u64, require_str};
use crate::config::GithubConfig;
use crate::error::{Error, Result};
use serde_json::{json, Value};

const DEFAULT_ISSUE_LIMIT: u64 = 20;

/// Longest upstream error body kept in our error message
const ERROR_BODY_LIMIT: usize = 200;

pub(super) async fn repo_info(
    http: &reqwest::Client,
    github: &GithubConfig,
    args: &Value,
) -> Result<Value> {
    let owner = path_segment(args, "owner")?;
    let repo = path_segment(args, "repo")?;

    let url = format!("{}/repos/{}/{}", github.api_base, owner, repo);
    let body = fetch_json(http, github, &url).await?;

    Ok(json!({
        "name": body["name"],
        "fullName": body["full_name"],
        "description": body["description"],
        "defaultBranch": body["default_branch"],
        "language": body["language"],
        "stars": body["stargazers_count"],
        "forks": body["forks_count"],
        "openIssues": body["open_issues_count"],
        "updatedAt": body["updated_at"],
    }))
}

pub(super) async fn issues_list(
    http: &reqwest::Client,
    github: &GithubConfig,
    args: &Value,
) -> Result<Value> {
    let owner = path_segment(args, "owner")?;
    let repo = path_segment(args, "repo")?;
    let state = optional_str(args, "state").unwrap_or("open");
    let limit = optional_u64(args, "limit").unwrap_or(DEFAULT_ISSUE_LIMIT);

    let url = format!(
        "{}/repos/{}/{}/issues?state={}&per_page={}",
        github.api_base, owner, repo, state, limit
    );
    let body = fetch_json(http, github, &url).await?;

    let issues: Vec<Value> = body
        .as_array()
        .map(|list| {
            list.iter()
                // The issues endpoint interleaves pull requests; drop them
                .filter(|issue| issue.get("pull_request").is_none())
                .map(|issue| {
                    json!({
                        "number": issue["number"],
                        "title": issue["title"],
                        "state": issue["state"],
                        "author": issue["user"]["login"],
                        "comments": issue["comments"],
                        "createdAt": issue["created_at"],
                        "updatedAt": issue["updated_at"],
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(json!({
        "owner": owner,
        "repo": repo,
        "state": state,
        "issues": issues,
        "count": issues.len(),
    }))
}

/// Read an argument destined for a URL path segment, rejecting anything
/// outside the GitHub owner/repo character set
fn path_segment<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    let value = require_str(args, name)?;
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(Error::InvalidArgument(format!(
            "Parameter '{}' contains characters not allowed in a repository name",
            name
        )));
    }
    Ok(value)
}

async fn fetch_json(http: &reqwest::Client, github: &GithubConfig, url: &str) -> Result<Value> {
    let mut request = http
        .get(url)
        .header("Accept", "application/vnd.github+json");
    if let Some(token) = &github.token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let mut message = response.text().await.unwrap_or_default();
        if message.len() > ERROR_BODY_LIMIT {
            let mut cut = ERROR_BODY_LIMIT;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        return Err(Error::Upstream {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json::<Value>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_segment_accepts_repo_names() {
        let args = json!({"owner": "rust-lang", "repo": "rust_fork.v2"});

        assert_eq!(path_segment(&args, "owner").unwrap(), "rust-lang");
        assert_eq!(path_segment(&args, "repo").unwrap(), "rust_fork.v2");
    }

    #[test]
    fn test_path_segment_rejects_traversal() {
        for bad in ["a/b", "a?x=1", "a b", "a#frag", ""] {
            let err = path_segment(&json!({"owner": bad}), "owner").unwrap_err();
            assert_eq!(err.status(), 400, "expected rejection for {:?}", bad);
        }
    }
}
