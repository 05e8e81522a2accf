// ABOUTME: Event payloads for pushes and pull requests, and the git checkouts they need.
// ABOUTME: A pull request is merged locally into its base; a conflict means there is nothing to deploy.

use serde::Deserialize;

use crate::exec::Result;
use crate::github::Author;
use crate::shell::LoggingShell;

#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub before: String,
    pub head: String,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushCommit {
    pub author: Author,
}

impl PushPayload {
    pub fn authors(&self) -> Vec<Author> {
        self.commits.iter().map(|c| c.author.clone()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    pub action: String,
    pub pull_request: PullRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head: BranchRef,
    pub base: BranchRef,
    pub commits_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
    #[serde(default)]
    pub repo: Option<Repo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repo {
    #[serde(default)]
    pub fork: bool,
    pub ssh_url: String,
}

/// Clone into the shell's directory and check out the pushed head.
pub async fn checkout_push(shell: &LoggingShell, repo_url: &str, push: &PushPayload) -> Result<()> {
    shell.run(&format!("git clone {repo_url} .")).await?;
    shell.run(&format!("git checkout {}", push.head)).await?;
    Ok(())
}

/// Clone the base branch and merge the proposal into it.
///
/// Returns the merge commit, or `None` when the merge fails.
pub async fn merge_pull_request(
    shell: &LoggingShell,
    repo_url: &str,
    pr: &PullRequest,
) -> Result<Option<String>> {
    shell
        .run(&format!("git clone -b {} {repo_url} .", pr.base.git_ref))
        .await?;

    let merge = match &pr.head.repo {
        Some(repo) if repo.fork => format!(
            "git pull --no-edit --no-ff {} {}",
            repo.ssh_url, pr.head.git_ref
        ),
        _ => format!("git merge --no-edit --no-ff origin/{}", pr.head.git_ref),
    };
    if let Err(e) = shell.run(&merge).await {
        tracing::warn!(pr = pr.number, "merge failed: {}", e);
        return Ok(None);
    }

    Ok(Some(shell.run("git rev-parse HEAD").await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_payload_lists_authors() {
        let payload = json!({
            "ref": "refs/heads/production",
            "before": "aaa",
            "head": "bbb",
            "size": 2,
            "commits": [
                {"sha": "1", "author": {"name": "Ada", "email": "ada@example.com"}},
                {"sha": "2", "author": {"name": "Bob", "email": "bob@example.com"}}
            ]
        });
        let push: PushPayload = serde_json::from_value(payload).unwrap();
        assert_eq!(push.git_ref, "refs/heads/production");
        assert_eq!(push.authors().len(), 2);
        assert_eq!(push.authors()[1].email, "bob@example.com");
    }

    #[test]
    fn pull_request_from_deleted_fork_has_no_repo() {
        let payload = json!({
            "action": "opened",
            "pull_request": {
                "number": 7,
                "commits_url": "https://ghe/api/v3/repos/o/r/pulls/7/commits",
                "head": {"ref": "feature", "sha": "ccc", "repo": null},
                "base": {"ref": "staging", "sha": "ddd", "repo": {"fork": false, "ssh_url": "git@ghe:o/r.git"}}
            }
        });
        let pr: PullRequestPayload = serde_json::from_value(payload).unwrap();
        assert!(pr.pull_request.head.repo.is_none());
        assert_eq!(pr.pull_request.base.git_ref, "staging");
    }
}
