//! Changed-file computation via git.
//!
//! The planning engine takes changed files as plain input; this is the
//! CLI-side collaborator that produces them from a ref range.

use std::path::Path;

use anyhow::{bail, Context};
use tokio::process::Command;

/// `git diff --name-only <base>..<head>` in the repository root
pub async fn changed_files(repo: &Path, base: &str, head: &str) -> anyhow::Result<Vec<String>> {
    let range = format!("{base}..{head}");
    let output = Command::new("git")
        .args(["diff", "--name-only", &range])
        .current_dir(repo)
        .output()
        .await
        .context("failed to run git diff")?;

    if !output.status.success() {
        bail!(
            "git diff {} failed: {}",
            range,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run_git(repo: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(repo)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .status()
            .await
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    #[tokio::test]
    async fn test_changed_files_between_commits() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path();

        run_git(repo, &["init", "-q", "-b", "main"]).await;
        std::fs::write(repo.join("intent.yaml"), "a: 1\n").unwrap();
        run_git(repo, &["add", "."]).await;
        run_git(repo, &["commit", "-q", "-m", "base"]).await;

        std::fs::create_dir_all(repo.join("terraform/vpc")).unwrap();
        std::fs::write(repo.join("terraform/vpc/main.tf"), "{}\n").unwrap();
        run_git(repo, &["add", "."]).await;
        run_git(repo, &["commit", "-q", "-m", "change"]).await;

        let files = changed_files(repo, "main~1", "main").await.unwrap();
        assert_eq!(files, vec!["terraform/vpc/main.tf"]);
    }

    #[tokio::test]
    async fn test_bad_ref_surfaces_git_error() {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init", "-q"]).await;
        let err = changed_files(dir.path(), "nope", "HEAD").await.unwrap_err();
        assert!(err.to_string().contains("git diff"));
    }
}
