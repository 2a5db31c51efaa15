//! Daemon configuration
//!
//! Command-line flags with environment fallbacks. The GitHub mirror target is
//! fixed.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;

use crate::origin::RepoTarget;

/// Repository images are mirrored into
pub const GITHUB_REPO: &str = "fasthoster/test";
pub const GITHUB_BRANCH: &str = "main";
pub const GITHUB_FOLDER: &str = "up";

/// Default local image cache
pub const DEFAULT_CACHE_DIR: &str = "/tmp/uploads";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "student-registry",
    version,
    about = "Student records API with a GitHub-mirrored local image cache"
)]
pub struct Config {
    /// SQLite database path, `sqlite://` URL, or `sqlite::memory:`
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// GitHub token used to commit uploaded images
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Directory for cached images
    #[arg(long, env = "CACHE_DIR", default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Skip pulling missing images from GitHub at startup
    #[arg(long)]
    pub skip_reconcile: bool,
}

impl Config {
    /// Database connection string, defaulting to the platform data directory
    pub fn database_url(&self) -> Result<String> {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(url.to_string());
        }

        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir
            .join("student-registry")
            .join("students.db")
            .to_string_lossy()
            .into_owned())
    }

    /// Token, ignoring an empty value
    pub fn github_token(&self) -> Option<&str> {
        self.github_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn repo_target(&self) -> RepoTarget {
        RepoTarget {
            repo: GITHUB_REPO.to_string(),
            branch: GITHUB_BRANCH.to_string(),
            folder: GITHUB_FOLDER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_flags() {
        let config = Config::try_parse_from([
            "student-registry",
            "--database-url",
            "sqlite::memory:",
            "--github-token",
            "ghp_x",
            "--bind",
            "0.0.0.0:8080",
            "--cache-dir",
            "/var/cache/students",
            "--skip-reconcile",
        ])
        .unwrap();

        assert_eq!(config.database_url().unwrap(), "sqlite::memory:");
        assert_eq!(config.github_token(), Some("ghp_x"));
        assert_eq!(config.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/students"));
        assert!(config.skip_reconcile);
    }

    #[test]
    fn test_repo_target_is_fixed() {
        let config = Config::try_parse_from(["student-registry", "--github-token", ""]).unwrap();
        let target = config.repo_target();
        assert_eq!(target.repo, "fasthoster/test");
        assert_eq!(target.branch, "main");
        assert_eq!(target.folder, "up");
        assert_eq!(config.github_token(), None);
    }
}
