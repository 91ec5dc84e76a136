//! Keeping the documentation mirror current.
//!
//! Two implementations of [`SourceSync`]:
//!
//! - [`GitSync`] clones `source.repo_url` into `source.path` on first use and
//!   afterwards fetches and hard-resets to `origin/<branch>`.
//! - [`LocalSync`] treats `source.path` as an externally managed tree and
//!   only checks readiness.
//!
//! Failures are logged and reported as `false`; they never reach callers as
//! errors, so a failed update leaves the previous index in service.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::SourceConfig;
use crate::indexer::build_globset;

/// A readable, refreshable directory of documents.
pub trait SourceSync: Send + Sync {
    /// True when the documents directory holds at least one document.
    fn ensure_ready(&self) -> bool;

    /// Best-effort update of the mirror.
    fn refresh(&self) -> bool;

    fn docs_dir(&self) -> PathBuf;
}

/// Pick the implementation matching the configuration.
pub fn from_config(source: &SourceConfig) -> Box<dyn SourceSync> {
    match &source.repo_url {
        Some(url) => Box::new(GitSync::new(source, url.clone())),
        None => Box::new(LocalSync::new(source)),
    }
}

pub struct GitSync {
    url: String,
    branch: String,
    shallow: bool,
    checkout: PathBuf,
    docs_dir: PathBuf,
    include: Vec<String>,
}

impl GitSync {
    pub fn new(source: &SourceConfig, url: String) -> Self {
        Self {
            url,
            branch: source.branch.clone(),
            shallow: source.shallow,
            checkout: source.path.clone(),
            docs_dir: source.docs_path(),
            include: source.effective_include_globs(),
        }
    }

    /// Clone on first use, otherwise fetch and hard-reset to the remote branch.
    fn update(&self) -> Result<()> {
        if self.checkout.join(".git").exists() {
            info!(path = %self.checkout.display(), branch = %self.branch, "updating mirror");
            let remote = format!("origin/{}", self.branch);
            git(Some(&self.checkout), &["fetch", "origin", self.branch.as_str()])?;
            return git(Some(&self.checkout), &["reset", "--hard", remote.as_str()]);
        }

        info!(url = %self.url, path = %self.checkout.display(), "cloning mirror");
        if let Some(parent) = self.checkout.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let dest = self.checkout.to_string_lossy().into_owned();
        let mut args = vec!["clone", "--branch", self.branch.as_str(), "--single-branch"];
        if self.shallow {
            args.extend(["--depth", "1"]);
        }
        args.extend([self.url.as_str(), dest.as_str()]);
        git(None, &args)
    }
}

impl SourceSync for GitSync {
    fn ensure_ready(&self) -> bool {
        if has_documents(&self.docs_dir, &self.include) {
            return true;
        }
        if self.checkout.join(".git").exists() {
            warn!(path = %self.docs_dir.display(), "mirror has no documents");
            return false;
        }
        self.refresh() && has_documents(&self.docs_dir, &self.include)
    }

    fn refresh(&self) -> bool {
        match self.update() {
            Ok(()) => true,
            Err(err) => {
                error!(error = %format!("{:#}", err), "source update failed");
                false
            }
        }
    }

    fn docs_dir(&self) -> PathBuf {
        self.docs_dir.clone()
    }
}

pub struct LocalSync {
    docs_dir: PathBuf,
    include: Vec<String>,
}

impl LocalSync {
    pub fn new(source: &SourceConfig) -> Self {
        Self {
            docs_dir: source.docs_path(),
            include: source.effective_include_globs(),
        }
    }
}

impl SourceSync for LocalSync {
    fn ensure_ready(&self) -> bool {
        has_documents(&self.docs_dir, &self.include)
    }

    fn refresh(&self) -> bool {
        let exists = self.docs_dir.is_dir();
        if !exists {
            error!(path = %self.docs_dir.display(), "documents directory does not exist");
        }
        exists
    }

    fn docs_dir(&self) -> PathBuf {
        self.docs_dir.clone()
    }
}

fn has_documents(dir: &Path, include: &[String]) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let include = match build_globset(include) {
        Ok(set) => set,
        Err(err) => {
            error!(error = %err, "invalid include glob");
            return false;
        }
    };

    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .any(|e| {
            let relative = e.path().strip_prefix(dir).unwrap_or(e.path());
            include.is_match(relative)
        })
}

/// Run `git <args>`, in `dir` when given, failing with git's stderr.
fn git(dir: Option<&Path>, args: &[&str]) -> Result<()> {
    let subcommand = args.first().copied().unwrap_or("git");
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let output = cmd
        .output()
        .with_context(|| format!("Failed to run 'git {}'. Is git installed?", subcommand))?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            subcommand,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
