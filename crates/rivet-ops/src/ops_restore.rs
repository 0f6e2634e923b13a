//! Operation: restore the project and write `rivet.lock.json`.

use std::path::{Path, PathBuf};

use rivet_core::lockfile::{LockFile, LOCK_FILE};
use rivet_util::errors::RivetError;
use rivet_util::progress::{spinner, status, status_error, status_info, status_warn};

use crate::project::Project;

/// Options for `rivet restore`.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Restore even when the lock file is up to date.
    pub force: bool,
    /// RIDs added to the manifest's runtimes.
    pub runtimes: Vec<String>,
    /// Extra feed directories, searched after the configured ones.
    pub sources: Vec<PathBuf>,
    /// Print the conflict report and every recorded failure.
    pub verbose: bool,
}

/// What a restore did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStatus {
    /// The lock file already matched the project; nothing was resolved.
    UpToDate,
    Restored,
}

/// Restore the project at `project_root`.
pub async fn restore(project_root: &Path, opts: &RestoreOptions) -> miette::Result<RestoreStatus> {
    let project = Project::load(project_root, &opts.runtimes, &opts.sources)?;
    restore_project(&project, opts).await
}

/// Restore an already loaded project.
///
/// A failed restore still writes the lock file, without a fingerprint, so the
/// next run resolves again.
pub async fn restore_project(project: &Project, opts: &RestoreOptions) -> miette::Result<RestoreStatus> {
    let lock_path = project.root.join(LOCK_FILE);
    let fingerprint = project.fingerprint();

    if !opts.force && is_up_to_date(&lock_path, &fingerprint) {
        status_info("Up to date", &lock_path.display().to_string());
        return Ok(RestoreStatus::UpToDate);
    }

    let request = &project.request;
    status(
        "Restoring",
        &format!(
            "{} ({} framework(s), {} runtime(s))",
            request.project,
            request.frameworks.len(),
            request.runtimes.len()
        ),
    );

    let sp = spinner("Resolving dependencies...");
    let result = project.resolve().await;
    sp.finish_and_clear();
    let result = result?;

    for failure in &result.failures {
        let fatal = failure.is_fatal(project.config.restore.conflict_policy);
        if fatal {
            status_error("Error", &failure.to_string());
        } else if opts.verbose {
            status_warn("Warning", &failure.to_string());
        }
    }
    if !result.conflicts.is_empty() && opts.verbose {
        eprint!("{}", result.conflicts);
    }

    let mut lock_file = result.lock_file;
    lock_file.restore_fingerprint = result.success.then_some(fingerprint);
    lock_file.write_to(&lock_path)?;

    if !result.success {
        let failed = result
            .graphs
            .iter()
            .filter(|g| !g.is_success(project.config.restore.conflict_policy))
            .map(|g| g.name())
            .collect::<Vec<_>>();
        return Err(RivetError::Resolution {
            message: format!(
                "restore of {} failed for {}",
                request.project,
                failed.join(", ")
            ),
        }
        .into());
    }

    status(
        "Resolved",
        &format!(
            "{} package(s) for {} target(s)",
            lock_file.libraries.len(),
            lock_file.targets.len()
        ),
    );
    if !opts.verbose && !result.failures.is_empty() {
        status_warn(
            "Warning",
            &format!("{} issue(s) recorded, run with --verbose for details", result.failures.len()),
        );
    }
    Ok(RestoreStatus::Restored)
}

fn is_up_to_date(lock_path: &Path, fingerprint: &str) -> bool {
    if !lock_path.is_file() {
        return false;
    }
    match LockFile::from_path(lock_path) {
        Ok(lock) => lock.restore_fingerprint.as_deref() == Some(fingerprint),
        Err(e) => {
            tracing::debug!("Ignoring unreadable lock file: {e}");
            false
        }
    }
}
