//! Application service: Caddy route for an environment.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::application::ports::{Cmd, CommandRunner, LocalFs, ProgressReporter};
use crate::domain::outcome::StepOutcome;
use crate::domain::proxy::{caddyfile_candidates, render_snippet, snippet_path};

/// Where snippets live and which Caddyfile to reload.
pub struct ProxyTarget<'a> {
    pub snippets_dir: &'a Path,
    pub caddyfile: Option<&'a Path>,
}

/// Write (or overwrite) the snippet routing `host` to `port`, then reload.
///
/// # Errors
///
/// Returns an error if the snippet cannot be written, no Caddyfile is found,
/// or `caddy reload` fails.
#[allow(clippy::too_many_arguments)]
pub async fn configure(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    target: &ProxyTarget<'_>,
    project_key: &str,
    slug: &str,
    host: &str,
    port: u16,
) -> Result<PathBuf> {
    let path = snippet_path(target.snippets_dir, project_key, slug);
    let content = render_snippet(project_key, slug, host, port);
    if runner.dry_run() {
        reporter.step(&format!("[dry-run] would write {}", path.display()));
    } else {
        fs.create_dir_all(target.snippets_dir)?;
        fs.write(&path, &content)?;
        reporter.step(&format!("wrote caddy snippet {}", path.display()));
    }
    reload(runner, fs, target.caddyfile).await?;
    Ok(path)
}

/// Delete the snippet if present and reload. A failed reload is a warning.
///
/// # Errors
///
/// Returns an error if the snippet exists but cannot be deleted.
pub async fn unconfigure(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    target: &ProxyTarget<'_>,
    project_key: &str,
    slug: &str,
) -> Result<StepOutcome> {
    let path = snippet_path(target.snippets_dir, project_key, slug);
    if fs.exists(&path) {
        reporter.step(&format!("removing caddy snippet {}", path.display()));
        if !runner.dry_run() {
            fs.remove_file(&path)?;
        }
    }
    match reload(runner, fs, target.caddyfile).await {
        Ok(()) => Ok(StepOutcome::Completed),
        Err(e) => {
            tracing::warn!(error = %e, "caddy reload failed");
            Ok(StepOutcome::Warned(vec![format!("caddy reload failed: {e:#}")]))
        }
    }
}

/// First existing Caddyfile among the configured path and the well-known
/// locations.
///
/// # Errors
///
/// Returns an error naming every candidate when none exists.
pub fn find_caddyfile(fs: &impl LocalFs, configured: Option<&Path>) -> Result<PathBuf> {
    let candidates = caddyfile_candidates(configured);
    if let Some(found) = candidates.iter().find(|p| fs.exists(p)) {
        return Ok(found.clone());
    }
    let tried = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    anyhow::bail!("Could not find Caddyfile. Tried: {tried}")
}

/// `caddy reload --config <Caddyfile>`.
///
/// # Errors
///
/// Returns an error if no Caddyfile is found or the reload fails.
pub async fn reload(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    configured: Option<&Path>,
) -> Result<()> {
    let caddyfile = find_caddyfile(fs, configured)?;
    let cmd = Cmd::new("caddy")
        .args(["reload", "--config"])
        .arg(caddyfile.to_string_lossy());
    runner.run(&cmd).await?;
    tracing::info!(caddyfile = %caddyfile.display(), "caddy reloaded");
    Ok(())
}
