//! `remove`: tear down in reverse dependency order.

use anyhow::Result;

use super::{RemoveOptions, RemoveSummary, Workflow, step};
use crate::application::ports::{CommandRunner, LocalFs, PortRegistry, ProgressReporter};
use crate::application::services::{database, proxy, session, worktree};

impl<R, G, F, P> Workflow<'_, R, G, F, P>
where
    R: CommandRunner,
    G: PortRegistry,
    F: LocalFs,
    P: ProgressReporter,
{
    /// Tear down the environment under `slug`. Every step is a no-op when its
    /// resource is already gone.
    ///
    /// # Errors
    ///
    /// Returns the first failing step with its name as context. A failed
    /// proxy reload is only a warning.
    pub async fn remove(&self, slug: &str, opts: &RemoveOptions) -> Result<RemoveSummary> {
        let names = self.names(slug);
        let reporter = self.reporter;
        let mut summary = RemoveSummary {
            project: names.project_key.clone(),
            slug: names.slug.clone(),
            ..RemoveSummary::default()
        };

        if self.config.session_enabled {
            summary.session_killed = step(
                reporter,
                "session",
                session::kill(self.runner, reporter, &names.session),
            )
            .await?;
        }

        if self.config.proxy_enabled {
            let outcome = step(
                reporter,
                "proxy",
                proxy::unconfigure(
                    self.runner,
                    self.fs,
                    reporter,
                    &self.proxy_target(),
                    &names.project_key,
                    &names.slug,
                ),
            )
            .await?;
            summary.warnings.extend_from_slice(outcome.warnings());
        }

        summary.worktree_removed = step(
            reporter,
            "worktree removal",
            worktree::remove(self.runner, self.fs, &self.config.repo_dir, &names.worktree),
        )
        .await?;
        if summary.worktree_removed {
            reporter.success(&format!("removed worktree {}", names.worktree.display()));
        }

        if opts.keep_db {
            reporter.step("keeping databases (--keep-db)");
        } else {
            for db in [&names.dev_db, &names.test_db] {
                let dropped = step(
                    reporter,
                    "database drop",
                    database::drop_if_exists(self.runner, reporter, db),
                )
                .await?;
                if dropped {
                    summary.databases_dropped.push(db.clone());
                }
            }
        }

        summary.port_released = step(reporter, "port release", self.registry.remove(&names.key)).await?;
        if let Some(port) = summary.port_released {
            reporter.success(&format!("released port {port}"));
        }

        for warning in &summary.warnings {
            reporter.warn(warning);
        }
        tracing::info!(key = %names.key, "environment removed");
        Ok(summary)
    }
}
