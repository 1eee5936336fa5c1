//! `create`: allocate, provision in parallel, then install and start.

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{CreateOptions, CreateSummary, Workflow, step};
use crate::application::ports::{CommandRunner, LocalFs, PortRegistry, ProgressReporter};
use crate::application::services::database::{self, PrepareContext};
use crate::application::services::{dependencies, environment, proxy, session, worktree};
use crate::domain::error::{ProvisionError, Subsystem, TaskFailure};
use crate::domain::naming::EnvNames;
use crate::domain::outcome::StepOutcome;

/// Result of the sequential local steps that run alongside group A.
struct LocalSetup {
    env_file: Option<PathBuf>,
    outcome: StepOutcome,
}

impl<R, G, F, P> Workflow<'_, R, G, F, P>
where
    R: CommandRunner,
    G: PortRegistry,
    F: LocalFs,
    P: ProgressReporter,
{
    /// Provision the environment for `branch` under `slug`.
    ///
    /// Nothing is rolled back on failure; re-running converges because every
    /// step is idempotent.
    ///
    /// # Errors
    ///
    /// Returns the first failing sequential step (with its name as context),
    /// or [`ProvisionError::Aggregated`] when proxy or database provisioning
    /// failed.
    pub async fn create(
        &self,
        branch: &str,
        slug: &str,
        opts: &CreateOptions,
    ) -> Result<CreateSummary> {
        let names = self.names(slug);
        let reporter = self.reporter;

        let port = step(reporter, "port allocation", self.allocate_port(&names.key, opts.port)).await?;
        reporter.success(&format!("port {port} bound to {}", names.key));

        let proxy_on = self.config.proxy_enabled && !opts.no_proxy;
        let database_on = !opts.no_db;

        let (proxy_result, database_result, local_result) = tokio::join!(
            self.provision_proxy(proxy_on, &names, port),
            self.provision_databases(database_on, &names),
            self.setup_local(branch, &names, port),
        );

        let failures: Vec<TaskFailure> = [
            (Subsystem::Proxy, proxy_result),
            (Subsystem::Database, database_result),
        ]
        .into_iter()
        .filter_map(|(subsystem, result)| {
            result.err().map(|e| TaskFailure {
                subsystem,
                message: format!("{e:#}"),
            })
        })
        .collect();

        let local = match local_result {
            Ok(local) => local,
            Err(e) => {
                for failure in &failures {
                    tracing::warn!(%failure, "background task failed");
                    reporter.warn(&failure.to_string());
                }
                return Err(e);
            }
        };
        if !failures.is_empty() {
            return Err(ProvisionError::Aggregated { failures }.into());
        }
        let warnings = local.outcome.warnings().to_vec();

        if opts.no_deps {
            reporter.step("skipping dependencies (--no-deps)");
        } else {
            step(
                reporter,
                "dependency installation",
                self.install_dependencies(&names, local.env_file.as_deref()),
            )
            .await?;
        }

        if database_on {
            step(reporter, "database preparation", self.prepare_databases(&names)).await?;
        }

        if !self.config.post_create_commands.is_empty() {
            step(
                reporter,
                "post-create commands",
                dependencies::run_post_create(
                    self.runner,
                    self.fs,
                    reporter,
                    self.runtime.as_ref(),
                    &names.worktree,
                    self.config,
                ),
            )
            .await?;
        }

        let session_on = self.config.session_enabled && !opts.no_session;
        if session_on {
            step(
                reporter,
                "session",
                session::create(
                    self.runner,
                    reporter,
                    &names.session,
                    &names.worktree,
                    &self.inherited_vars,
                ),
            )
            .await?;
        }

        for warning in &warnings {
            reporter.warn(warning);
        }
        tracing::info!(key = %names.key, port, "environment ready");

        Ok(CreateSummary {
            project: names.project_key.clone(),
            branch: branch.to_string(),
            slug: names.slug.clone(),
            port,
            host: names.host.clone(),
            worktree: names.worktree.clone(),
            dev_db: names.dev_db.clone(),
            test_db: names.test_db.clone(),
            proxy: proxy_on,
            database: database_on,
            session: session_on.then(|| names.session.clone()),
            use_envrc: self.config.use_envrc,
            warnings,
        })
    }

    async fn allocate_port(&self, key: &str, explicit: Option<u16>) -> Result<u16> {
        match explicit {
            Some(port) => self.registry.register(key, port).await,
            None => {
                self.registry
                    .allocate(key, self.config.port_range.clone())
                    .await
            }
        }
    }

    async fn provision_proxy(&self, enabled: bool, names: &EnvNames, port: u16) -> Result<()> {
        if !enabled {
            self.reporter.step("skipping proxy");
            return Ok(());
        }
        self.reporter.step(&format!("routing {} -> 127.0.0.1:{port}", names.host));
        proxy::configure(
            self.runner,
            self.fs,
            self.reporter,
            &self.proxy_target(),
            &names.project_key,
            &names.slug,
            &names.host,
            port,
        )
        .await?;
        Ok(())
    }

    async fn provision_databases(&self, enabled: bool, names: &EnvNames) -> Result<()> {
        if !enabled {
            self.reporter.step("skipping databases (--no-db)");
            return Ok(());
        }
        database::create_if_missing(self.runner, self.reporter, &names.dev_db).await?;
        database::create_if_missing(self.runner, self.reporter, &names.test_db).await?;
        Ok(())
    }

    async fn setup_local(&self, branch: &str, names: &EnvNames, port: u16) -> Result<LocalSetup> {
        let reporter = self.reporter;
        let dry_run = self.runner.dry_run();

        let mut outcome = step(
            reporter,
            "worktree setup",
            worktree::setup(
                self.runner,
                self.fs,
                reporter,
                &self.config.repo_dir,
                &names.worktree,
                branch,
            ),
        )
        .await?;

        let (env_file, env_outcome) = step(
            reporter,
            "environment files",
            environment::write_env_files(self.runner, self.fs, reporter, self.config, names, port),
        )
        .await?;
        outcome = outcome.and(env_outcome);

        if let Some(source) = &self.config.copy_files_dir {
            step(reporter, "copy files", async {
                environment::copy_files(self.fs, reporter, dry_run, source, &names.worktree)
            })
            .await?;
        }

        if !self.config.symlinks.is_empty() {
            step(reporter, "symlinks", async {
                environment::create_symlinks(
                    self.fs,
                    reporter,
                    dry_run,
                    &self.config.symlinks,
                    &names.worktree,
                )
            })
            .await?;
        }

        Ok(LocalSetup { env_file, outcome })
    }

    async fn install_dependencies(
        &self,
        names: &EnvNames,
        env_file: Option<&Path>,
    ) -> Result<()> {
        let runtime = self.runtime.as_ref();
        let worktree = &names.worktree;
        dependencies::install_runtime(
            self.runner,
            self.fs,
            self.reporter,
            runtime,
            worktree,
            &self.config.runtime_version_file,
        )
        .await?;
        dependencies::install_packages(
            self.runner,
            self.fs,
            self.reporter,
            runtime,
            worktree,
            self.config,
        )
        .await?;
        dependencies::install_js(
            self.runner,
            self.fs,
            self.reporter,
            self.config,
            worktree,
            env_file,
            &self.nvm_dir,
        )
        .await?;
        dependencies::build_js(self.runner, self.fs, self.config, worktree, env_file).await
    }

    async fn prepare_databases(&self, names: &EnvNames) -> Result<()> {
        let ctx = PrepareContext {
            worktree: &names.worktree,
            base_env_file: &self.config.base_env_file,
            runtime: self.runtime.as_ref(),
            version_file: &self.config.runtime_version_file,
        };
        let prepare = &self.config.db_prepare_cmd;
        database::prepare(self.runner, self.fs, self.reporter, &ctx, prepare, None).await?;
        database::prepare(self.runner, self.fs, self.reporter, &ctx, prepare, Some("test")).await?;
        if let Some(seed) = &self.config.db_seed_cmd {
            database::prepare(self.runner, self.fs, self.reporter, &ctx, seed, None).await?;
        }
        if let Some(setup) = &self.config.parallel_test_setup_cmd {
            database::prepare(self.runner, self.fs, self.reporter, &ctx, setup, Some("test"))
                .await?;
        }
        Ok(())
    }
}
