//! Human-readable terminal renderer.

use console::{measure_text_width, pad_str, Alignment};
use owo_colors::OwoColorize as _;

use crate::application::services::setup::{BaseEnvState, SetupReport};
use crate::application::services::status::{EnvStatus, ListRow, WorktreePresence};
use crate::application::services::workflow::{CreateSummary, RemoveSummary};
use crate::output::OutputContext;

/// Renders service results as human-readable terminal output using
/// `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Banner printed before `create` starts.
    pub fn render_create_plan(&self, project: &str, branch: &str, slug: &str, dry_run: bool) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.header("Creating environment");
        self.ctx.kv("Project:", project);
        self.ctx.kv("Branch:", branch);
        self.ctx.kv("Slug:", slug);
        if dry_run {
            self.ctx.kv("Dry run:", "yes, nothing will be changed");
        }
        println!();
    }

    pub fn render_create(&self, summary: &CreateSummary) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.header("Ready for development!");
        self.ctx.kv("Branch:", &summary.branch);
        self.ctx.kv("Worktree:", &summary.worktree.display().to_string());
        let url = if summary.proxy {
            format!("http://{}", summary.host)
        } else {
            format!("http://localhost:{}", summary.port)
        };
        self.ctx.kv("URL:", &url);
        self.ctx.kv("Port:", &summary.port.to_string());
        if summary.database {
            self.ctx.kv("Dev DB:", &summary.dev_db);
            self.ctx.kv("Test DB:", &summary.test_db);
        }
        println!();
        println!("  {}", "Commands:".style(self.ctx.styles.bold));
        println!("    cd {}", summary.worktree.display());
        if summary.use_envrc {
            println!("    direnv allow");
        }
        if let Some(session) = &summary.session {
            println!("    tmux attach -t {session}");
        }
        println!();
    }

    pub fn render_remove(&self, summary: &RemoveSummary) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx
            .success(&format!("Environment removed: {}/{}", summary.project, summary.slug));
    }

    /// Render registered environments as a table.
    pub fn render_list(&self, rows: &[ListRow]) {
        if rows.is_empty() {
            if !self.ctx.quiet {
                println!("No environments found.");
            }
            return;
        }

        let header = ["Project", "Slug", "Port", "Worktree", "Session"].map(str::to_string);
        let cells: Vec<[String; 5]> = rows
            .iter()
            .map(|row| {
                [
                    row.project.clone(),
                    row.slug.clone(),
                    row.port.to_string(),
                    self.presence(row.worktree),
                    row.session.clone().unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();

        let mut widths = header.clone().map(|h| measure_text_width(&h));
        for line in &cells {
            for (width, cell) in widths.iter_mut().zip(line) {
                *width = (*width).max(measure_text_width(cell));
            }
        }

        let format_line = |line: &[String; 5]| {
            line.iter()
                .zip(widths)
                .map(|(cell, width)| pad_str(cell, width, Alignment::Left, None).into_owned())
                .collect::<Vec<_>>()
                .join("  ")
        };
        println!("  {}", format_line(&header).style(self.ctx.styles.bold));
        for line in &cells {
            println!("  {}", format_line(line));
        }
    }

    fn presence(&self, presence: WorktreePresence) -> String {
        match presence {
            WorktreePresence::Ok => "ok".style(self.ctx.styles.success).to_string(),
            WorktreePresence::Missing => "missing".style(self.ctx.styles.warning).to_string(),
            WorktreePresence::Unknown => "?".style(self.ctx.styles.dim).to_string(),
        }
    }

    pub fn render_status(&self, status: &EnvStatus) {
        let Some(port) = status.port else {
            println!("Environment not found: {}/{}", status.project, status.slug);
            return;
        };
        println!();
        self.ctx
            .header(&format!("Environment: {}/{}", status.project, status.slug));
        self.ctx.kv(
            "Port:",
            &format!("{port} ({})", if status.port_in_use { "in use" } else { "free" }),
        );
        self.ctx.kv("Host:", &status.host);
        self.ctx.kv(
            "Worktree:",
            &format!(
                "{} ({})",
                status.worktree.display(),
                if status.worktree_exists { "exists" } else { "missing" }
            ),
        );
        self.ctx
            .kv("Dev DB:", &format!("{} ({})", status.dev_db, db_label(status.dev_db_exists)));
        self.ctx.kv(
            "Test DB:",
            &format!("{} ({})", status.test_db, db_label(status.test_db_exists)),
        );
        self.ctx.kv(
            "Session:",
            &format!(
                "{} ({})",
                status.session,
                if status.session_active { "active" } else { "not running" }
            ),
        );
        println!();
    }

    pub fn render_setup(&self, project: &str, report: &SetupReport) {
        if self.ctx.quiet {
            return;
        }
        if report.base_env_state == BaseEnvState::Created {
            println!();
            self.ctx
                .info(&format!("Edit {} with your secrets", report.base_env.display()));
        }
        println!();
        println!("Done. You can now run: branchfarm create {project}/BRANCH");
    }
}

fn db_label(exists: Option<bool>) -> &'static str {
    match exists {
        Some(true) => "exists",
        Some(false) => "missing",
        None => "unknown",
    }
}
