//! Caddy route snippets.

use std::path::{Path, PathBuf};

/// Well-known Caddyfile locations, probed in order when none is configured.
pub const CADDYFILE_CANDIDATES: &[&str] = &[
    "/opt/homebrew/etc/caddy/Caddyfile",
    "/usr/local/etc/caddy/Caddyfile",
    "/etc/caddy/Caddyfile",
];

/// Caddy matcher name: `project_slug` with dashes folded to underscores.
#[must_use]
pub fn snippet_name(project_key: &str, slug: &str) -> String {
    format!("{project_key}_{}", slug.replace('-', "_"))
}

/// Snippet file for an environment inside `snippets_dir`.
#[must_use]
pub fn snippet_path(snippets_dir: &Path, project_key: &str, slug: &str) -> PathBuf {
    snippets_dir.join(format!("{project_key}-{slug}.caddy"))
}

/// Route `host` and its subdomains to the local `port`.
#[must_use]
pub fn render_snippet(project_key: &str, slug: &str, host: &str, port: u16) -> String {
    let name = snippet_name(project_key, slug);
    format!(
        "@{name} host {host} *.{host}\nhandle @{name} {{\n  reverse_proxy 127.0.0.1:{port}\n}}\n"
    )
}

/// Configured Caddyfile first, then the well-known locations.
#[must_use]
pub fn caddyfile_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(CADDYFILE_CANDIDATES.iter().map(PathBuf::from))
        .collect()
}
