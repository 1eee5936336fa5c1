//! `.env` / `.envrc` contents for a worktree.
//!
//! Parsing delegates to `dotenvy`'s line parser: `KEY=value`, optional
//! `export ` prefix, comments and blank lines skipped, double-quoted values
//! unescaped, single-quoted values literal, unquoted values stripped of inline
//! ` #` comments. Lines it rejects are dropped.

use std::path::Path;

use crate::domain::naming::EnvNames;

/// Ordered `KEY=value` pairs. Later entries for a key replace earlier ones in
/// place.
pub type EnvVars = Vec<(String, String)>;

/// Parse the contents of an env file.
#[must_use]
pub fn parse(content: &str) -> EnvVars {
    let mut vars = EnvVars::new();
    for (key, value) in dotenvy::from_read_iter(content.as_bytes()).flatten() {
        set(&mut vars, key, value);
    }
    vars
}

/// Insert or replace `key`, keeping its original position.
pub fn set(vars: &mut EnvVars, key: String, value: String) {
    match vars.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => vars.push((key, value)),
    }
}

/// Merge `overrides` on top of `base`.
#[must_use]
pub fn merge(mut base: EnvVars, overrides: EnvVars) -> EnvVars {
    for (key, value) in overrides {
        set(&mut base, key, value);
    }
    base
}

/// Look up `key`.
#[must_use]
pub fn get<'a>(vars: &'a EnvVars, key: &str) -> Option<&'a str> {
    vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Keys generated for every environment, in output order.
#[must_use]
pub fn generated(names: &EnvNames, port: u16) -> EnvVars {
    vec![
        ("APP_HOST".to_string(), names.host.clone()),
        ("PORT".to_string(), port.to_string()),
        ("DATABASE_NAME".to_string(), names.dev_db.clone()),
        ("TEST_DATABASE_NAME".to_string(), names.test_db.clone()),
    ]
}

/// Render a `.env` file: base entries with the generated keys overriding.
#[must_use]
pub fn render_env(base: EnvVars, generated: EnvVars) -> String {
    let mut out = String::from("# Generated by branchfarm. Changes are overwritten on refresh.\n");
    for (key, value) in merge(base, generated) {
        out.push_str(&format!("{key}={}\n", quote(&value)));
    }
    out
}

/// Render a `.envrc` that loads the shared base file and exports the
/// generated keys.
#[must_use]
pub fn render_envrc(base_env_file: &Path, generated: &EnvVars) -> String {
    let mut out = format!(
        "# Generated by branchfarm.\ndotenv_if_exists {}\n",
        quote(&base_env_file.to_string_lossy())
    );
    for (key, value) in generated {
        out.push_str(&format!("export {key}={}\n", quote(value)));
    }
    out
}

fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@%+,".contains(c));
    if plain {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' | '$' | '`' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
