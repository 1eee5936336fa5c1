//! Filesystem infrastructure: implements `LocalFs` on the host filesystem.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Production filesystem implementation of `LocalFs`.
pub struct HostFs;

impl crate::application::ports::LocalFs for HostFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating directory {}", path.display()))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content).with_context(|| format!("writing file {}", path.display()))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("reading file {}", path.display()))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing file {}", path.display()))
            }
            _ => Ok(()),
        }
    }

    fn copy_file(&self, path: &Path, dest: &Path) -> Result<()> {
        std::fs::copy(path, dest)
            .map(|_| ())
            .with_context(|| format!("copying {} to {}", path.display(), dest.display()))
    }

    fn copy_tree(&self, src: &Path, dest: &Path) -> Result<usize> {
        copy_tree(src, dest)
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        if let Some(parent) = link.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        if link.symlink_metadata().is_ok() {
            remove_existing(link)?;
        }
        create_symlink(target, link)
            .with_context(|| format!("linking {} -> {}", link.display(), target.display()))
    }

    fn list_dir(&self, path: &Path) -> Vec<PathBuf> {
        WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .map(walkdir::DirEntry::into_path)
            .collect()
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Recursively copy the contents of `src` into `dest`.
///
/// # Errors
///
/// Returns an error if the walk fails or any file cannot be copied.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.with_context(|| format!("walking {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("resolving {}", entry.path().display()))?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("creating directory {}", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating directory {}", parent.display()))?;
            }
            std::fs::copy(entry.path(), &target).with_context(|| {
                format!("copying {} to {}", entry.path().display(), target.display())
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Remove a link or regular file standing where a new link goes. A real
/// directory is checked-out content and is never removed.
fn remove_existing(path: &Path) -> Result<()> {
    let meta = path
        .symlink_metadata()
        .with_context(|| format!("inspecting {}", path.display()))?;
    if meta.is_dir() {
        anyhow::bail!(
            "refusing to replace directory {} with a symlink",
            path.display()
        );
    }
    std::fs::remove_file(path).with_context(|| format!("replacing {}", path.display()))
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}
