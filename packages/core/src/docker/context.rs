//! Build context packaging
//!
//! The build context is a gzipped tar of the whole source tree with the
//! rendered Dockerfile placed at its root. Entries are written in sorted
//! order with deterministic headers, so an unchanged tree yields the same
//! archive bytes.

use super::dockerfile::Recipe;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tar::{Builder as TarBuilder, HeaderMode};
use thiserror::Error;
use tracing::{debug, trace};

/// Name of the Dockerfile inside the context archive
pub const CONTEXT_DOCKERFILE: &str = "Dockerfile";

/// Manifest that must sit at the root of the source tree
const CARGO_MANIFEST: &str = "Cargo.toml";

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Source directory '{0}' does not exist")]
    MissingSource(PathBuf),

    #[error("'{0}' is not a Cargo project (no Cargo.toml at its root)")]
    NotACargoProject(PathBuf),

    #[error("Failed to package build context: {0}")]
    Io(#[from] io::Error),

    #[error("Build context task failed: {0}")]
    Join(String),
}

/// A packaged build context ready to upload to the daemon
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Gzipped tar bytes
    pub archive: Vec<u8>,
    /// Number of source entries (files, dirs, links) included
    pub entries: usize,
}

/// Package `source_root` plus the rendered recipe into a build context
///
/// `excludes` lists top-level entry names to leave out; the tree is copied
/// wholesale when it is empty. A `Dockerfile` already present at the source
/// root is always replaced by the rendered recipe.
pub fn create_build_context(
    source_root: &Path,
    recipe: &Recipe,
    excludes: &[String],
) -> Result<BuildContext, ContextError> {
    if !source_root.is_dir() {
        return Err(ContextError::MissingSource(source_root.to_path_buf()));
    }
    if !source_root.join(CARGO_MANIFEST).is_file() {
        return Err(ContextError::NotACargoProject(source_root.to_path_buf()));
    }

    let dockerfile = recipe.render();
    let mut archive_buffer = Vec::new();
    let mut entries = 0usize;

    {
        let encoder = GzEncoder::new(&mut archive_buffer, Compression::default());
        let mut tar = TarBuilder::new(encoder);
        tar.mode(HeaderMode::Deterministic);
        tar.follow_symlinks(false);

        for entry in sorted_entries(source_root)? {
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == CONTEXT_DOCKERFILE {
                debug!("Replacing source Dockerfile with rendered recipe");
                continue;
            }
            if excludes.iter().any(|e| e == name) {
                debug!("Excluding '{}' from build context", name);
                continue;
            }
            entries += append_tree(&mut tar, &entry, Path::new(name))?;
        }

        let dockerfile_bytes = dockerfile.as_bytes();
        let mut header = tar::Header::new_gnu();
        header.set_path(CONTEXT_DOCKERFILE)?;
        header.set_size(dockerfile_bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        tar.append(&header, dockerfile_bytes)?;

        tar.finish()?;
        let encoder = tar.into_inner()?;
        encoder.finish()?;
    }

    debug!(
        "Build context: {} entries, {} bytes compressed",
        entries,
        archive_buffer.len()
    );
    Ok(BuildContext {
        archive: archive_buffer,
        entries,
    })
}

/// Async wrapper running the filesystem walk on the blocking pool
pub async fn create_build_context_async(
    source_root: PathBuf,
    recipe: Recipe,
    excludes: Vec<String>,
) -> Result<BuildContext, ContextError> {
    tokio::task::spawn_blocking(move || create_build_context(&source_root, &recipe, &excludes))
        .await
        .map_err(|e| ContextError::Join(e.to_string()))?
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

fn append_tree<W: io::Write>(
    tar: &mut TarBuilder<W>,
    source: &Path,
    archive_path: &Path,
) -> Result<usize, io::Error> {
    let metadata = fs::symlink_metadata(source)?;
    if metadata.is_dir() {
        trace!("dir  {}", archive_path.display());
        tar.append_dir(archive_path, source)?;
        let mut count = 1;
        for child in sorted_entries(source)? {
            let Some(name) = child.file_name() else {
                continue;
            };
            count += append_tree(tar, &child, &archive_path.join(name))?;
        }
        Ok(count)
    } else {
        trace!("file {}", archive_path.display());
        tar.append_path_with_name(source, archive_path)?;
        Ok(1)
    }
}
