use crate::client::{ClassificationClient, ClientError};
use cifar_proto::Label;
use std::{
    io,
    path::{Path, PathBuf},
};

/// Entries directly under `dir` other than sub-directories, sorted by name.
///
/// Symlinks are kept as is; one that cannot be read fails on its own call.
pub fn image_paths(dir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Sends every image of `dir` to `GetResult`, one call per file.
///
/// Only listing `dir` can fail the whole run; a file that cannot be read or
/// classified gets its own error and the next file is still sent.
pub async fn classify_dir(
    client: &mut ClassificationClient,
    dir: impl AsRef<Path>,
) -> io::Result<Vec<(PathBuf, Result<Label, ClientError>)>> {
    let paths = image_paths(dir.as_ref())?;
    if paths.is_empty() {
        tracing::warn!("No images found in {}", dir.as_ref().display());
    }

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let result = client.get_result(&path).await;
        if let Err(e) = &result {
            tracing::error!("Failed to classify {}: {}", path.display(), e);
        }
        results.push((path, result));
    }

    Ok(results)
}
