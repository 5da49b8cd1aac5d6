//! Output directory operations
//!
//! Keeps filesystem handling (directory creation, temporary files, the final
//! rename) out of the fetch loop so it can be tested on its own.

use crate::error::{FetchError, Result};
use std::path::{Component, Path, PathBuf};

/// Suffix of temporary files that hold a body while it is being streamed
pub const PARTIAL_SUFFIX: &str = ".cocofetch-partial";

/// Longest task name, in bytes, common filesystems accept as a file name
pub const MAX_TASK_NAME_BYTES: usize = 255;

/// Bytes of the task name kept in a partial file name
const PARTIAL_NAME_PREFIX_MAX: usize = 64;

/// Create the output directory and all missing parents
///
/// # Errors
/// - The path exists but is not a directory
/// - The directory could not be created
pub async fn ensure_output_dir(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => {
            return Err(FetchError::file_io_error(
                "use output directory",
                path,
                &std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "path exists and is not a directory",
                ),
            ));
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => return Err(FetchError::file_io_error("inspect output directory", path, &e)),
    }

    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| FetchError::file_io_error("create output directory", path, &e))?;
    tracing::info!(path = %path.display(), "Created output directory");
    Ok(())
}

/// Check that a task name is a single, harmless path segment
///
/// # Errors
/// - Empty or over-long names, `.`/`..`, names containing separators or NUL
///   bytes, absolute paths, and names that collide with the partial-file suffix
pub fn validate_task_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FetchError::invalid_task_name(name, "name is empty"));
    }
    if name.len() > MAX_TASK_NAME_BYTES {
        return Err(FetchError::invalid_task_name(
            name,
            format!("is longer than {} bytes", MAX_TASK_NAME_BYTES),
        ));
    }
    if name.contains('\0') {
        return Err(FetchError::invalid_task_name(name, "contains a NUL byte"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(FetchError::invalid_task_name(
            name,
            "contains a path separator",
        ));
    }
    if name.ends_with(PARTIAL_SUFFIX) {
        return Err(FetchError::invalid_task_name(
            name,
            "uses the reserved partial-file suffix",
        ));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::CurDir), None) | (Some(Component::ParentDir), None) => Err(
            FetchError::invalid_task_name(name, "refers to a directory, not a file"),
        ),
        _ => Err(FetchError::invalid_task_name(
            name,
            "is not a single path segment",
        )),
    }
}

/// Temporary path for the body of task `index`
///
/// Only a bounded prefix of `name` is kept, so any name that fits as a
/// destination also fits as a partial file. The index keeps duplicates of the
/// same name from sharing a partial file.
#[must_use]
pub fn partial_path(outdir: &Path, name: &str, index: usize) -> PathBuf {
    let prefix = truncate_to_char_boundary(name, PARTIAL_NAME_PREFIX_MAX);
    outdir.join(format!(".{}.{}{}", prefix, index, PARTIAL_SUFFIX))
}

fn truncate_to_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.get(..end).unwrap_or_default()
}

/// Whether the destination is already present
///
/// # Errors
/// - The filesystem could not be queried
pub async fn destination_exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| FetchError::file_io_error("check destination", path, &e))
}

/// Move a fully written partial file into its final place
///
/// # Errors
/// - The rename failed (the partial file is left for the caller to discard)
pub async fn persist_partial(partial: &Path, destination: &Path) -> Result<()> {
    tokio::fs::rename(partial, destination)
        .await
        .map_err(|e| FetchError::file_io_error("move download into place", destination, &e))
}

/// Remove a partial file, logging instead of failing
pub async fn discard_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => tracing::debug!(path = %partial.display(), "Discarded partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => tracing::warn!(
            path = %partial.display(),
            error = %e,
            "Failed to remove partial file"
        ),
    }
}

/// Delete partial files left behind by an interrupted run
///
/// Only files carrying [`PARTIAL_SUFFIX`] are touched.
///
/// # Errors
/// - The directory could not be listed
pub async fn remove_stale_partials(outdir: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(outdir)
        .await
        .map_err(|e| FetchError::file_io_error("read output directory", outdir, &e))?;

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| FetchError::file_io_error("read output directory entry", outdir, &e))?
    {
        let is_partial = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));
        if !is_partial {
            continue;
        }

        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove stale partial file"
            ),
        }
    }

    if removed > 0 {
        tracing::info!(count = removed, "Removed stale partial files");
    }
    Ok(removed)
}

/// Format byte count in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS.get(unit_index).unwrap_or(&"B"))
    } else {
        format!("{:.1} {}", size, UNITS.get(unit_index).unwrap_or(&"B"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_task_name() {
        assert!(validate_task_name("a.jpg").is_ok());
        assert!(validate_task_name("00a1b2c3-0001.png").is_ok());
        assert!(validate_task_name(".hidden.jpg").is_ok());

        let invalid = [
            ("", "empty"),
            (".", "directory"),
            ("..", "directory"),
            ("a/b.jpg", "separator"),
            ("..\\b.jpg", "separator"),
            ("/etc/passwd", "separator"),
            ("a\0.jpg", "NUL"),
            ("x.cocofetch-partial", "reserved"),
        ];
        for (name, reason) in invalid {
            let err = validate_task_name(name).unwrap_err();
            assert!(
                err.to_string().contains(reason),
                "name {:?} should be rejected for {}, got: {}",
                name,
                reason,
                err
            );
        }
    }

    #[test]
    fn test_partial_path_is_unique_per_index() {
        let dir = Path::new("/data/out");
        let a = partial_path(dir, "a.jpg", 0);
        let b = partial_path(dir, "a.jpg", 1);
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(dir));
        assert!(a.to_string_lossy().ends_with(PARTIAL_SUFFIX));
        assert_ne!(a, dir.join("a.jpg"));
    }

    #[test]
    fn test_partial_path_is_bounded_for_long_names() {
        let dir = Path::new("/data/out");
        let long = format!("{}.jpg", "a".repeat(MAX_TASK_NAME_BYTES - 4));
        assert!(validate_task_name(&long).is_ok());

        let partial = partial_path(dir, &long, 123_456);
        let file_name = partial.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.len() <= MAX_TASK_NAME_BYTES);
        assert!(file_name.ends_with(PARTIAL_SUFFIX));
        assert_ne!(partial, partial_path(dir, &long, 123_457));
    }

    #[test]
    fn test_partial_path_truncates_on_char_boundary() {
        // 'é' is two bytes; 40 of them straddle the prefix limit
        let name = "é".repeat(40);
        let partial = partial_path(Path::new("out"), &name, 0);
        let file_name = partial.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with(&format!(".{}.0", "é".repeat(32))));
    }

    #[test]
    fn test_overlong_name_is_rejected() {
        let name = "b".repeat(MAX_TASK_NAME_BYTES + 1);
        let err = validate_task_name(&name).unwrap_err();
        assert!(err.to_string().contains("longer than 255 bytes"));
    }

    #[tokio::test]
    async fn test_ensure_output_dir_creates_nested() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b").join("images");

        ensure_output_dir(&nested).await.unwrap();
        assert!(nested.is_dir());

        // Second call is a no-op
        ensure_output_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_ensure_output_dir_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let err = ensure_output_dir(&file).await.unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
        assert!(err.to_string().contains("not a directory"));
    }

    #[tokio::test]
    async fn test_persist_and_discard_partial() {
        let temp = TempDir::new().unwrap();
        let partial = partial_path(temp.path(), "a.jpg", 3);
        let dest = temp.path().join("a.jpg");
        std::fs::write(&partial, b"body").unwrap();

        assert!(!destination_exists(&dest).await.unwrap());
        persist_partial(&partial, &dest).await.unwrap();
        assert!(destination_exists(&dest).await.unwrap());
        assert!(!partial.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"body");

        // Discarding a missing partial is silent
        discard_partial(&partial).await;

        std::fs::write(&partial, b"half").unwrap();
        discard_partial(&partial).await;
        assert!(!partial.exists());
    }

    #[tokio::test]
    async fn test_remove_stale_partials_leaves_other_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(partial_path(temp.path(), "a.jpg", 0), b"x").unwrap();
        std::fs::write(partial_path(temp.path(), "b.jpg", 7), b"x").unwrap();
        std::fs::write(temp.path().join("c.jpg"), b"complete").unwrap();
        std::fs::write(temp.path().join("notes.part"), b"user file").unwrap();

        let removed = remove_stale_partials(temp.path()).await.unwrap();
        assert_eq!(removed, 2);

        let mut remaining: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec!["c.jpg".to_string(), "notes.part".to_string()]);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(1_073_741_824), "1.0 GB");
    }
}
