//! File helpers shared by the provisioning modules

use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::ProvisionError;

/// Write `content` to `path`, creating parent directories, then set `mode`
pub async fn write_file(path: &Path, content: &str, mode: u32) -> Result<(), ProvisionError> {
    debug!("Writing {} ({:o})", path.display(), mode);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await?;
    set_permissions(path, mode).await
}

/// Append lines to `path`, creating it if needed
pub async fn append_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<(), ProvisionError> {
    if lines.is_empty() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut buf = String::new();
    for line in lines {
        buf.push_str(line.as_ref());
        buf.push('\n');
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(buf.as_bytes()).await?;
    file.flush().await?;

    debug!("Appended {} lines to {}", lines.len(), path.display());
    Ok(())
}

/// Replace every occurrence of `from` with `to` in `path`.
///
/// Literal text substitution. Returns whether the file changed; once the
/// placeholder has been replaced a rerun is a no-op.
pub async fn replace_in_file(path: &Path, from: &str, to: &str) -> Result<bool, ProvisionError> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        ProvisionError::Config(format!("Cannot read {}: {}", path.display(), e))
    })?;

    if !content.contains(from) {
        debug!("'{}' not found in {}", from, path.display());
        return Ok(false);
    }

    fs::write(path, content.replace(from, to)).await?;
    debug!("Replaced '{}' with '{}' in {}", from, to, path.display());
    Ok(true)
}

async fn set_permissions(path: &Path, mode: u32) -> Result<(), ProvisionError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_file_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/c.txt");

        write_file(&path, "hello\n", 0o600).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_append_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("routes.cfg");

        append_lines(&path, &["one"]).await.unwrap();
        append_lines(&path, &["two", "three"]).await.unwrap();
        append_lines::<&str>(&path, &[]).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\nthree\n");
    }

    #[tokio::test]
    async fn test_replace_in_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dataplaneapi.cfg");
        std::fs::write(&path, "TLS_HOST=0.0.0.0\nTLS_PORT=5556\n").unwrap();

        assert!(replace_in_file(&path, "TLS_HOST=0.0.0.0", "TLS_HOST=10.0.0.2").await.unwrap());
        assert!(!replace_in_file(&path, "TLS_HOST=0.0.0.0", "TLS_HOST=10.0.0.2").await.unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "TLS_HOST=10.0.0.2\nTLS_PORT=5556\n"
        );
    }

    #[tokio::test]
    async fn test_replace_in_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = replace_in_file(&temp.path().join("nope"), "a", "b").await.unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }
}
