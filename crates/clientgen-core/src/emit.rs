//! Writing artifacts to disk.

use tokio::fs;

use crate::assembler::Artifact;
use crate::error::Result;

/// Write one artifact, creating its parent directories.
pub async fn write_artifact(artifact: &Artifact) -> Result<()> {
    if let Some(parent) = artifact.path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&artifact.path, &artifact.text).await?;
    log::debug!("Wrote {} for service '{}'", artifact.path.display(), artifact.service);
    Ok(())
}

/// Write every artifact in order. Returns how many were written.
pub async fn write_artifacts<'a>(artifacts: impl IntoIterator<Item = &'a Artifact>) -> Result<usize> {
    let mut written = 0;
    for artifact in artifacts {
        write_artifact(artifact).await?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_creates_directories() -> crate::Result<()> {
        let dir = tempdir()?;
        let artifact = Artifact {
            service: "pets".to_string(),
            path: dir.path().join("http/pets/client/types.rs"),
            text: "pub struct ShowRequestBody {}\n".to_string(),
        };

        assert_eq!(write_artifacts([&artifact]).await?, 1);
        let content = fs::read_to_string(&artifact.path).await?;
        assert_eq!(content, artifact.text);
        Ok(())
    }
}
