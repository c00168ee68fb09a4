use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Supplies payload files for deal proposals
#[async_trait]
pub trait TestFileSource: Send + Sync {
    /// Pick a file from `source_dir`, place a copy in `dest_dir` and return the copy's path
    async fn pick_random_file(&self, source_dir: &Path, dest_dir: &Path) -> Result<PathBuf>;
}

/// Picks uniformly among the regular files of a directory
#[derive(Debug, Clone, Default)]
pub struct DirectoryFiles;

#[async_trait]
impl TestFileSource for DirectoryFiles {
    async fn pick_random_file(&self, source_dir: &Path, dest_dir: &Path) -> Result<PathBuf> {
        let mut entries = fs::read_dir(source_dir)
            .await
            .map_err(|e| anyhow!("Failed to read test files dir {}: {}", source_dir.display(), e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }

        let source = files
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| anyhow!("No test files in {}", source_dir.display()))?;

        let file_name = source
            .file_name()
            .ok_or_else(|| anyhow!("Test file {} has no name", source.display()))?;

        fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(file_name);
        fs::copy(&source, &dest)
            .await
            .map_err(|e| anyhow!("Failed to copy {} to {}: {}", source.display(), dest.display(), e))?;

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("filnet-sim-{}-{}", name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_copies_a_file_into_dest() {
        let source = scratch_dir("source");
        let dest = scratch_dir("dest").join("repo");
        std::fs::write(source.join("a.txt"), b"alpha").unwrap();
        std::fs::write(source.join("b.txt"), b"beta").unwrap();
        std::fs::create_dir(source.join("nested")).unwrap();

        let picked = DirectoryFiles.pick_random_file(&source, &dest).await.unwrap();

        assert_eq!(picked.parent(), Some(dest.as_path()));
        let name = picked.file_name().unwrap().to_str().unwrap();
        assert!(name == "a.txt" || name == "b.txt");
        assert_eq!(std::fs::read(&picked).unwrap(), std::fs::read(source.join(name)).unwrap());
    }

    #[tokio::test]
    async fn test_empty_dir_is_an_error() {
        let source = scratch_dir("empty");
        let dest = scratch_dir("dest");

        assert!(DirectoryFiles.pick_random_file(&source, &dest).await.is_err());
    }
}
