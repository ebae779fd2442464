//! Filesystem store for synthesized reply clips.
//!
//! The telephony bridge fetches clips over HTTP for playback, so they must
//! outlive the webhook request. Old clips are purged by the gateway sweeper.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::directive::AudioHandle;

const CLIP_EXTENSION: &str = "mp3";

#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    /// Open (creating if needed) the clip directory.
    pub async fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a clip under a fresh id.
    pub async fn save(&self, audio: &[u8]) -> std::io::Result<AudioHandle> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        tokio::fs::write(self.clip_path(&id), audio).await?;
        Ok(AudioHandle::new(id))
    }

    /// Delete clips last modified more than `age` ago. Returns how many were removed.
    pub async fn purge_older_than(&self, age: Duration) -> std::io::Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CLIP_EXTENSION) {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(_) => continue,
            };
            if modified < cutoff && tokio::fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// File a clip is stored in. The gateway serves this directory as-is.
    pub fn path_of(&self, handle: &AudioHandle) -> PathBuf {
        self.clip_path(handle.as_str())
    }

    fn clip_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{CLIP_EXTENSION}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saved_clips_land_in_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AudioStore::open(tmp.path().join("clips")).await.unwrap();
        let handle = store.save(b"ID3fake").await.unwrap();
        let path = store.path_of(&handle);
        assert_eq!(path.parent().unwrap(), tmp.path().join("clips"));
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("{handle}.mp3"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"ID3fake");
    }

    #[tokio::test]
    async fn handles_are_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AudioStore::open(tmp.path()).await.unwrap();
        let a = store.save(b"a").await.unwrap();
        let b = store.save(b"a").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn purge_respects_age() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AudioStore::open(tmp.path()).await.unwrap();
        store.save(b"a").await.unwrap();
        store.save(b"b").await.unwrap();
        assert_eq!(store.purge_older_than(Duration::from_secs(3600)).await.unwrap(), 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.purge_older_than(Duration::ZERO).await.unwrap(), 2);
    }
}
