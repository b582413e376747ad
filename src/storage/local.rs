//! Filesystem-backed chunk persistence: one file per chunk id directly under
//! a configured root directory. Ported from `localstorage.go`'s
//! fail-if-exists semantics.

use crate::core::error::{Error, Result};
use crate::storage::Storage;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Largest frame `ChunkReader::read_frame` returns in one call. Matches the
/// wire protocol's recommended ≤1 MiB payload frame (spec.md §4.1).
const FRAME_SIZE: usize = 1024 * 1024;

/// Persists chunk blobs as plain files under `root_dir`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Creates the root directory (owner-only permissions on unix) if
    /// absent, then returns a handle rooted there.
    pub async fn new(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        fs::create_dir_all(&root_dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&root_dir, std::fs::Permissions::from_mode(0o700)).await?;
        }
        Ok(Self { root_dir })
    }

    fn path_for(&self, chunk_id: &str) -> PathBuf {
        self.root_dir.join(chunk_id)
    }

    /// Creates a fresh temp directory under the OS temp dir and roots a
    /// `LocalStorage` there. Used by tests that want a disposable node.
    #[cfg(test)]
    pub async fn new_tmp() -> Self {
        let dir = std::env::temp_dir().join(format!("diststorage-{}", uuid_like()));
        Self::new(dir).await.expect("cannot create temp storage")
    }

    #[cfg(test)]
    fn root(&self) -> &Path {
        &self.root_dir
    }
}

#[cfg(test)]
fn uuid_like() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

impl Storage for LocalStorage {
    async fn begin_store(&self, chunk_id: &str) -> Result<ChunkWriter> {
        let path = self.path_for(chunk_id);
        let file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::ChunkAlreadyExists(chunk_id.to_string()))
            }
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(ChunkWriter { file, path })
    }

    async fn begin_retrieve(&self, chunk_id: &str) -> Result<ChunkReader> {
        let path = self.path_for(chunk_id);
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ChunkMissing(chunk_id.to_string()))
            }
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(ChunkReader { file })
    }

    async fn delete_chunk(&self, chunk_id: &str) -> Result<()> {
        let path = self.path_for(chunk_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::ChunkMissing(chunk_id.to_string()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// A blob mid-creation. Dropping this without calling `finish` leaves a
/// partial file on disk, which is acceptable per spec.md §4.1 ("the partial
/// file's state is implementation-defined but the node MUST not surface it
/// as a completed blob") as long as callers use `abort` to clean it up on
/// any error, which `node::server`'s handlers do.
pub struct ChunkWriter {
    file: fs::File,
    path: PathBuf,
}

impl ChunkWriter {
    /// Appends one frame of payload bytes, in order.
    pub async fn write_frame(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data).await?;
        Ok(())
    }

    /// Flushes and finalizes the blob.
    pub async fn finish(mut self) -> Result<()> {
        self.file.flush().await?;
        Ok(())
    }

    /// Removes the partial file after a mid-stream failure.
    pub async fn abort(self) {
        let _ = fs::remove_file(&self.path).await;
    }
}

/// A blob opened for frame-by-frame reading. Each `read_frame` call pulls at
/// most `FRAME_SIZE` bytes off disk, so a `RetrieveData` stream never holds
/// more than one frame of a chunk in memory regardless of the chunk's size
/// (spec.md §5: "no unbounded buffering is introduced between the two").
pub struct ChunkReader {
    file: fs::File,
}

impl ChunkReader {
    /// Reads the next frame, at most `FRAME_SIZE` bytes. Returns `Ok(None)`
    /// at EOF.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; FRAME_SIZE];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf))
    }
}

/// Queries bytes available to unprivileged users on the volume backing
/// `root_dir`, for the heartbeat's `available_bytes` field. See DESIGN.md
/// for why this uses `fs2` rather than a hand-rolled `statvfs` FFI call.
pub fn available_bytes(root_dir: &Path) -> Result<i64> {
    let bytes = fs2::available_space(root_dir)?;
    Ok(bytes.min(i64::MAX as u64) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(reader: &mut ChunkReader) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(frame) = reader.read_frame().await.unwrap() {
            out.extend_from_slice(&frame);
        }
        out
    }

    #[tokio::test]
    async fn store_then_retrieve_roundtrip() {
        let storage = LocalStorage::new_tmp().await;
        let data = vec![1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];

        let mut writer = storage.begin_store("this/is/my/file1.part.0").await.unwrap();
        writer.write_frame(&data).await.unwrap();
        writer.finish().await.unwrap();

        let mut reader = storage.begin_retrieve("this/is/my/file1.part.0").await.unwrap();
        let out = drain(&mut reader).await;
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn retrieve_splits_large_blob_into_frame_sized_reads() {
        let storage = LocalStorage::new_tmp().await;
        let data: Vec<u8> = (0..(FRAME_SIZE * 2 + 17)).map(|i| (i % 256) as u8).collect();

        let mut writer = storage.begin_store("big.part.0").await.unwrap();
        writer.write_frame(&data).await.unwrap();
        writer.finish().await.unwrap();

        let mut reader = storage.begin_retrieve("big.part.0").await.unwrap();
        let mut frame_count = 0;
        let mut out = Vec::new();
        while let Some(frame) = reader.read_frame().await.unwrap() {
            assert!(frame.len() <= FRAME_SIZE);
            out.extend_from_slice(&frame);
            frame_count += 1;
        }
        assert_eq!(out, data);
        assert_eq!(frame_count, 3);
    }

    #[tokio::test]
    async fn storing_twice_fails() {
        let storage = LocalStorage::new_tmp().await;
        let mut writer = storage.begin_store("file2.part.0").await.unwrap();
        writer.write_frame(&[1, 2, 3]).await.unwrap();
        writer.finish().await.unwrap();

        let err = storage.begin_store("file2.part.0").await.unwrap_err();
        assert!(matches!(err, Error::ChunkAlreadyExists(_)));
    }

    #[tokio::test]
    async fn retrieving_absent_chunk_fails() {
        let storage = LocalStorage::new_tmp().await;
        let err = storage
            .begin_retrieve("hello/this/is/patrick")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChunkMissing(_)));
    }

    #[tokio::test]
    async fn deleting_absent_chunk_reports_missing() {
        let storage = LocalStorage::new_tmp().await;
        let err = storage.delete_chunk("nope").await.unwrap_err();
        assert!(matches!(err, Error::ChunkMissing(_)));
    }

    #[tokio::test]
    async fn delete_then_retrieve_fails() {
        let storage = LocalStorage::new_tmp().await;
        let mut writer = storage.begin_store("f.part.0").await.unwrap();
        writer.write_frame(&[9, 9]).await.unwrap();
        writer.finish().await.unwrap();

        storage.delete_chunk("f.part.0").await.unwrap();
        assert!(storage.begin_retrieve("f.part.0").await.is_err());
    }

    #[tokio::test]
    async fn aborted_store_leaves_no_completed_blob() {
        let storage = LocalStorage::new_tmp().await;
        let mut writer = storage.begin_store("aborted.part.0").await.unwrap();
        writer.write_frame(&[1, 2, 3]).await.unwrap();
        writer.abort().await;

        assert!(storage.begin_retrieve("aborted.part.0").await.is_err());
    }

    #[tokio::test]
    async fn root_dir_created_on_construction() {
        let storage = LocalStorage::new_tmp().await;
        assert!(storage.root().exists());
    }
}
