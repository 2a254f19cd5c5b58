//! Readable handle to a stored artifact.

use std::io;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

use super::disk::StoreState;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// An open artifact with a known size.
///
/// Every read takes the owning store's lock, so reads never interleave with
/// workspace creation or cleanup.
#[derive(Debug)]
pub struct ArtifactReader {
    file: File,
    size: u64,
    state: Arc<Mutex<StoreState>>,
}

impl ArtifactReader {
    pub(crate) fn new(file: File, size: u64, state: Arc<Mutex<StoreState>>) -> Self {
        Self { file, size, state }
    }

    /// Size of the artifact in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read into `buf`, returning the number of bytes read (0 at EOF).
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let _guard = self.state.lock().await;
        self.file.read(buf).await
    }

    /// Read the remaining content into `out` in fixed-size chunks.
    pub async fn read_to_end(&mut self, out: &mut Vec<u8>) -> io::Result<usize> {
        out.reserve(self.size as usize);
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let mut total = 0;
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&chunk[..n]);
            total += n;
        }
    }
}
