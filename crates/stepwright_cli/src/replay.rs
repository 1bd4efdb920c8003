//! Offline collaborators: a transport that plays back a captured stream and a
//! commit backend that keeps payloads in memory.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use automation_model::CancelSignal;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use stepwright::{ChatTransport, CommitBackend};
use stream_api::{ByteStream, ChatRequest, CommitPayload, CommitReceipt, StreamApiError};
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Plays the same captured NDJSON body for every request, split into
/// fixed-size chunks so frames straddle chunk boundaries the way network
/// reads do.
pub struct ReplayTransport {
    capture: Arc<[u8]>,
    chunk_size: usize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ReplayTransport {
    pub fn new(capture: impl Into<Vec<u8>>, chunk_size: usize) -> Self {
        Self {
            capture: capture.into().into(),
            chunk_size: chunk_size.max(1),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn from_file(path: &Path, chunk_size: usize) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read(path)?, chunk_size))
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        lock_unpoisoned(&self.requests).clone()
    }
}

impl ChatTransport for ReplayTransport {
    fn open(
        &self,
        request: ChatRequest,
        _cancel: CancelSignal,
    ) -> BoxFuture<'_, Result<ByteStream, StreamApiError>> {
        debug!(message = %request.message, bytes = self.capture.len(), "replaying capture");
        lock_unpoisoned(&self.requests).push(request);
        let chunks: Vec<Result<Vec<u8>, StreamApiError>> = self
            .capture
            .chunks(self.chunk_size)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Box::pin(async move { Ok(stream::iter(chunks).boxed()) })
    }
}

/// Accepts every commit and numbers versions from 1.
#[derive(Default)]
pub struct MemoryCommits {
    payloads: Mutex<Vec<CommitPayload>>,
}

impl MemoryCommits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> Vec<CommitPayload> {
        lock_unpoisoned(&self.payloads).clone()
    }
}

impl CommitBackend for MemoryCommits {
    fn commit(&self, payload: CommitPayload) -> BoxFuture<'_, Result<CommitReceipt, StreamApiError>> {
        let version = {
            let mut payloads = lock_unpoisoned(&self.payloads);
            payloads.push(payload);
            payloads.len() as u64
        };
        Box::pin(async move {
            Ok(CommitReceipt {
                version: Some(version),
            })
        })
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use automation_model::cancel_signal;
    use futures_util::StreamExt;
    use stepwright::ChatTransport;
    use stream_api::ChatRequest;

    use super::ReplayTransport;

    #[tokio::test]
    async fn capture_is_split_into_fixed_chunks() {
        let transport = ReplayTransport::new(b"abcdefg".to_vec(), 3);

        let stream = transport
            .open(
                ChatRequest::new("auto-1", "hi", "default"),
                cancel_signal(),
            )
            .await
            .expect("replay opens");
        let chunks: Vec<Vec<u8>> = stream
            .map(|chunk| chunk.expect("chunk"))
            .collect()
            .await;

        assert_eq!(chunks, vec![b"abc".to_vec(), b"def".to_vec(), b"g".to_vec()]);
        assert_eq!(transport.requests()[0].message, "hi");
    }
}
