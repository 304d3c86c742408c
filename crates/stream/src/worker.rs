use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::culling::{CullRequest, CullResponse, compute_visible_range};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CullingError {
    #[error("invalid culling request: {0}")]
    InvalidRequest(String),
    #[error("culling worker has stopped")]
    WorkerGone,
}

/// Where culling arithmetic runs. Requests are posted, answers are polled
/// without blocking the caller.
pub trait CullingBackend {
    fn submit(&mut self, request: CullRequest) -> Result<(), CullingError>;

    /// Next available answer, if any.
    fn poll(&mut self) -> Result<Option<CullResponse>, CullingError>;
}

/// Culling on a dedicated tokio task.
///
/// Must be spawned inside a tokio runtime. Each request gets exactly one
/// response carrying the same sequence number.
pub struct CullingWorker {
    requests: mpsc::UnboundedSender<CullRequest>,
    responses: mpsc::UnboundedReceiver<CullResponse>,
    handle: JoinHandle<()>,
}

impl CullingWorker {
    pub fn spawn() -> Self {
        let (req_tx, mut req_rx) = mpsc::unbounded_channel::<CullRequest>();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            while let Some(request) = req_rx.recv().await {
                let range = compute_visible_range(&request);
                if let Err(err) = &range {
                    tracing::warn!(seq = request.seq, %err, "culling request rejected");
                }
                let response = CullResponse {
                    seq: request.seq,
                    range,
                };
                if resp_tx.send(response).is_err() {
                    break;
                }
            }
            tracing::debug!("culling worker stopped");
        });
        Self {
            requests: req_tx,
            responses: resp_rx,
            handle,
        }
    }

    /// Post a request and wait for its answer.
    pub async fn request(&mut self, request: CullRequest) -> Result<CullResponse, CullingError> {
        self.submit(request)?;
        loop {
            let response = self.responses.recv().await.ok_or(CullingError::WorkerGone)?;
            if response.seq == request.seq {
                return Ok(response);
            }
            tracing::trace!(seq = response.seq, "discarding stale culling response");
        }
    }

    /// Close the request channel and wait for the task to finish.
    pub async fn shutdown(self) {
        drop(self.requests);
        if let Err(err) = self.handle.await {
            tracing::warn!(%err, "culling worker task failed");
        }
    }
}

impl CullingBackend for CullingWorker {
    fn submit(&mut self, request: CullRequest) -> Result<(), CullingError> {
        self.requests
            .send(request)
            .map_err(|_| CullingError::WorkerGone)
    }

    fn poll(&mut self) -> Result<Option<CullResponse>, CullingError> {
        match self.responses.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(CullingError::WorkerGone),
        }
    }
}

/// Same-thread backend for headless replay and tests.
#[derive(Debug, Default)]
pub struct InlineCuller {
    ready: VecDeque<CullResponse>,
}

impl InlineCuller {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CullingBackend for InlineCuller {
    fn submit(&mut self, request: CullRequest) -> Result<(), CullingError> {
        self.ready.push_back(CullResponse {
            seq: request.seq,
            range: compute_visible_range(&request),
        });
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<CullResponse>, CullingError> {
        Ok(self.ready.pop_front())
    }
}

impl<T: CullingBackend + ?Sized> CullingBackend for Box<T> {
    fn submit(&mut self, request: CullRequest) -> Result<(), CullingError> {
        (**self).submit(request)
    }

    fn poll(&mut self) -> Result<Option<CullResponse>, CullingError> {
        (**self).poll()
    }
}
