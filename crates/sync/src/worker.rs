use storage::Storage;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::bridge::SyncBridge;

pub const PUSH_QUEUE_DEPTH: usize = 16;

/// Enqueues push requests for the dedicated sync worker.
///
/// Requests are tokens, not payloads: the worker snapshots the store when it
/// gets around to the push, so a full queue means the pending push already
/// covers this mutation and the request can be dropped.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<()>,
}

impl SyncHandle {
    /// Builds a handle and its receiving end without spawning a worker.
    pub fn channel() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(PUSH_QUEUE_DEPTH);
        (Self { tx }, rx)
    }

    pub fn request_push(&self) {
        match self.tx.try_send(()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!("push already queued, coalescing");
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                warn!("sync worker is gone, dropping push request");
            }
        }
    }
}

/// Spawns the worker that drains push requests, snapshots the store and calls
/// the bridge. Failures are logged and never reach the mutation that queued
/// the push.
pub fn spawn_push_worker(
    bridge: SyncBridge,
    storage: Storage,
    mut shutdown: watch::Receiver<bool>,
) -> (SyncHandle, JoinHandle<()>) {
    let (handle, mut rx) = SyncHandle::channel();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                request = rx.recv() => {
                    if request.is_none() {
                        break;
                    }
                    // Coalesce the burst: everything queued so far is covered
                    // by the snapshot taken below.
                    while rx.try_recv().is_ok() {}

                    match storage.full_state().await {
                        Ok(state) => {
                            if let Err(error) = bridge.push(&state).await {
                                warn!(%error, "state push failed");
                            }
                        }
                        Err(error) => warn!(%error, "could not snapshot state for push"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("sync worker stopped");
    });

    (handle, task)
}
