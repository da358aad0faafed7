mod bridge;
mod worker;

pub use bridge::{SyncBridge, SYNC_TIMEOUT};
pub use worker::{spawn_push_worker, SyncHandle, PUSH_QUEUE_DEPTH};
