use std::sync::Arc;

use shared::{
    domain::{EventSettings, ItemId, Phase, PhaseId, ScheduleItem},
    error::ControlError,
    protocol::{FullState, NewPhase, NewScheduleItem, ScheduleItemPatch, SettingsPatch},
};
use storage::Storage;
use sync::{SyncBridge, SyncHandle};
use tokio::sync::Mutex;
use tracing::info;

pub mod auto_advance;
pub mod clock;
pub mod engine;

/// Shared context of the control surface.
///
/// Every pointer-mutating operation, manual commands and the auto-advance
/// loop alike, serializes its read-then-write sequence through the single
/// transition lock, so concurrent transitions cannot interleave.
#[derive(Clone)]
pub struct ControlContext {
    pub storage: Storage,
    pub bridge: SyncBridge,
    pusher: SyncHandle,
    transitions: Arc<Mutex<()>>,
}

impl ControlContext {
    pub fn new(storage: Storage, bridge: SyncBridge, pusher: SyncHandle) -> Self {
        Self {
            storage,
            bridge,
            pusher,
            transitions: Arc::new(Mutex::new(())),
        }
    }

    pub(crate) async fn lock_transitions(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.transitions.lock().await
    }

    pub(crate) fn request_push(&self) {
        self.pusher.request_push();
    }
}

pub async fn get_state(ctx: &ControlContext) -> Result<FullState, ControlError> {
    Ok(ctx.storage.full_state().await?)
}

// --- current-pointer transitions ---

/// Advances to the next item by order; with no current item the first item
/// starts the show. Returns the new current item, or `None` when already at
/// the last item (a no-op, not an error).
pub async fn next(ctx: &ControlContext) -> Result<Option<ScheduleItem>, ControlError> {
    let _guard = ctx.lock_transitions().await;
    let current_id = ctx.storage.get_settings().await?.current_item_id;
    let items = ctx.storage.list_items().await?;

    let Some(target) = engine::next_item(&items, current_id.as_ref()).cloned() else {
        return Ok(None);
    };
    ctx.storage.set_current(Some(&target.id)).await?;
    info!(item = %target.id, title = %target.title, "advanced to next item");
    ctx.request_push();
    Ok(Some(target))
}

/// Steps back to the previous item by order; no-op with no current item or
/// when already at the first.
pub async fn previous(ctx: &ControlContext) -> Result<Option<ScheduleItem>, ControlError> {
    let _guard = ctx.lock_transitions().await;
    let current_id = ctx.storage.get_settings().await?.current_item_id;
    let items = ctx.storage.list_items().await?;

    let Some(target) = engine::previous_item(&items, current_id.as_ref()).cloned() else {
        return Ok(None);
    };
    ctx.storage.set_current(Some(&target.id)).await?;
    info!(item = %target.id, title = %target.title, "stepped back to previous item");
    ctx.request_push();
    Ok(Some(target))
}

/// Manual jump: designates the given item current regardless of sequence.
pub async fn set_current(ctx: &ControlContext, item_id: &ItemId) -> Result<(), ControlError> {
    let _guard = ctx.lock_transitions().await;
    if ctx.storage.find_item(item_id).await?.is_none() {
        return Err(ControlError::NotFound("schedule item"));
    }
    ctx.storage.set_current(Some(item_id)).await?;
    info!(item = %item_id, "current item set");
    ctx.request_push();
    Ok(())
}

pub async fn clear_current(ctx: &ControlContext) -> Result<(), ControlError> {
    let _guard = ctx.lock_transitions().await;
    ctx.storage.set_current(None).await?;
    info!("current item cleared");
    ctx.request_push();
    Ok(())
}

/// Flips the pause flag in a single write and returns the new value.
pub async fn toggle_pause(ctx: &ControlContext) -> Result<bool, ControlError> {
    let is_paused = ctx.storage.toggle_pause().await?;
    info!(is_paused, "pause toggled");
    ctx.request_push();
    Ok(is_paused)
}

// --- schedule CRUD ---

pub async fn create_item(
    ctx: &ControlContext,
    new: &NewScheduleItem,
) -> Result<ScheduleItem, ControlError> {
    let item = ctx.storage.insert_item(new).await?;
    ctx.request_push();
    Ok(item)
}

pub async fn update_item(
    ctx: &ControlContext,
    item_id: &ItemId,
    patch: &ScheduleItemPatch,
) -> Result<ScheduleItem, ControlError> {
    let item = ctx
        .storage
        .update_item(item_id, patch)
        .await?
        .ok_or(ControlError::NotFound("schedule item"))?;
    ctx.request_push();
    Ok(item)
}

pub async fn delete_item(ctx: &ControlContext, item_id: &ItemId) -> Result<(), ControlError> {
    if !ctx.storage.delete_item(item_id).await? {
        return Err(ControlError::NotFound("schedule item"));
    }
    ctx.request_push();
    Ok(())
}

/// Rewrites item order positionally from the given id list.
pub async fn reorder(ctx: &ControlContext, ordered_ids: &[ItemId]) -> Result<(), ControlError> {
    ctx.storage.reorder_items(ordered_ids).await?;
    ctx.request_push();
    Ok(())
}

// --- phase CRUD ---

pub async fn create_phase(ctx: &ControlContext, new: &NewPhase) -> Result<Phase, ControlError> {
    let phase = ctx.storage.insert_phase(new).await?;
    ctx.request_push();
    Ok(phase)
}

pub async fn update_phase(
    ctx: &ControlContext,
    phase_id: &PhaseId,
    update: &NewPhase,
) -> Result<Phase, ControlError> {
    let phase = ctx
        .storage
        .update_phase(phase_id, update)
        .await?
        .ok_or(ControlError::NotFound("phase"))?;
    ctx.request_push();
    Ok(phase)
}

pub async fn delete_phase(ctx: &ControlContext, phase_id: &PhaseId) -> Result<(), ControlError> {
    if !ctx.storage.delete_phase(phase_id).await? {
        return Err(ControlError::NotFound("phase"));
    }
    ctx.request_push();
    Ok(())
}

// --- settings ---

pub async fn get_settings(ctx: &ControlContext) -> Result<EventSettings, ControlError> {
    Ok(ctx.storage.get_settings().await?)
}

pub async fn update_settings(
    ctx: &ControlContext,
    patch: &SettingsPatch,
) -> Result<EventSettings, ControlError> {
    let settings = ctx.storage.update_settings(patch).await?;
    ctx.request_push();
    Ok(settings)
}

// --- explicit sync ---

/// Pushes the current snapshot synchronously; unlike the queued pushes that
/// mutations trigger, failures here are surfaced to the caller.
pub async fn sync_to_external(ctx: &ControlContext) -> Result<(), ControlError> {
    if !ctx.bridge.is_configured() {
        return Err(ControlError::NotConfigured);
    }
    let state = ctx.storage.full_state().await?;
    ctx.bridge.push(&state).await
}

/// Pulls the external copy and replaces the local collections wholesale.
/// The incoming settings pointer becomes authoritative; empty incoming
/// collections leave the local ones untouched.
pub async fn sync_from_external(ctx: &ControlContext) -> Result<(), ControlError> {
    let state = ctx.bridge.pull().await?;

    let _guard = ctx.lock_transitions().await;
    ctx.storage.replace_settings(&state.settings).await?;
    if !state.phases.is_empty() {
        ctx.storage.replace_phases(&state.phases).await?;
    }
    if !state.schedule.is_empty() {
        ctx.storage.replace_schedule(&state.schedule).await?;
    }
    info!(
        phases = state.phases.len(),
        items = state.schedule.len(),
        "state replaced from external API"
    );
    Ok(())
}

#[cfg(test)]
#[path = "tests/ops_tests.rs"]
mod tests;
