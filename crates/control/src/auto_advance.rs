use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info};

use crate::{clock, ControlContext};
use shared::{domain::ScheduleItem, error::ControlError};

/// Wall-clock poll interval of the loop.
pub const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

/// Spawns the always-running loop that advances the current item when its end
/// time passes. A single failed tick is logged and the loop keeps going; the
/// loop only exits on the shutdown signal.
pub fn spawn(
    ctx: ControlContext,
    zone: Tz,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(%zone, interval_secs = TICK_INTERVAL.as_secs(), "auto-advance loop started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(TICK_INTERVAL) => {
                    if let Err(err) = run_tick(&ctx, zone, Utc::now()).await {
                        error!(%err, "auto-advance tick failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        info!("auto-advance loop stopped");
    })
}

/// One tick of the loop. `now` is injected so the decision is testable
/// without sleeping.
///
/// The pre-lock reads only decide whether an advance is worth attempting;
/// everything they saw is re-validated under the transition lock before the
/// pointer moves.
pub async fn run_tick(
    ctx: &ControlContext,
    zone: Tz,
    now: DateTime<Utc>,
) -> Result<(), ControlError> {
    let settings = ctx.storage.get_settings().await?;
    if settings.is_paused || !settings.auto_advance {
        return Ok(());
    }

    let Some(current) = ctx.storage.current_item().await? else {
        return Ok(());
    };

    let local_now = now.with_timezone(&zone);
    if !clock::has_ended(&current.end_time, &local_now)? {
        return Ok(());
    }

    let _guard = ctx.lock_transitions().await;
    advance_past(ctx, &current).await
}

/// Moves the pointer past `ended`. Caller holds the transition lock; the
/// settings and pointer are read again under it, and a manual command or a
/// pause that landed since the end-time check wins over the tick.
async fn advance_past(ctx: &ControlContext, ended: &ScheduleItem) -> Result<(), ControlError> {
    let settings = ctx.storage.get_settings().await?;
    if settings.is_paused || !settings.auto_advance {
        return Ok(());
    }
    if settings.current_item_id.as_ref() != Some(&ended.id) {
        // An operator moved the pointer since the end-time check.
        return Ok(());
    }

    let items = ctx.storage.list_items().await?;
    let Some(index) = items.iter().position(|item| item.id == ended.id) else {
        // The ended item was deleted; leave it to the next tick.
        return Ok(());
    };

    if index + 1 < items.len() {
        let next = &items[index + 1];
        ctx.storage.set_current(Some(&next.id)).await?;
        info!(
            ended = %ended.title,
            end_time = %ended.end_time,
            next = %next.title,
            "time expired, auto-advanced"
        );
        ctx.request_push();
    } else {
        ctx.storage.set_current(None).await?;
        info!(ended = %ended.title, "event ended, last item completed");
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/auto_advance_tests.rs"]
mod tests;
