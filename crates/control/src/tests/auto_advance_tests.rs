use super::*;
use chrono::TimeZone as _;
use chrono_tz::Tz;
use shared::{domain::ScheduleItem, protocol::{NewScheduleItem, SettingsPatch}};
use storage::Storage;
use sync::{SyncBridge, SyncHandle};
use tokio::sync::mpsc;

const ZONE: Tz = chrono_tz::Europe::Berlin;

async fn setup() -> (ControlContext, mpsc::Receiver<()>) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let (pusher, push_rx) = SyncHandle::channel();
    let ctx = ControlContext::new(storage, SyncBridge::new(None), pusher);
    (ctx, push_rx)
}

async fn add(ctx: &ControlContext, title: &str, end_time: &str) -> ScheduleItem {
    ctx.storage
        .insert_item(&NewScheduleItem {
            title: title.to_string(),
            description: String::new(),
            start_time: "08:00".to_string(),
            end_time: end_time.to_string(),
            phase_id: None,
            notes: String::new(),
        })
        .await
        .expect("insert")
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    ZONE.with_ymd_and_hms(2026, 1, 15, hour, minute, 0)
        .unwrap()
        .with_timezone(&Utc)
}

async fn current_id(ctx: &ControlContext) -> Option<shared::domain::ItemId> {
    ctx.storage
        .get_settings()
        .await
        .expect("settings")
        .current_item_id
}

#[tokio::test]
async fn tick_advances_past_an_ended_item_and_queues_one_push() {
    let (ctx, mut push_rx) = setup().await;
    let a = add(&ctx, "a", "09:00").await;
    let b = add(&ctx, "b", "10:00").await;
    ctx.storage.set_current(Some(&a.id)).await.expect("current");

    run_tick(&ctx, ZONE, at(9, 1)).await.expect("tick");

    assert_eq!(current_id(&ctx).await, Some(b.id));
    assert!(push_rx.try_recv().is_ok(), "one push should be queued");
    assert!(push_rx.try_recv().is_err(), "only one push per transition");
}

#[tokio::test]
async fn tick_does_nothing_before_the_end_time() {
    let (ctx, _rx) = setup().await;
    let a = add(&ctx, "a", "09:00").await;
    add(&ctx, "b", "10:00").await;
    ctx.storage.set_current(Some(&a.id)).await.expect("current");

    run_tick(&ctx, ZONE, at(8, 59)).await.expect("tick");

    assert_eq!(current_id(&ctx).await, Some(a.id));
}

#[tokio::test]
async fn tick_clears_the_pointer_after_the_last_item() {
    let (ctx, mut push_rx) = setup().await;
    let a = add(&ctx, "a", "09:00").await;
    let b = add(&ctx, "b", "10:00").await;
    ctx.storage.set_current(Some(&b.id)).await.expect("current");
    while push_rx.try_recv().is_ok() {}

    run_tick(&ctx, ZONE, at(10, 1)).await.expect("tick");

    assert_eq!(current_id(&ctx).await, None);
    assert!(push_rx.try_recv().is_err(), "end of show does not push");

    // A later manual `next` restarts the show from the first item.
    let restarted = crate::next(&ctx).await.expect("next").expect("item");
    assert_eq!(restarted.id, a.id);
}

#[tokio::test]
async fn tick_is_suppressed_while_paused() {
    let (ctx, _rx) = setup().await;
    let a = add(&ctx, "a", "09:00").await;
    add(&ctx, "b", "10:00").await;
    ctx.storage.set_current(Some(&a.id)).await.expect("current");
    ctx.storage
        .update_settings(&SettingsPatch {
            is_paused: Some(true),
            ..Default::default()
        })
        .await
        .expect("pause");

    run_tick(&ctx, ZONE, at(9, 30)).await.expect("tick");
    assert_eq!(current_id(&ctx).await, Some(a.id.clone()));

    // Unpausing resumes the check on the next tick.
    ctx.storage
        .update_settings(&SettingsPatch {
            is_paused: Some(false),
            ..Default::default()
        })
        .await
        .expect("unpause");
    run_tick(&ctx, ZONE, at(9, 30)).await.expect("tick");
    assert_ne!(current_id(&ctx).await, Some(a.id));
}

#[tokio::test]
async fn tick_is_suppressed_with_auto_advance_disabled() {
    let (ctx, _rx) = setup().await;
    let a = add(&ctx, "a", "09:00").await;
    add(&ctx, "b", "10:00").await;
    ctx.storage.set_current(Some(&a.id)).await.expect("current");
    ctx.storage
        .update_settings(&SettingsPatch {
            auto_advance: Some(false),
            ..Default::default()
        })
        .await
        .expect("disable");

    run_tick(&ctx, ZONE, at(9, 30)).await.expect("tick");
    assert_eq!(current_id(&ctx).await, Some(a.id));
}

#[tokio::test]
async fn tick_skips_when_nothing_is_current() {
    let (ctx, _rx) = setup().await;
    add(&ctx, "a", "09:00").await;

    run_tick(&ctx, ZONE, at(9, 30)).await.expect("tick");
    assert_eq!(current_id(&ctx).await, None);
}

#[tokio::test]
async fn tick_reports_malformed_end_times() {
    let (ctx, _rx) = setup().await;
    let a = add(&ctx, "a", "abc").await;
    ctx.storage.set_current(Some(&a.id)).await.expect("current");

    let err = run_tick(&ctx, ZONE, at(9, 30)).await.expect_err("should fail");
    assert!(matches!(err, ControlError::InvalidTimeFormat(_)));
    // The pointer is untouched; the loop will retry on the next tick.
    assert_eq!(current_id(&ctx).await, Some(a.id));
}

#[tokio::test]
async fn advance_yields_to_a_manual_jump_after_the_end_time_check() {
    let (ctx, mut push_rx) = setup().await;
    let a = add(&ctx, "a", "09:00").await;
    add(&ctx, "b", "10:00").await;
    let c = add(&ctx, "c", "11:00").await;
    ctx.storage.set_current(Some(&a.id)).await.expect("current");

    // The end-time check saw `a` as current and ended; before the advance
    // could take the lock an operator jumped to `c`.
    ctx.storage.set_current(Some(&c.id)).await.expect("jump");

    advance_past(&ctx, &a).await.expect("advance");

    assert_eq!(current_id(&ctx).await, Some(c.id));
    assert!(push_rx.try_recv().is_err(), "a yielded advance queues no push");
}

#[tokio::test]
async fn advance_yields_to_a_pause_after_the_end_time_check() {
    let (ctx, _rx) = setup().await;
    let a = add(&ctx, "a", "09:00").await;
    add(&ctx, "b", "10:00").await;
    ctx.storage.set_current(Some(&a.id)).await.expect("current");
    ctx.storage
        .update_settings(&SettingsPatch {
            is_paused: Some(true),
            ..Default::default()
        })
        .await
        .expect("pause");

    advance_past(&ctx, &a).await.expect("advance");

    assert_eq!(current_id(&ctx).await, Some(a.id));
}

#[tokio::test]
async fn loop_stops_on_shutdown_signal() {
    let (ctx, _rx) = setup().await;
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let handle = spawn(ctx, ZONE, shutdown_rx);
    shutdown_tx.send(true).expect("signal");
    handle.await.expect("loop exits");
}
