use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{EventSettings, ItemId, Phase, PhaseId, ScheduleItem, SETTINGS_ID},
    protocol::{FullState, NewPhase, NewScheduleItem, ScheduleItemPatch, SettingsPatch},
};

/// Persistent store for the three collections: the settings singleton,
/// phases, and schedule items.
///
/// The current-item pointer lives only in `settings.current_item_id`;
/// `ScheduleItem::is_current` is derived against it at read time, so there is
/// a single authoritative write per transition.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                id              TEXT PRIMARY KEY,
                event_name      TEXT NOT NULL,
                event_date      TEXT NOT NULL DEFAULT '',
                is_paused       INTEGER NOT NULL DEFAULT 0,
                auto_advance    INTEGER NOT NULL DEFAULT 1,
                current_item_id TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure settings table exists")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS phases (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                color      TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure phases table exists")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schedule (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                start_time  TEXT NOT NULL,
                end_time    TEXT NOT NULL,
                phase_id    TEXT,
                notes       TEXT NOT NULL DEFAULT '',
                sort_order  INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure schedule table exists")?;

        Ok(())
    }

    /// First-boot data: the settings singleton and the stock phases. Returns
    /// true if anything was created.
    pub async fn seed_defaults(&self) -> Result<bool> {
        let mut created = false;

        let have_settings: Option<String> = sqlx::query_scalar("SELECT id FROM settings WHERE id = ?")
            .bind(SETTINGS_ID)
            .fetch_optional(&self.pool)
            .await?;
        if have_settings.is_none() {
            self.replace_settings(&EventSettings::default()).await?;
            created = true;
        }

        let phase_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM phases")
            .fetch_one(&self.pool)
            .await?;
        if phase_count == 0 {
            let stock = [
                ("Setup", "#3b82f6", 0),
                ("Live", "#ef4444", 1),
                ("Break", "#f59e0b", 2),
                ("Wrap-up", "#71717a", 3),
            ];
            for (name, color, order) in stock {
                self.insert_phase(&NewPhase {
                    name: name.to_string(),
                    color: color.to_string(),
                    order,
                })
                .await?;
            }
            created = true;
        }

        Ok(created)
    }

    // --- settings ---

    pub async fn get_settings(&self) -> Result<EventSettings> {
        let row = sqlx::query(
            "SELECT id, event_name, event_date, is_paused, auto_advance, current_item_id
             FROM settings WHERE id = ?",
        )
        .bind(SETTINGS_ID)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(settings_from_row).unwrap_or_default())
    }

    /// Partial update of the four patchable fields. Each field is a single
    /// conditional assignment, so concurrent patches never read back and
    /// overwrite each other; the pointer column is never touched here.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<EventSettings> {
        self.ensure_settings_row().await?;

        sqlx::query(
            "UPDATE settings SET
                event_name = COALESCE(?, event_name),
                event_date = COALESCE(?, event_date),
                is_paused = COALESCE(?, is_paused),
                auto_advance = COALESCE(?, auto_advance)
             WHERE id = ?",
        )
        .bind(patch.event_name.as_deref())
        .bind(patch.event_date.as_deref())
        .bind(patch.is_paused)
        .bind(patch.auto_advance)
        .bind(SETTINGS_ID)
        .execute(&self.pool)
        .await?;

        self.get_settings().await
    }

    /// Atomically flips the pause flag and returns the new value.
    pub async fn toggle_pause(&self) -> Result<bool> {
        self.ensure_settings_row().await?;

        sqlx::query("UPDATE settings SET is_paused = NOT is_paused WHERE id = ?")
            .bind(SETTINGS_ID)
            .execute(&self.pool)
            .await?;

        Ok(self.get_settings().await?.is_paused)
    }

    /// Materializes the settings singleton with defaults if it is missing.
    async fn ensure_settings_row(&self) -> Result<()> {
        let defaults = EventSettings::default();
        sqlx::query(
            "INSERT OR IGNORE INTO settings (id, event_name, event_date, is_paused, auto_advance, current_item_id)
             VALUES (?, ?, ?, ?, ?, NULL)",
        )
        .bind(SETTINGS_ID)
        .bind(&defaults.event_name)
        .bind(&defaults.event_date)
        .bind(defaults.is_paused)
        .bind(defaults.auto_advance)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upserts the full settings row. The stored identity is always the
    /// singleton id, whatever the payload carried.
    pub async fn replace_settings(&self, settings: &EventSettings) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (id, event_name, event_date, is_paused, auto_advance, current_item_id)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                event_name = excluded.event_name,
                event_date = excluded.event_date,
                is_paused = excluded.is_paused,
                auto_advance = excluded.auto_advance,
                current_item_id = excluded.current_item_id",
        )
        .bind(SETTINGS_ID)
        .bind(&settings.event_name)
        .bind(&settings.event_date)
        .bind(settings.is_paused)
        .bind(settings.auto_advance)
        .bind(settings.current_item_id.as_ref().map(|id| id.0.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The single authoritative write of the current-item pointer.
    pub async fn set_current(&self, item_id: Option<&ItemId>) -> Result<()> {
        let defaults = EventSettings::default();
        sqlx::query(
            "INSERT INTO settings (id, event_name, event_date, is_paused, auto_advance, current_item_id)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET current_item_id = excluded.current_item_id",
        )
        .bind(SETTINGS_ID)
        .bind(&defaults.event_name)
        .bind(&defaults.event_date)
        .bind(defaults.is_paused)
        .bind(defaults.auto_advance)
        .bind(item_id.map(|id| id.0.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn current_item(&self) -> Result<Option<ScheduleItem>> {
        let row = sqlx::query(
            "SELECT id, title, description, start_time, end_time, phase_id, notes, sort_order
             FROM schedule
             WHERE id = (SELECT current_item_id FROM settings WHERE id = ?)",
        )
        .bind(SETTINGS_ID)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| item_from_row(r, true)))
    }

    // --- phases ---

    pub async fn list_phases(&self) -> Result<Vec<Phase>> {
        let rows = sqlx::query(
            "SELECT id, name, color, sort_order FROM phases ORDER BY sort_order ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(phase_from_row).collect())
    }

    pub async fn insert_phase(&self, new: &NewPhase) -> Result<Phase> {
        let phase = Phase {
            id: PhaseId::generate(),
            name: new.name.clone(),
            color: new.color.clone(),
            order: new.order,
        };
        sqlx::query("INSERT INTO phases (id, name, color, sort_order) VALUES (?, ?, ?, ?)")
            .bind(&phase.id.0)
            .bind(&phase.name)
            .bind(&phase.color)
            .bind(phase.order)
            .execute(&self.pool)
            .await?;
        Ok(phase)
    }

    pub async fn update_phase(&self, phase_id: &PhaseId, update: &NewPhase) -> Result<Option<Phase>> {
        let updated = sqlx::query(
            "UPDATE phases SET name = ?, color = ?, sort_order = ? WHERE id = ?",
        )
        .bind(&update.name)
        .bind(&update.color)
        .bind(update.order)
        .bind(&phase_id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        Ok(Some(Phase {
            id: phase_id.clone(),
            name: update.name.clone(),
            color: update.color.clone(),
            order: update.order,
        }))
    }

    /// Deletes a phase. Schedule items keep whatever `phase_id` they carry;
    /// dangling references are left as-is.
    pub async fn delete_phase(&self, phase_id: &PhaseId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM phases WHERE id = ?")
            .bind(&phase_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    pub async fn replace_phases(&self, phases: &[Phase]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM phases").execute(&mut *tx).await?;
        for phase in phases {
            sqlx::query("INSERT INTO phases (id, name, color, sort_order) VALUES (?, ?, ?, ?)")
                .bind(&phase.id.0)
                .bind(&phase.name)
                .bind(&phase.color)
                .bind(phase.order)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // --- schedule ---

    pub async fn list_items(&self) -> Result<Vec<ScheduleItem>> {
        let current_id = self.get_settings().await?.current_item_id;
        let rows = sqlx::query(
            "SELECT id, title, description, start_time, end_time, phase_id, notes, sort_order
             FROM schedule ORDER BY sort_order ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let is_current = current_id
                    .as_ref()
                    .is_some_and(|id| id.0 == r.get::<String, _>(0));
                item_from_row(r, is_current)
            })
            .collect())
    }

    pub async fn find_item(&self, item_id: &ItemId) -> Result<Option<ScheduleItem>> {
        let current_id = self.get_settings().await?.current_item_id;
        let row = sqlx::query(
            "SELECT id, title, description, start_time, end_time, phase_id, notes, sort_order
             FROM schedule WHERE id = ?",
        )
        .bind(&item_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| item_from_row(r, current_id.as_ref() == Some(item_id))))
    }

    /// Appends a new item at `max(order) + 1` (0 on an empty schedule).
    pub async fn insert_item(&self, new: &NewScheduleItem) -> Result<ScheduleItem> {
        let max_order: Option<i64> = sqlx::query_scalar("SELECT MAX(sort_order) FROM schedule")
            .fetch_one(&self.pool)
            .await?;
        let item = ScheduleItem {
            id: ItemId::generate(),
            title: new.title.clone(),
            description: new.description.clone(),
            start_time: new.start_time.clone(),
            end_time: new.end_time.clone(),
            phase_id: new.phase_id.clone(),
            notes: new.notes.clone(),
            order: max_order.map_or(0, |max| max + 1),
            is_current: false,
        };
        sqlx::query(
            "INSERT INTO schedule (id, title, description, start_time, end_time, phase_id, notes, sort_order)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id.0)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.start_time)
        .bind(&item.end_time)
        .bind(item.phase_id.as_ref().map(|id| id.0.as_str()))
        .bind(&item.notes)
        .bind(item.order)
        .execute(&self.pool)
        .await?;
        Ok(item)
    }

    pub async fn update_item(
        &self,
        item_id: &ItemId,
        patch: &ScheduleItemPatch,
    ) -> Result<Option<ScheduleItem>> {
        let Some(mut item) = self.find_item(item_id).await? else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            item.title = title.clone();
        }
        if let Some(description) = &patch.description {
            item.description = description.clone();
        }
        if let Some(start_time) = &patch.start_time {
            item.start_time = start_time.clone();
        }
        if let Some(end_time) = &patch.end_time {
            item.end_time = end_time.clone();
        }
        if let Some(phase_id) = &patch.phase_id {
            item.phase_id = Some(phase_id.clone());
        }
        if let Some(notes) = &patch.notes {
            item.notes = notes.clone();
        }
        if let Some(order) = patch.order {
            item.order = order;
        }

        sqlx::query(
            "UPDATE schedule
             SET title = ?, description = ?, start_time = ?, end_time = ?, phase_id = ?, notes = ?, sort_order = ?
             WHERE id = ?",
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.start_time)
        .bind(&item.end_time)
        .bind(item.phase_id.as_ref().map(|id| id.0.as_str()))
        .bind(&item.notes)
        .bind(item.order)
        .bind(&item.id.0)
        .execute(&self.pool)
        .await?;
        Ok(Some(item))
    }

    pub async fn delete_item(&self, item_id: &ItemId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM schedule WHERE id = ?")
            .bind(&item_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    /// Rewrites `order` positionally from an ordered id list. Unknown ids are
    /// skipped without error.
    pub async fn reorder_items(&self, ordered_ids: &[ItemId]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (index, item_id) in ordered_ids.iter().enumerate() {
            sqlx::query("UPDATE schedule SET sort_order = ? WHERE id = ?")
                .bind(index as i64)
                .bind(&item_id.0)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Wholesale replacement for pull-sync: every existing item is dropped and
    /// the fetched ones inserted verbatim. Per-item `is_current` flags in the
    /// payload are ignored; the pointer comes from the settings record.
    pub async fn replace_schedule(&self, items: &[ScheduleItem]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM schedule").execute(&mut *tx).await?;
        for item in items {
            sqlx::query(
                "INSERT INTO schedule (id, title, description, start_time, end_time, phase_id, notes, sort_order)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.id.0)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.start_time)
            .bind(&item.end_time)
            .bind(item.phase_id.as_ref().map(|id| id.0.as_str()))
            .bind(&item.notes)
            .bind(item.order)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Snapshot of the whole store, as pushed to the external state API.
    pub async fn full_state(&self) -> Result<FullState> {
        Ok(FullState {
            settings: self.get_settings().await?,
            phases: self.list_phases().await?,
            schedule: self.list_items().await?,
            timestamp: Utc::now(),
        })
    }
}

fn settings_from_row(row: sqlx::sqlite::SqliteRow) -> EventSettings {
    EventSettings {
        id: row.get::<String, _>(0),
        event_name: row.get::<String, _>(1),
        event_date: row.get::<String, _>(2),
        is_paused: row.get::<bool, _>(3),
        auto_advance: row.get::<bool, _>(4),
        current_item_id: row.get::<Option<String>, _>(5).map(ItemId),
    }
}

fn phase_from_row(row: sqlx::sqlite::SqliteRow) -> Phase {
    Phase {
        id: PhaseId(row.get::<String, _>(0)),
        name: row.get::<String, _>(1),
        color: row.get::<String, _>(2),
        order: row.get::<i64, _>(3),
    }
}

fn item_from_row(row: sqlx::sqlite::SqliteRow, is_current: bool) -> ScheduleItem {
    ScheduleItem {
        id: ItemId(row.get::<String, _>(0)),
        title: row.get::<String, _>(1),
        description: row.get::<String, _>(2),
        start_time: row.get::<String, _>(3),
        end_time: row.get::<String, _>(4),
        phase_id: row.get::<Option<String>, _>(5).map(PhaseId),
        notes: row.get::<String, _>(6),
        order: row.get::<i64, _>(7),
        is_current,
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
