use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EventSettings, Phase, PhaseId, ScheduleItem};

/// Complete snapshot exchanged with the external state API.
///
/// `GET` on the external endpoint returns this shape; `POST` accepts it and is
/// expected to serve it back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullState {
    pub settings: EventSettings,
    pub phases: Vec<Phase>,
    pub schedule: Vec<ScheduleItem>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScheduleItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub phase_id: Option<PhaseId>,
    #[serde(default)]
    pub notes: String,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub phase_id: Option<PhaseId>,
    pub notes: Option<String>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPhase {
    pub name: String,
    #[serde(default = "default_phase_color")]
    pub color: String,
    #[serde(default)]
    pub order: i64,
}

fn default_phase_color() -> String {
    "#3b82f6".to_string()
}

/// Partial settings update. The current-item pointer is deliberately not
/// patchable here; it moves only through the control transitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub event_name: Option<String>,
    pub event_date: Option<String>,
    pub is_paused: Option<bool>,
    pub auto_advance: Option<bool>,
}
