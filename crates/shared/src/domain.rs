use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(ItemId);
id_newtype!(PhaseId);

/// Fixed identity of the singleton settings record.
pub const SETTINGS_ID: &str = "main";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub phase_id: Option<PhaseId>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub order: i64,
    /// Derived at read time from `EventSettings::current_item_id`; never stored.
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    pub id: String,
    pub event_name: String,
    #[serde(default)]
    pub event_date: String,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default = "default_true")]
    pub auto_advance: bool,
    #[serde(default)]
    pub current_item_id: Option<ItemId>,
}

fn default_true() -> bool {
    true
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            id: SETTINGS_ID.to_string(),
            event_name: "Event Dashboard".to_string(),
            event_date: String::new(),
            is_paused: false,
            auto_advance: true,
            current_item_id: None,
        }
    }
}
