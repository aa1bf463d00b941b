use crate::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const QUICK_DURATION_SECS: u64 = 60;
pub const QUICK_CATEGORY: &str = "Quick";
const UNNAMED_LABEL: &str = "Unnamed Timer";
const NO_CATEGORY_LABEL: &str = "No Category";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub duration: u64,
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub halfway_reached: bool,
}

impl Timer {
    pub fn new(name: String, duration: u64, category: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            category,
            duration,
            time: 0,
            running: false,
            halfway_reached: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.time >= self.duration
    }

    pub fn remaining(&self) -> u64 {
        self.duration.saturating_sub(self.time)
    }

    /// Fraction of the duration already elapsed, capped at 1.0.
    pub fn progress(&self) -> f64 {
        if self.duration == 0 {
            return 1.0;
        }
        (self.time as f64 / self.duration as f64).min(1.0)
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            UNNAMED_LABEL
        } else {
            &self.name
        }
    }

    pub fn display_category(&self) -> &str {
        match self.category.as_deref() {
            Some(category) if !category.trim().is_empty() => category,
            _ => NO_CATEGORY_LABEL,
        }
    }

    pub(crate) fn clear_progress(&mut self) {
        self.time = 0;
        self.running = false;
        self.halfway_reached = false;
    }
}

/// What the caller wants created.
#[derive(Debug, Clone)]
pub enum TimerSpec {
    Quick,
    Form(NewTimerForm),
}

/// Raw add-timer form input, every field as typed by the user. A JSON number
/// is accepted for `duration` and checked like its text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTimerForm {
    pub name: String,
    #[serde(deserialize_with = "duration_text")]
    pub duration: String,
    pub category: String,
}

fn duration_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl NewTimerForm {
    pub fn validate(&self) -> Result<(String, u64, String), ValidationError> {
        let name = self.name.trim();
        let duration = self.duration.trim();
        let category = self.category.trim();
        if name.is_empty() || duration.is_empty() || category.is_empty() {
            return Err(ValidationError::MissingFields);
        }

        let seconds = duration
            .parse::<u64>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or_else(|| ValidationError::InvalidDuration(duration.to_string()))?;

        Ok((name.to_string(), seconds, category.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub timer_id: String,
    pub name: String,
    pub completed_at: DateTime<Utc>,
}

/// The persisted document: one key per collection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppData {
    pub timers: Vec<Timer>,
    pub history: Vec<CompletionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimerView {
    pub id: String,
    pub name: String,
    pub category: String,
    pub duration: u64,
    pub time: u64,
    pub remaining: u64,
    pub running: bool,
    pub halfway_reached: bool,
    pub progress: f64,
    pub display_time: String,
}

impl From<&Timer> for TimerView {
    fn from(timer: &Timer) -> Self {
        Self {
            id: timer.id.clone(),
            name: timer.display_name().to_string(),
            category: timer.display_category().to_string(),
            duration: timer.duration,
            time: timer.time,
            remaining: timer.remaining(),
            running: timer.running,
            halfway_reached: timer.halfway_reached,
            progress: timer.progress(),
            display_time: format_clock(timer.time),
        }
    }
}

/// Formats seconds as `MM:SS`; minutes grow past two digits as needed.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
