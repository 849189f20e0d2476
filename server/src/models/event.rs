use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_mode", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventMode {
    Online,
    Offline,
    Hybrid,
}

impl FromStr for EventMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(EventMode::Online),
            "offline" => Ok(EventMode::Offline),
            "hybrid" => Ok(EventMode::Hybrid),
            other => Err(AppError::ValidationError(format!(
                "Invalid mode '{}': expected online, offline or hybrid",
                other
            ))),
        }
    }
}

/// A listed event.
///
/// `slug`, `title` and `creator_email` never change after creation; the
/// store's update statement does not touch them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub overview: String,
    pub venue: String,
    pub location: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub mode: EventMode,
    pub audience: String,
    pub organizer: String,
    pub tags: Vec<String>,
    pub agenda: Vec<String>,
    pub image: String,
    pub creator_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn shares_tag_with(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|tag| tags.contains(tag))
    }
}

/// Raw form fields for creating or editing an event.
///
/// Every field is optional here; `into_new_event` and `into_changes`
/// decide what is required. `tags` and `agenda` hold either a JSON array
/// or a comma/newline separated list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFields {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub overview: Option<String>,
    pub venue: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub mode: Option<String>,
    pub audience: Option<String>,
    pub organizer: Option<String>,
    pub tags: Option<String>,
    pub agenda: Option<String>,
}

/// Validated input for a new event.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub overview: String,
    pub venue: String,
    pub location: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub mode: EventMode,
    pub audience: String,
    pub organizer: String,
    pub tags: Vec<String>,
    pub agenda: Vec<String>,
}

/// Validated partial update. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventChanges {
    pub description: Option<String>,
    pub overview: Option<String>,
    pub venue: Option<String>,
    pub location: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub mode: Option<EventMode>,
    pub audience: Option<String>,
    pub organizer: Option<String>,
    pub tags: Option<Vec<String>>,
    pub agenda: Option<Vec<String>>,
}

impl EventFields {
    pub fn into_new_event(self) -> Result<NewEvent, AppError> {
        let mut missing = Vec::new();
        let mut take = |name: &'static str, value: Option<String>| -> String {
            match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let title = take("title", self.title);
        let description = take("description", self.description);
        let overview = take("overview", self.overview);
        let venue = take("venue", self.venue);
        let location = take("location", self.location);
        let date = take("date", self.date);
        let time = take("time", self.time);
        let mode = take("mode", self.mode);
        let audience = take("audience", self.audience);
        let organizer = take("organizer", self.organizer);
        let tags = parse_tags(self.tags.as_deref().unwrap_or_default());
        let agenda = parse_list(self.agenda.as_deref().unwrap_or_default());

        if tags.is_empty() {
            missing.push("tags");
        }
        if agenda.is_empty() {
            missing.push("agenda");
        }
        if !missing.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        Ok(NewEvent {
            title,
            description,
            overview,
            venue,
            location,
            date: parse_date(&date)?,
            time: parse_time(&time)?,
            mode: mode.parse()?,
            audience,
            organizer,
            tags,
            agenda,
        })
    }

    /// Validates an edit. Title and slug are immutable and rejected outright.
    pub fn into_changes(self) -> Result<EventChanges, AppError> {
        if self.title.is_some() || self.slug.is_some() {
            return Err(AppError::ValidationError(
                "Title and slug cannot be changed after creation".to_string(),
            ));
        }

        let non_empty = |name: &str, value: Option<String>| -> Result<Option<String>, AppError> {
            match value {
                None => Ok(None),
                Some(v) if v.trim().is_empty() => Err(AppError::ValidationError(format!(
                    "Field '{}' cannot be empty",
                    name
                ))),
                Some(v) => Ok(Some(v.trim().to_string())),
            }
        };

        let tags = match self.tags {
            None => None,
            Some(raw) => {
                let tags = parse_tags(&raw);
                if tags.is_empty() {
                    return Err(AppError::ValidationError(
                        "At least one tag is required".to_string(),
                    ));
                }
                Some(tags)
            }
        };
        let agenda = match self.agenda {
            None => None,
            Some(raw) => {
                let agenda = parse_list(&raw);
                if agenda.is_empty() {
                    return Err(AppError::ValidationError(
                        "At least one agenda item is required".to_string(),
                    ));
                }
                Some(agenda)
            }
        };

        Ok(EventChanges {
            description: non_empty("description", self.description)?,
            overview: non_empty("overview", self.overview)?,
            venue: non_empty("venue", self.venue)?,
            location: non_empty("location", self.location)?,
            date: non_empty("date", self.date)?
                .map(|d| parse_date(&d))
                .transpose()?,
            time: non_empty("time", self.time)?
                .map(|t| parse_time(&t))
                .transpose()?,
            mode: non_empty("mode", self.mode)?
                .map(|m| m.parse::<EventMode>())
                .transpose()?,
            audience: non_empty("audience", self.audience)?,
            organizer: non_empty("organizer", self.organizer)?,
            tags,
            agenda,
        })
    }
}

impl EventChanges {
    pub fn apply_to(self, event: &mut Event) {
        if let Some(v) = self.description {
            event.description = v;
        }
        if let Some(v) = self.overview {
            event.overview = v;
        }
        if let Some(v) = self.venue {
            event.venue = v;
        }
        if let Some(v) = self.location {
            event.location = v;
        }
        if let Some(v) = self.date {
            event.date = v;
        }
        if let Some(v) = self.time {
            event.time = v;
        }
        if let Some(v) = self.mode {
            event.mode = v;
        }
        if let Some(v) = self.audience {
            event.audience = v;
        }
        if let Some(v) = self.organizer {
            event.organizer = v;
        }
        if let Some(v) = self.tags {
            event.tags = v;
        }
        if let Some(v) = self.agenda {
            event.agenda = v;
        }
    }
}

/// Splits a JSON array or a comma/newline separated list into trimmed,
/// non-empty items.
pub fn parse_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed) {
            return items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect();
        }
    }

    trimmed
        .split(|c| c == ',' || c == '\n')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in parse_list(raw) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::ValidationError(format!("Invalid date '{}': expected YYYY-MM-DD", raw))
    })
}

fn parse_time(raw: &str) -> Result<NaiveTime, AppError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| AppError::ValidationError(format!("Invalid time '{}': expected HH:MM", raw)))
}
