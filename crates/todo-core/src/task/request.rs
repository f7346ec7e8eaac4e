//! Task request payloads and client-side validation.

use super::model::Task;
use crate::error::{ApiError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const TITLE_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 1000;

/// Body of `POST /api/tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Rejects payloads the server would refuse, before a request is made.
    pub fn validate(&self) -> Result<()> {
        let mut details = Map::new();
        check_title(&self.title, &mut details);
        check_description(self.description.as_deref(), &mut details);
        finish(details)
    }
}

/// Body of `PUT /api/tasks/:id`. Only the fields that are set are sent.
///
/// `description` and `due_date` are double options: `Some(None)` clears the
/// value on the server, `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl TaskPatch {
    pub fn completed(is_completed: bool) -> Self {
        Self {
            is_completed: Some(is_completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.is_completed.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ApiError::validation("At least one field required", Value::Null).into());
        }

        let mut details = Map::new();
        if let Some(title) = &self.title {
            check_title(title, &mut details);
        }
        if let Some(description) = &self.description {
            check_description(description.as_deref(), &mut details);
        }
        finish(details)
    }

    /// Applies the patch to a task. Returns whether anything changed.
    pub fn apply_to(&self, task: &mut Task) -> bool {
        let before = task.clone();
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(due_date) = &self.due_date {
            task.due_date = *due_date;
        }
        if let Some(is_completed) = self.is_completed {
            task.is_completed = is_completed;
        }
        *task != before
    }
}

/// Filter for the task list; part of the list's cache key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskFilter {
    pub completed: Option<bool>,
}

impl TaskFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn completed() -> Self {
        Self {
            completed: Some(true),
        }
    }

    pub fn active() -> Self {
        Self {
            completed: Some(false),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.completed.is_none_or(|completed| task.is_completed == completed)
    }
}

/// Deserializes a field that is present (possibly `null`) as `Some(..)`.
pub fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn check_title(title: &str, details: &mut Map<String, Value>) {
    if title.trim().is_empty() {
        details.insert("title".into(), Value::from("Title is required"));
    } else if title.chars().count() > TITLE_MAX_LEN {
        details.insert(
            "title".into(),
            Value::from(format!("Title must be at most {TITLE_MAX_LEN} characters")),
        );
    }
}

fn check_description(description: Option<&str>, details: &mut Map<String, Value>) {
    if description.is_some_and(|d| d.chars().count() > DESCRIPTION_MAX_LEN) {
        details.insert(
            "description".into(),
            Value::from(format!(
                "Description must be at most {DESCRIPTION_MAX_LEN} characters"
            )),
        );
    }
}

fn finish(details: Map<String, Value>) -> Result<()> {
    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation("Validation failed", Value::Object(details)).into())
    }
}
