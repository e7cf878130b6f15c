//! Remembered selection types
//!
//! Serialized to JSON and persisted between runs.

use serde::{Deserialize, Serialize};

/// The course used by the most recent run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMemory {
    /// Course ID
    pub course_id: String,

    /// Course title, when it was known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
}

impl SessionMemory {
    /// Remember a course by ID
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            course_name: None,
        }
    }

    /// Attach the course title
    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.course_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    /// `Name (id)` when the name is known, else the ID
    pub fn label(&self) -> String {
        match &self.course_name {
            Some(name) => format!("{name} ({})", self.course_id),
            None => self.course_id.clone(),
        }
    }
}
