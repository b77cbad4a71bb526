//! Common types used throughout Commerce RS

use serde::{Deserialize, Serialize};

/// Primary key type
pub type Id = i64;

/// A tenant of a multi-site installation.
///
/// Passed explicitly to operations that namespace their output per site
/// (for example work area allocation) instead of being read from a
/// request-scoped global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: Id,
    pub name: Option<String>,
}

impl Site {
    pub fn new(id: Id) -> Self {
        Self { id, name: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Directory segment holding every file of this site, e.g. `site-42`
    pub fn directory_name(&self) -> String {
        format!("site-{}", self.id)
    }
}
