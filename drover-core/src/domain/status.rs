//! Status domain types

use serde::{Deserialize, Serialize};

/// A named lifecycle state row, deduplicated by name.
///
/// Looked up with get-or-create semantics: fetching a status by name creates
/// the row if absent and never produces duplicates. Runs reference exactly
/// one status at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: i64,
    pub name: String,
}
