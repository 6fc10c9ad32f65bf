//! Run DTOs for the submission boundary

use serde::{Deserialize, Serialize};

/// Request to submit a new run
///
/// `model_config` and `parameters` must be JSON object text; the daemon
/// treats them as opaque beyond top-level key/value template variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRun {
    /// Object store path where the script template lives
    pub script_path: String,
    pub model_config: String,
    pub parameters: String,
}
