//! Import/export of the settings document as a JSON file.

use tracing::warn;

use crate::error::Result;
use crate::models::Setting;

/// File name offered when the dashboard exports its settings.
pub const EXPORT_FILE_NAME: &str = "candi-tab-settings.json";

/// Serializes a document the way it is persisted and uploaded.
pub fn export_document(setting: &Setting) -> Result<String> {
    Ok(serde_json::to_string(setting)?)
}

/// Parses a user-supplied or remote document. Malformed input yields `None`.
pub fn parse_document(raw: &str) -> Option<Setting> {
    match serde_json::from_str::<Setting>(raw) {
        Ok(setting) => Some(setting),
        Err(err) => {
            warn!(error = %err, "ignoring malformed settings document");
            None
        }
    }
}
