use serde::{Deserialize, Serialize};

/// Descriptive fields for one entity in the external user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryProfile {
    pub client_id: i64,
    pub zipcode: Option<String>,
    /// 0/1; None when the directory does not carry the flag
    pub is_enabled: Option<i16>,
}
