use std::collections::HashMap;

use crate::directory::DirectoryProfile;
use crate::errors::Result;

/// Trait defining the contract for the external user-directory lookup.
///
/// The lookup is best-effort supplementary data: ids absent from the result
/// are not an error, and callers fall back to previously stored fields.
pub trait DirectoryLookupTrait: Send + Sync {
    /// Fetch profiles for the given entity ids, batched in bounded chunks.
    fn fetch_profiles(&self, client_ids: &[i64]) -> Result<HashMap<i64, DirectoryProfile>>;
}
