use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque client identifier, persisted by the caller in a cookie-like token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReaderIdentity {
    pub reader_id: String,
    /// True when the id was minted by this call and still needs persisting.
    #[serde(skip)]
    pub is_new: bool,
}

impl ReaderIdentity {
    /// Reuses a non-blank persisted token, otherwise mints a fresh id.
    pub fn resolve(token: Option<&str>) -> Self {
        match token.map(str::trim).filter(|token| !token.is_empty()) {
            Some(token) => Self {
                reader_id: token.to_string(),
                is_new: false,
            },
            None => Self {
                reader_id: Uuid::new_v4().to_string(),
                is_new: true,
            },
        }
    }
}
