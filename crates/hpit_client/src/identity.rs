use std::fmt;

/// Credentials a plugin presents to the hub on every call.
///
/// Both values are opaque to the client and fixed once the identity is built.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    entity_id: String,
    api_key: String,
}

impl Identity {
    pub fn new(entity_id: impl ToString, api_key: impl ToString) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

// keep the key out of logs
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("entity_id", &self.entity_id)
            .field("api_key", &"***")
            .finish()
    }
}
