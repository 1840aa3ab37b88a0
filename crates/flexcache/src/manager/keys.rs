//! Derived store keys for one flexible entry

/// The value key plus the companion keys derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexKeys {
    value: String,
    created: String,
    lock: String,
}

impl FlexKeys {
    /// Derive keys for `key`, optionally under a namespace
    pub fn new(namespace: Option<&str>, key: &str) -> Self {
        let value = match namespace {
            Some(ns) => format!("{}:{}", ns, key),
            None => key.to_string(),
        };
        Self {
            created: format!("{}:created", value),
            lock: format!("{}:lock", value),
            value,
        }
    }

    /// Key holding the cached value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Key holding the creation timestamp
    pub fn created(&self) -> &str {
        &self.created
    }

    /// Name of the regeneration lock
    pub fn lock(&self) -> &str {
        &self.lock
    }

    /// Value and companion keys in multi-get order
    pub fn pair(&self) -> [&str; 2] {
        [&self.value, &self.created]
    }
}
