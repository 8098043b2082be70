//! Coordinator configuration

/// Configuration for a [`Coordinator`]
///
/// [`Coordinator`]: crate::Coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Server id stamped into transaction metadata; scopes the recovery
    /// sweep to this server's own orphans
    pub server_id: Option<String>,

    /// TTL for resource locks, in milliseconds
    ///
    /// Must exceed the worst-case transaction duration: if a lock expires
    /// while its holder is still alive, a second coordinator may acquire
    /// the same logical resource. That tradeoff is documented, not
    /// enforced.
    pub lock_ttl_ms: u64,

    /// Prefix prepended to every resource lock key, so coordinators for
    /// different realms/shards sharing one storage backend cannot contend
    pub lock_key_prefix: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            server_id: None,
            lock_ttl_ms: 30_000,
            lock_key_prefix: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server id recorded in transaction metadata
    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    /// Set the lock TTL in milliseconds
    pub fn with_lock_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.lock_ttl_ms = ttl_ms;
        self
    }

    /// Set the prefix prepended to every resource lock key
    pub fn with_lock_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lock_key_prefix = Some(prefix.into());
        self
    }
}
