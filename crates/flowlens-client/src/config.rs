//! Explicit client configuration.
//!
//! Resolved once (normally from the environment) and passed into
//! constructors. The namespace filter lives here instead of in mutable
//! global state, so clearing it for a session cannot leak into another.

/// Configuration for connecting to a workflow metadata backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the metadata service.
    pub service_url: String,
    /// Namespace filter. `None` means global: runs from every backend and
    /// every user are visible.
    pub namespace: Option<String>,
    /// Name of the default datastore (informational, reported by get_config).
    pub datastore: String,
    /// Active configuration profile, if any.
    pub profile: Option<String>,
}

impl ClientConfig {
    /// Resolve configuration from `FLOWLENS_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            service_url: env_or("FLOWLENS_SERVICE_URL", "http://localhost:8080"),
            namespace: non_empty_env("FLOWLENS_NAMESPACE"),
            datastore: env_or("FLOWLENS_DATASTORE", "local"),
            profile: non_empty_env("FLOWLENS_PROFILE"),
        }
    }

    /// Clear the namespace filter so runs from all backends are visible.
    /// Production runs triggered by schedulers land in namespaces other
    /// than the current user's; a session that should see them starts here.
    pub fn global(mut self) -> Self {
        self.namespace = None;
        self
    }

    /// The namespace a user would scope to by default, e.g. "user:amy".
    pub fn default_user_namespace(&self) -> Option<String> {
        non_empty_env("FLOWLENS_USER")
            .or_else(|| non_empty_env("USER"))
            .map(|user| format!("user:{user}"))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
