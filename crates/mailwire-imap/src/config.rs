//! Session configuration types.

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 143).
    StartTls,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }

    /// Returns `true` if the transport is encrypted before the greeting.
    #[must_use]
    pub const fn starts_encrypted(self) -> bool {
        matches!(self, Self::Implicit)
    }
}

/// Policy knobs for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Security mode.
    pub security: Security,
    /// Refuse LOGIN while the transport is unencrypted.
    pub require_tls_for_login: bool,
    /// Refuse extension commands the server did not advertise.
    pub enforce_capabilities: bool,
    /// Prefix character for command tags.
    pub tag_prefix: char,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            security: Security::Implicit,
            require_tls_for_login: true,
            enforce_capabilities: true,
            tag_prefix: 'A',
        }
    }
}

impl SessionConfig {
    /// Creates a configuration with the defaults: implicit TLS, LOGIN only
    /// over TLS, capability gating on, tags prefixed with `A`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Sets whether LOGIN requires an encrypted transport.
    #[must_use]
    pub const fn require_tls_for_login(mut self, require: bool) -> Self {
        self.config.require_tls_for_login = require;
        self
    }

    /// Sets whether unadvertised extension commands are refused locally.
    #[must_use]
    pub const fn enforce_capabilities(mut self, enforce: bool) -> Self {
        self.config.enforce_capabilities = enforce;
        self
    }

    /// Sets the tag prefix.
    #[must_use]
    pub const fn tag_prefix(mut self, prefix: char) -> Self {
        self.config.tag_prefix = prefix;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_security_default_port() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_security_starts_encrypted() {
        assert!(Security::Implicit.starts_encrypted());
        assert!(!Security::StartTls.starts_encrypted());
        assert!(!Security::None.starts_encrypted());
    }

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::new();
        assert_eq!(config.security, Security::Implicit);
        assert!(config.require_tls_for_login);
        assert!(config.enforce_capabilities);
        assert_eq!(config.tag_prefix, 'A');
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::builder()
            .security(Security::StartTls)
            .require_tls_for_login(false)
            .enforce_capabilities(false)
            .tag_prefix('Z')
            .build();
        assert_eq!(config.security, Security::StartTls);
        assert!(!config.require_tls_for_login);
        assert!(!config.enforce_capabilities);
        assert_eq!(config.tag_prefix, 'Z');
    }
}
