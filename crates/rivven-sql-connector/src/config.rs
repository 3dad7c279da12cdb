//! Client configuration
//!
//! ```json
//! {
//!   "connect_timeout_ms": 5000,
//!   "query_timeout_ms": 60000,
//!   "filter_policy": "deny_list",
//!   "release_after_call": false
//! }
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::error::{Error, Result};
use crate::security::FilterPolicy;

/// Connector client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct ClientConfig {
    /// Connection establishment timeout in milliseconds (default: 10000)
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub connect_timeout_ms: u64,

    /// Statement timeout in milliseconds, 0 disables it (default: 30000)
    #[serde(default = "default_query_timeout_ms")]
    #[validate(range(max = 3600000))]
    pub query_timeout_ms: u64,

    /// Screening applied to filter expressions (default: pass_through)
    #[serde(default)]
    pub filter_policy: FilterPolicy,

    /// TLS protocol versions advertised when the credential requires TLS
    ///
    /// Rendered into the connection URI (`enabledTLSProtocols`) and logged.
    /// The mysql_async backend cannot restrict protocol versions, so this
    /// list does not constrain the handshake there; TLS itself is still
    /// enforced.
    #[serde(default = "default_tls_protocols")]
    #[validate(length(min = 1))]
    pub tls_protocols: Vec<String>,

    /// Close the connection at the end of every client call (default: true)
    ///
    /// When false the connection stays open and is revalidated on the next
    /// call.
    #[serde(default = "default_true")]
    pub release_after_call: bool,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_query_timeout_ms() -> u64 {
    30_000
}

fn default_tls_protocols() -> Vec<String> {
    vec!["TLSv1.2".to_string(), "TLSv1.3".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            filter_policy: FilterPolicy::default(),
            tls_protocols: default_tls_protocols(),
            release_after_call: true,
        }
    }
}

impl ClientConfig {
    /// Set connection timeout
    pub fn with_connect_timeout(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Set query timeout
    pub fn with_query_timeout(mut self, ms: u64) -> Self {
        self.query_timeout_ms = ms;
        self
    }

    /// Set the filter policy
    pub fn with_filter_policy(mut self, policy: FilterPolicy) -> Self {
        self.filter_policy = policy;
        self
    }

    /// Keep or release the connection between calls
    pub fn with_release_after_call(mut self, release: bool) -> Self {
        self.release_after_call = release;
        self
    }

    /// Connect timeout as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Query timeout as a duration, `None` when disabled
    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_ms > 0).then(|| Duration::from_millis(self.query_timeout_ms))
    }

    /// Validate ranges, mapping failures to a configuration error
    pub fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|e| Error::config(format!("invalid client configuration: {}", e)))?;
        Ok(self)
    }
}
