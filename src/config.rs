//! Session configuration

use std::sync::Arc;
use std::time::Duration;

use crate::errors::SetupError;
use crate::group::GroupParameters;

/// How long a party waits for the slowest peer at a round barrier by default
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters shared by all participants of a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    group: Arc<GroupParameters>,
    pid: Vec<u8>,
    round_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Constructs config with [default round timeout](DEFAULT_ROUND_TIMEOUT)
    ///
    /// `pid` is the conversation identifier: bytes identifying the set of participants of this
    /// session. It's hashed into the session id and the session key.
    pub fn new(group: Arc<GroupParameters>, pid: impl Into<Vec<u8>>) -> Self {
        Self {
            group,
            pid: pid.into(),
            round_timeout: Some(DEFAULT_ROUND_TIMEOUT),
        }
    }

    /// Constructs config for a group given by hex-encoded `p`, `q`, `g`
    pub fn from_hex_group(
        p: &str,
        q: &str,
        g: &str,
        pid: impl Into<Vec<u8>>,
    ) -> Result<Self, SetupError> {
        let group = GroupParameters::from_hex(p, q, g).map_err(SetupError::InvalidGroup)?;
        Ok(Self::new(Arc::new(group), pid))
    }

    /// Sets how long a party waits for messages of one round
    pub fn with_round_timeout(self, timeout: Duration) -> Self {
        Self {
            round_timeout: Some(timeout),
            ..self
        }
    }

    /// Makes parties wait for messages of one round forever
    pub fn without_round_timeout(self) -> Self {
        Self {
            round_timeout: None,
            ..self
        }
    }

    /// Group parameters
    pub fn group(&self) -> &Arc<GroupParameters> {
        &self.group
    }

    /// Conversation identifier
    pub fn pid(&self) -> &[u8] {
        &self.pid
    }

    /// Round timeout, `None` if parties wait forever
    pub fn round_timeout(&self) -> Option<Duration> {
        self.round_timeout
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use matches::assert_matches;

    use super::{SessionConfig, DEFAULT_ROUND_TIMEOUT};
    use crate::errors::SetupError;
    use crate::group::{GroupError, GroupParameters};

    #[test]
    fn round_timeout_is_configurable() {
        let config = SessionConfig::new(Arc::new(GroupParameters::rfc5114_1024_160()), "pid");
        assert_eq!(config.round_timeout(), Some(DEFAULT_ROUND_TIMEOUT));
        assert_eq!(config.pid(), b"pid");

        let config = config.with_round_timeout(Duration::from_millis(250));
        assert_eq!(config.round_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.without_round_timeout().round_timeout(), None);
    }

    #[test]
    fn malformed_group_is_rejected() {
        assert_matches!(
            SessionConfig::from_hex_group("17", "zz", "4", "pid"),
            Err(SetupError::InvalidGroup(GroupError::MalformedHex { name: "q" }))
        );
        assert_matches!(SessionConfig::from_hex_group("17", "b", "4", "pid"), Ok(_));
    }
}
