//! Which end of the connection this engine plays.

/// Connection role.
///
/// Decides the masking direction of frames and which side of the opening
/// handshake is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Initiates the handshake and masks every outgoing frame.
    Client,
    /// Answers the handshake and never masks.
    Server,
}

impl Role {
    /// Whether outgoing frames carry a mask.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Whether incoming frames must carry a mask.
    #[inline]
    #[must_use]
    pub const fn expects_masked(&self) -> bool {
        matches!(self, Role::Server)
    }

    /// The role at the other end of the wire.
    #[inline]
    #[must_use]
    pub const fn peer(&self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_direction() {
        assert!(Role::Client.must_mask());
        assert!(!Role::Server.must_mask());
        assert!(Role::Server.expects_masked());
        assert!(!Role::Client.expects_masked());
    }

    #[test]
    fn test_peer_expects_what_role_sends() {
        for role in [Role::Client, Role::Server] {
            assert_eq!(role.must_mask(), role.peer().expects_masked());
        }
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Client.to_string(), "client");
        assert_eq!(Role::Server.to_string(), "server");
    }
}
