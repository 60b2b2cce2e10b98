//! Close status codes and close-frame payloads as defined in RFC 6455.

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection successfully completed.
    #[default]
    Normal,
    /// Going away (1001). Endpoint is going away (e.g., server shutdown, browser navigating away).
    GoingAway,
    /// Protocol error (1002). Endpoint received a malformed frame or protocol violation.
    ProtocolError,
    /// Unsupported data (1003). Endpoint received data type it cannot handle.
    UnsupportedData,
    /// No status received (1005). The close frame carried no code.
    NoStatus,
    /// Abnormal closure (1006). The transport went away without a close frame.
    Abnormal,
    /// Invalid payload (1007). Endpoint received a message with invalid data.
    InvalidPayload,
    /// Policy violation (1008). Endpoint received a message that violates its policy.
    PolicyViolation,
    /// Message too big (1009). Endpoint received a message too large to process.
    MessageTooBig,
    /// Mandatory extension (1010). Client expected server to negotiate an extension.
    MandatoryExtension,
    /// Internal error (1011). Server encountered an unexpected condition.
    InternalError,
    /// Any other code (3000-4999 for applications, 1012-1014 for registered codes).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code is reserved and MUST NOT be sent in a Close frame.
    ///
    /// Reserved codes per RFC 6455 Section 7.4.1:
    /// - 1004: Reserved
    /// - 1005: No Status Received
    /// - 1006: Abnormal Closure
    /// - 1015: TLS Handshake
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1004..=1006 | 1015)
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        CloseCode::from_u16(code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

/// Close frame containing status code and optional reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason for closing.
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Decode a close payload received from the peer.
    ///
    /// Payloads shorter than two bytes carry no code and decode to
    /// [`CloseCode::NoStatus`] with an empty reason. Reason bytes that are
    /// not valid UTF-8 are replaced rather than rejected.
    #[must_use]
    pub fn from_payload(payload: &[u8]) -> Self {
        if payload.len() >= 2 {
            let code = u16::from_be_bytes([payload[0], payload[1]]);
            let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
            Self::new(CloseCode::from_u16(code), reason)
        } else {
            Self::new(CloseCode::NoStatus, "")
        }
    }

    /// Encode as a close payload: big-endian code followed by the reason.
    ///
    /// Reserved codes such as [`CloseCode::NoStatus`] and
    /// [`CloseCode::Abnormal`] must not appear in a close frame and encode to
    /// an empty payload.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> {
        if self.code.is_reserved() {
            return Vec::new();
        }
        let mut data = Vec::with_capacity(2 + self.reason.len());
        data.extend_from_slice(&self.code.as_u16().to_be_bytes());
        data.extend_from_slice(self.reason.as_bytes());
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_code_from_u16() {
        assert_eq!(CloseCode::from_u16(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from_u16(1001), CloseCode::GoingAway);
        assert_eq!(CloseCode::from_u16(1002), CloseCode::ProtocolError);
        assert_eq!(CloseCode::from_u16(1005), CloseCode::NoStatus);
        assert_eq!(CloseCode::from_u16(1006), CloseCode::Abnormal);
        assert_eq!(CloseCode::from_u16(1009), CloseCode::MessageTooBig);
        assert_eq!(CloseCode::from_u16(4999), CloseCode::Other(4999));
    }

    #[test]
    fn test_close_code_as_u16() {
        assert_eq!(CloseCode::Normal.as_u16(), 1000);
        assert_eq!(CloseCode::NoStatus.as_u16(), 1005);
        assert_eq!(CloseCode::Abnormal.as_u16(), 1006);
        assert_eq!(CloseCode::Other(3500).as_u16(), 3500);
    }

    #[test]
    fn test_close_code_reserved() {
        assert!(CloseCode::Other(1004).is_reserved());
        assert!(CloseCode::NoStatus.is_reserved());
        assert!(CloseCode::Abnormal.is_reserved());
        assert!(CloseCode::Other(1015).is_reserved());

        assert!(!CloseCode::Normal.is_reserved());
        assert!(!CloseCode::Other(3000).is_reserved());
    }

    #[test]
    fn test_close_payload_with_code() {
        let frame = CloseFrame::from_payload(&[0x03, 0xe8]);
        assert_eq!(frame.code, CloseCode::Normal);
        assert_eq!(frame.reason, "");

        let frame = CloseFrame::from_payload(b"\x03\xe9bye");
        assert_eq!(frame.code, CloseCode::GoingAway);
        assert_eq!(frame.reason, "bye");
    }

    #[test]
    fn test_close_payload_without_code() {
        let frame = CloseFrame::from_payload(&[]);
        assert_eq!(frame.code, CloseCode::NoStatus);
        assert_eq!(frame.reason, "");

        let frame = CloseFrame::from_payload(&[0x03]);
        assert_eq!(frame.code, CloseCode::NoStatus);
    }

    #[test]
    fn test_close_payload_encoding() {
        let frame = CloseFrame::new(CloseCode::Normal, "done");
        assert_eq!(frame.to_payload(), b"\x03\xe8done");

        let frame = CloseFrame::new(CloseCode::NoStatus, "ignored");
        assert!(frame.to_payload().is_empty());
    }

    #[test]
    fn test_reserved_codes_encode_empty() {
        for code in [CloseCode::NoStatus, CloseCode::Abnormal, CloseCode::Other(1015)] {
            assert!(CloseFrame::new(code, "reason").to_payload().is_empty());
        }
        assert_eq!(
            CloseFrame::new(CloseCode::GoingAway, "").to_payload(),
            vec![0x03, 0xE9]
        );
    }
}
