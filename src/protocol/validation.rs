//! Base-header validation for incoming frames (RFC 6455 Sections 5.1, 5.2, 5.5).
//!
//! Every rule here can be decided from the first two header bytes, so a
//! malformed frame is rejected before its length or payload is examined:
//! - RSV bits must be clear (no extensions are negotiated)
//! - the opcode must be one of the six defined values
//! - control frames must not be fragmented or carry more than 125 bytes
//! - masking must match the receiving role

use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::OpCode;

/// Fields of the first two header bytes that survived validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Whether a masking key follows the length field.
    pub masked: bool,
    /// Low seven bits of the second byte (length or length class).
    pub len_code: u8,
}

/// Validates incoming base headers for one connection role.
#[derive(Debug, Clone, Copy)]
pub struct FrameValidator {
    role: Role,
}

impl FrameValidator {
    /// Create a validator for frames received by `role`.
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self { role }
    }

    /// Validate the two base header bytes.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` - any of RSV1-3 is set
    /// - `Error::ReservedOpcode` - opcode is not defined by RFC 6455
    /// - `Error::FragmentedControlFrame` - control opcode with FIN clear
    /// - `Error::ControlFrameTooLarge` - control payload above 125 bytes
    /// - `Error::UnmaskedClientFrame` - server received an unmasked frame
    /// - `Error::MaskedServerFrame` - client received a masked frame
    pub fn validate(&self, byte0: u8, byte1: u8) -> Result<BaseHeader> {
        if byte0 & 0x70 != 0 {
            return Err(Error::ReservedBitsSet);
        }

        let fin = byte0 & 0x80 != 0;
        let opcode = OpCode::from_u8(byte0 & 0x0F)?;
        if opcode.is_control() && !fin {
            return Err(Error::FragmentedControlFrame);
        }

        let len_code = byte1 & 0x7F;
        if opcode.is_control() && len_code > 125 {
            return Err(Error::ControlFrameTooLarge(len_code));
        }

        let masked = byte1 & 0x80 != 0;
        self.validate_masking(masked)?;

        Ok(BaseHeader {
            fin,
            opcode,
            masked,
            len_code,
        })
    }

    /// Servers require masked frames; clients require unmasked ones.
    fn validate_masking(&self, masked: bool) -> Result<()> {
        match (self.role, masked) {
            (Role::Server, false) => Err(Error::UnmaskedClientFrame),
            (Role::Client, true) => Err(Error::MaskedServerFrame),
            _ => Ok(()),
        }
    }
}
