//! WebSocket protocol core implementation (RFC 6455).

pub mod assembler;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod validation;

pub use assembler::{Delivery, MessageAssembler};
pub use frame::Frame;
pub use handshake::{
    BAD_REQUEST, HandshakeRequest, HandshakeResponse, Headers, WS_GUID, compute_accept_key,
    find_header_end,
};
pub use mask::{MaskGenerator, apply_mask, apply_mask_fast};
pub use opcode::OpCode;
pub use validation::{BaseHeader, FrameValidator};
