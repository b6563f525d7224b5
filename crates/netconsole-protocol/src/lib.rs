pub mod frame;
pub mod messages;
pub mod request;

pub use frame::{encode_frame, FrameDecoder, DEFAULT_MAX_FRAME_BYTES};
pub use messages::{
    EnvironmentVariable, FrontendMessage, HostMessage, PacketDirection, PayloadEncoding,
    ThemeSnapshot,
};
pub use request::{
    flat_pairs_to_headers, headers_to_flat_pairs, AuthorizationDescriptor, BodyPayload, HttpHeader,
    OutcomeStatus, RequestDescriptor, ResponseData, ResponseOutcome,
};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("buffer exceeds max size without delimiter: {size} > {max}")]
    OversizedBuffer { size: usize, max: usize },
    #[error("frame encode failed: {0}")]
    Encode(String),
    #[error("frame decode failed: {0}")]
    Decode(String),
    #[error("invalid base64 payload: {0}")]
    Base64(String),
}
