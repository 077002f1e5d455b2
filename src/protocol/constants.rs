//! Signaling protocol constants

/// Default port the relay listens on
pub const DEFAULT_PORT: u16 = 9001;

/// Maximum length of a session name in bytes
pub const MAX_SESSION_NAME_LEN: usize = 256;

/// Default upper bound on a single inbound frame (SDP blobs are a few KB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256 * 1024;

/// Length prefix size for length-delimited framing
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default per-connection outbound queue depth
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 1024;

/// Default cap on ICE candidates cached per member for replay
pub const DEFAULT_MAX_CACHED_CANDIDATES: usize = 64;

// Message tags
pub const TAG_JOIN_REQUEST: u8 = 0x01;
pub const TAG_LEAVE_NOTICE: u8 = 0x02;
pub const TAG_OFFER: u8 = 0x03;
pub const TAG_ANSWER: u8 = 0x04;
pub const TAG_ICE_CANDIDATE: u8 = 0x05;
pub const TAG_PEER_JOINED: u8 = 0x06;
pub const TAG_PEER_LEFT: u8 = 0x07;
pub const TAG_ERROR: u8 = 0x08;
pub const TAG_END_OF_CANDIDATES: u8 = 0x09;
pub const TAG_JOINED: u8 = 0x0A;
pub const TAG_LIST_SESSIONS: u8 = 0x0B;
pub const TAG_SESSION_LIST: u8 = 0x0C;
