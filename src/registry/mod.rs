//! Session registry for signaling routing
//!
//! The registry owns every live session and routes negotiation messages
//! from one member to the others. Sessions store connection ids only; the
//! peer directory turns an id back into that connection's outbound queue.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<SessionRegistry>
//!             ┌───────────────────────────────────────┐
//!             │ sessions: RwLock<HashMap<Name,        │
//!             │   Arc<Mutex<Session { members }>>>>   │
//!             │ directory: RwLock<HashMap<Id,         │
//!             │   OutboundQueue>>                     │
//!             └──────────────────┬────────────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [Connection A]          [Connection B]          [Connection C]
//!   handle_inbound()        queue.recv()            queue.recv()
//!        │                       │                       │
//!        └──► registry.relay() ──► write_frame() ──► transport
//! ```
//!
//! # Lifecycle
//!
//! A session is created by the first join of an unknown name and removed
//! the moment its last member leaves. Removal re-checks emptiness under the
//! session lock and marks the instance closed, so a joiner racing the
//! removal retries against the registry instead of joining a dead session.

pub mod config;
pub mod directory;
pub mod error;
pub mod session;
pub mod store;

pub use config::RegistryConfig;
pub use directory::PeerDirectory;
pub use error::RegistryError;
pub use session::{Member, Role, Session, SessionStats};
pub use store::{JoinOutcome, LeaveOutcome, SessionHandle, SessionRegistry};
