//! Relay lifecycle observer
//!
//! Implement [`RelayHandler`] to watch connections and sessions come and
//! go. All methods default to no-ops. The handler only observes: routing
//! decisions are made by the registry alone.

use std::future::Future;

use crate::connection::ConnectionContext;
use crate::protocol::SessionName;

/// Observer for relay lifecycle events
///
/// # Example
///
/// ```ignore
/// struct CountingHandler {
///     live: AtomicUsize,
/// }
///
/// impl RelayHandler for CountingHandler {
///     async fn on_session_created(&self, _ctx: &ConnectionContext, _session: &SessionName) {
///         self.live.fetch_add(1, Ordering::Relaxed);
///     }
///
///     async fn on_session_closed(&self, _session: &SessionName) {
///         self.live.fetch_sub(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait RelayHandler: Send + Sync + 'static {
    /// A transport handshake completed
    fn on_connection(&self, _ctx: &ConnectionContext) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// The connection's join created a new session
    fn on_session_created(
        &self,
        _ctx: &ConnectionContext,
        _session: &SessionName,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// The last member left and the session was removed
    fn on_session_closed(&self, _session: &SessionName) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// The connection closed; its sessions have already been left
    fn on_disconnect(&self, _ctx: &ConnectionContext) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Handler that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl RelayHandler for NoopHandler {}
