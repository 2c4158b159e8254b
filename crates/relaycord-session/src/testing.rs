//! In-memory connection double shared by the unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use relaycord_protocol::{AccountId, Identity};
use relaycord_transport::{Connection, ConnectionId, Frame, TransportError};
use uuid::Uuid;

/// Records sent frames; a stalled connection never completes I/O.
pub(crate) struct MockConnection {
    id: ConnectionId,
    stalled: bool,
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockConnection {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id: ConnectionId::new(id),
            stalled: false,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn stalled(id: u64) -> Self {
        Self {
            stalled: true,
            ..Self::new(id)
        }
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    type Error = TransportError;

    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        if self.stalled {
            std::future::pending::<()>().await;
        }
        self.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Frame>, TransportError> {
        std::future::pending::<()>().await;
        Ok(None)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.stalled {
            std::future::pending::<()>().await;
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn credential(&self) -> Option<&str> {
        None
    }
}

/// An identity whose account id is derived from `n`.
pub(crate) fn identity(n: u128, name: &str) -> Identity {
    Identity {
        account: AccountId(Uuid::from_u128(n)),
        name: name.to_string(),
    }
}
