use std::sync::Arc;

use seqlink_transport::{Endpoint, LinkListener, LinkStream};

use crate::error::Result;
use crate::session::SessionManager;
use crate::transfer::Transfer;

/// Listens for and answers peer connections.
///
/// All accepted connections share one [`SessionManager`], so a reconnecting
/// peer presenting its recovery key lands on the session its previous
/// connection left behind.
pub struct TransferListener {
    socket: LinkListener,
    manager: Arc<SessionManager>,
}

impl TransferListener {
    /// Bind to an endpoint with a fresh session manager.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        let socket = LinkListener::bind(endpoint)?;
        Ok(Self {
            socket,
            manager: Arc::new(SessionManager::new()),
        })
    }

    /// Share an existing session manager (e.g. one pre-seeded with keys).
    pub fn with_manager(mut self, manager: Arc<SessionManager>) -> Self {
        self.manager = manager;
        self
    }

    /// The session manager behind this listener.
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// The endpoint this listener is bound to.
    pub fn endpoint(&self) -> &Endpoint {
        self.socket.endpoint()
    }

    /// Accept the next connection and run the responder handshake
    /// (blocking).
    pub fn accept(&self) -> Result<Transfer<LinkStream, LinkStream>> {
        let stream = self.socket.accept()?;
        let reader = stream.try_clone()?;
        Transfer::accept(reader, stream, &self.manager)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::connector::connect;
    use crate::session::SessionKey;

    #[test]
    fn accept_returns_wired_transfer() {
        let listener = TransferListener::bind(&Endpoint::tcp("127.0.0.1:0")).unwrap();
        let endpoint = listener.endpoint().clone();

        let server = thread::spawn(move || {
            let peer = listener.accept().expect("accept should succeed");
            assert!(peer.session().pending_sends().is_empty());
        });

        let manager = SessionManager::new();
        let _client = connect(&endpoint, &manager, None).expect("client should connect");
        server.join().expect("server thread should finish");
    }

    #[test]
    fn with_manager_shares_sessions_across_accepts() {
        let manager = Arc::new(SessionManager::new());
        let key = SessionKey::new("pre-seeded");
        manager.open(&key);

        let listener = TransferListener::bind(&Endpoint::tcp("127.0.0.1:0"))
            .unwrap()
            .with_manager(Arc::clone(&manager));
        assert!(listener.manager().contains(&key));
        let endpoint = listener.endpoint().clone();

        let expected = key.clone();
        let server = thread::spawn(move || {
            for _ in 0..2 {
                let peer = listener.accept().expect("accept should succeed");
                assert_eq!(peer.session().key(), &expected);
            }
        });

        let client_manager = SessionManager::new();
        client_manager.open(&key);
        for _ in 0..2 {
            let _client = connect(&endpoint, &client_manager, Some(key.clone()))
                .expect("client should connect");
        }
        server.join().expect("server thread should finish");
    }
}
