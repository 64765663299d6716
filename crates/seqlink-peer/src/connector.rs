use seqlink_transport::{Endpoint, LinkStream};

use crate::error::Result;
use crate::session::{SessionKey, SessionManager};
use crate::transfer::Transfer;

/// Connect to a listening peer and establish (or resume) a session.
///
/// `key` resumes a previously issued session; `None` requests a fresh one.
pub fn connect(
    endpoint: &Endpoint,
    manager: &SessionManager,
    key: Option<SessionKey>,
) -> Result<Transfer<LinkStream, LinkStream>> {
    let stream = LinkStream::connect(endpoint)?;
    let reader = stream.try_clone()?;
    Transfer::connect(reader, stream, manager, key)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use seqlink_pack::Pack;

    use super::*;
    use crate::error::TransferError;
    use crate::listener::TransferListener;
    use crate::session::Progress;

    fn bind_local() -> TransferListener {
        TransferListener::bind(&Endpoint::tcp("127.0.0.1:0")).expect("listener should bind")
    }

    #[test]
    fn roundtrip_ack_and_reply() {
        let listener = bind_local();
        let endpoint = listener.endpoint().clone();

        let server = thread::spawn(move || {
            let mut peer = listener.accept().expect("accept should succeed");
            let pack = peer.recv().expect("server should receive data");
            assert_eq!(pack.body().as_ref(), b"ping");
            peer.send(Pack::with_body("pong"), None)
                .expect("server reply should send");
            peer.session().last_ack()
        });

        let manager = SessionManager::new();
        let mut client = connect(&endpoint, &manager, None).expect("client should connect");

        let acked = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&acked);
        let (id, seq) = client
            .send(
                Pack::with_body("ping"),
                Some(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        assert_eq!((id, seq), (1, 1));

        // The server's ACK precedes its reply on the wire, so by the time
        // recv hands back the reply the callback has fired.
        let reply = client.recv().expect("client should receive reply");
        assert_eq!(reply.body().as_ref(), b"pong");
        assert_eq!(acked.load(Ordering::SeqCst), 1);
        assert!(!client.session().has_pending(id));

        let server_last_ack = server.join().expect("server thread should finish");
        assert_eq!(server_last_ack, Some(Progress { id: 1, seq: 1 }));
    }

    #[test]
    fn fresh_handshake_establishes_both_sides() {
        let listener = bind_local();
        let endpoint = listener.endpoint().clone();
        let server_manager = Arc::clone(listener.manager());

        let server = thread::spawn(move || {
            let peer = listener.accept().expect("accept should succeed");
            peer.session().key().clone()
        });

        let manager = SessionManager::new();
        let client = connect(&endpoint, &manager, None).expect("client should connect");
        let server_key = server.join().expect("server thread should finish");

        // Each side minted its own session record for the fresh handshake.
        assert!(manager.contains(client.session().key()));
        assert!(server_manager.contains(&server_key));
    }

    #[test]
    fn shared_key_recovers_the_same_session_on_both_sides() {
        let key = SessionKey::new("agreed-offline");

        let server_manager = Arc::new(SessionManager::new());
        server_manager.open(&key);
        let listener = bind_local().with_manager(Arc::clone(&server_manager));
        let endpoint = listener.endpoint().clone();

        let expected = key.clone();
        let server = thread::spawn(move || {
            let peer = listener.accept().expect("accept should succeed");
            assert_eq!(peer.session().key(), &expected);
        });

        let client_manager = SessionManager::new();
        client_manager.open(&key);
        let client = connect(&endpoint, &client_manager, Some(key.clone()))
            .expect("client should resume");
        assert_eq!(client.session().key(), &key);

        server.join().expect("server thread should finish");
    }

    #[test]
    fn unknown_key_is_rejected_with_wire_error() {
        let listener = bind_local();
        let endpoint = listener.endpoint().clone();
        let server_manager = Arc::clone(listener.manager());

        let server = thread::spawn(move || listener.accept());

        let manager = SessionManager::new();
        let key = SessionKey::new("never-issued");
        manager.open(&key);
        let result = connect(&endpoint, &manager, Some(key));
        assert!(matches!(result, Err(TransferError::HandshakeRejected)));

        let server_result = server.join().expect("server thread should finish");
        assert!(matches!(server_result, Err(TransferError::Session(_))));
        assert!(server_manager.is_empty(), "no session created on rejection");
    }

    #[test]
    fn session_resumes_across_reconnects() {
        let key = SessionKey::new("resumable");

        let server_manager = Arc::new(SessionManager::new());
        server_manager.open(&key);
        let listener = bind_local().with_manager(Arc::clone(&server_manager));
        let endpoint = listener.endpoint().clone();

        let server = thread::spawn(move || {
            // First connection: receive P1, then the client goes away.
            let mut peer = listener.accept().expect("first accept");
            let p1 = peer.recv().expect("server should receive p1");
            assert_eq!(p1.body().as_ref(), b"p1");
            assert!(matches!(peer.recv(), Err(_)), "client disconnected");
            let after_first = peer.session().last_ack();

            // Second connection resumes the same session.
            let mut peer = listener.accept().expect("second accept");
            let p2 = peer.recv().expect("server should receive p2");
            assert_eq!(p2.body().as_ref(), b"p2");
            peer.send(Pack::with_body("done"), None)
                .expect("final reply should send");
            (after_first, peer.session().last_ack())
        });

        let client_manager = SessionManager::new();
        client_manager.open(&key);

        // First connection: send P1 and vanish before reading the ACK.
        let mut client = connect(&endpoint, &client_manager, Some(key.clone()))
            .expect("first connect should succeed");
        client.send(Pack::with_body("p1"), None).unwrap();
        drop(client);

        // Resume: the pending entry and the id counter both survived.
        let mut client = connect(&endpoint, &client_manager, Some(key.clone()))
            .expect("reconnect should succeed");
        assert_eq!(client.session().pending_sends(), vec![(1, 1)]);
        let (id, seq) = client.send(Pack::with_body("p2"), None).unwrap();
        assert_eq!((id, seq), (2, 2), "ids continue across reconnects");

        let reply = client.recv().expect("client should receive final reply");
        assert_eq!(reply.body().as_ref(), b"done");
        // P2's ACK arrived before the reply; P1's was lost with connection 1.
        assert_eq!(client.session().pending_sends(), vec![(1, 1)]);

        let (after_first, after_second) = server.join().expect("server thread");
        assert_eq!(after_first, Some(Progress { id: 1, seq: 1 }));
        assert_eq!(after_second, Some(Progress { id: 2, seq: 2 }));
    }
}
