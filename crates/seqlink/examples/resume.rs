//! Disconnect/resume walkthrough in one process.
//!
//! A client sends a pack, vanishes before reading the acknowledgment, then
//! reconnects with its recovery key: the pending send and the id/seq
//! counters are still there.
//!
//! Run with:
//!   cargo run --example resume

use std::sync::Arc;
use std::thread;

use seqlink::pack::Pack;
use seqlink::peer::{connect, SessionKey, SessionManager, TransferListener};
use seqlink::transport::Endpoint;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let key = SessionKey::new("resume-demo");

    let server_manager = Arc::new(SessionManager::new());
    server_manager.open(&key);
    let listener =
        TransferListener::bind(&Endpoint::tcp("127.0.0.1:0"))?.with_manager(server_manager);
    let endpoint = listener.endpoint().clone();

    let server = thread::spawn(move || -> Result<(), seqlink::peer::TransferError> {
        // First connection: the client sends one pack and goes away.
        let mut peer = listener.accept()?;
        let pack = peer.recv()?;
        eprintln!("server: got {:?} bytes", pack.body().len());
        let _ = peer.recv(); // client hangs up

        // Second connection resumes the same session.
        let mut peer = listener.accept()?;
        let pack = peer.recv()?;
        eprintln!("server: got {:?} bytes after resume", pack.body().len());
        peer.send(Pack::with_body("done"), None)?;
        Ok(())
    });

    let client_manager = SessionManager::new();
    client_manager.open(&key);

    // Connect, send, and disconnect before the ACK is read.
    let mut client = connect(&endpoint, &client_manager, Some(key.clone()))?;
    client.send(Pack::with_body("first"), None)?;
    drop(client);

    // Resume: the unacknowledged send is still pending and ids continue.
    let mut client = connect(&endpoint, &client_manager, Some(key))?;
    eprintln!("client: pending after resume = {:?}", client.session().pending_sends());

    let (id, seq) = client.send(Pack::with_body("second"), None)?;
    eprintln!("client: second send allocated id={id} seq={seq}");

    let reply = client.recv()?;
    eprintln!(
        "client: reply '{}', still pending = {:?}",
        String::from_utf8_lossy(reply.body()),
        client.session().pending_sends()
    );

    server.join().expect("server thread")?;
    Ok(())
}
