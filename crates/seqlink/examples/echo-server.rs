//! Minimal echo server — accepts peers and echoes data packs back.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --bin seqlink -- send tcp:127.0.0.1:7400 --data hello --wait-ack

use seqlink::pack::Pack;
use seqlink::peer::{TransferError, TransferListener};
use seqlink::transport::Endpoint;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TransferListener::bind(&Endpoint::tcp("127.0.0.1:7400"))?;
    eprintln!("Listening on {}", listener.endpoint());

    loop {
        let mut peer = listener.accept()?;
        eprintln!("Session established: {}", peer.session().key());

        loop {
            match peer.recv() {
                Ok(pack) => {
                    eprintln!("Received {} bytes", pack.body().len());
                    peer.send(Pack::with_body(pack.body().clone()), None)?;
                }
                Err(TransferError::ConnectionClosed) => {
                    eprintln!("Peer disconnected; session kept for resumption");
                    break;
                }
                Err(e) => {
                    eprintln!("Transfer error: {e}");
                    break;
                }
            }
        }
    }
}
