use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use seqlink_pack::Pack;
use seqlink_peer::{SessionKey, SessionManager, Transfer, TransferError};
use seqlink_transport::LinkStream;
use tracing::debug;

use crate::cmd::{parse_duration, parse_endpoint, SendArgs};
use crate::exit::{io_error, transfer_error, transport_error, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_session, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args)?;

    let manager = SessionManager::new();
    let key = args.resume.as_deref().map(SessionKey::new);
    if let Some(key) = &key {
        // Resuming: bind the locally remembered key before the handshake
        // presents it to the peer.
        manager.open(key);
    }

    let stream =
        LinkStream::connect(&endpoint).map_err(|err| transport_error("connect failed", err))?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|err| transport_error("connect failed", err))?;
    let reader = stream
        .try_clone()
        .map_err(|err| transport_error("connect failed", err))?;

    let mut peer = Transfer::connect(reader, stream, &manager, key)
        .map_err(|err| transfer_error("handshake failed", err))?;

    let acked = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&acked);
    let (id, seq) = peer
        .send(
            Pack::with_body(payload),
            Some(Box::new(move || {
                flag.store(true, Ordering::SeqCst);
            })),
        )
        .map_err(|err| transfer_error("send failed", err))?;
    debug!(id, seq, "pack handed to the wire");

    if args.wait_ack {
        wait_for_ack(&mut peer, &acked)?;
    }

    let session = peer.session();
    print_session(
        session.key(),
        &endpoint.to_string(),
        session.pending_sends().len(),
        format,
    );
    Ok(SUCCESS)
}

fn wait_for_ack(
    peer: &mut Transfer<LinkStream, LinkStream>,
    acked: &AtomicBool,
) -> CliResult<()> {
    while !acked.load(Ordering::SeqCst) {
        match peer.recv() {
            // Unsolicited data while waiting; the ACK may already have been
            // processed on the way to it.
            Ok(_) => continue,
            Err(TransferError::Io(err)) if !acked.load(Ordering::SeqCst) => {
                return Err(if is_timeout(&err) {
                    crate::exit::CliError::new(TIMEOUT, "timed out waiting for acknowledgment")
                } else {
                    io_error("receive failed", err)
                });
            }
            Err(TransferError::Io(_)) => break,
            Err(err) => return Err(transfer_error("receive failed", err)),
        }
    }
    Ok(())
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}
