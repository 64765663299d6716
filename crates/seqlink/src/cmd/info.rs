use seqlink_peer::{SessionManager, Transfer};
use seqlink_transport::LinkStream;

use crate::cmd::{parse_duration, parse_endpoint, InfoArgs};
use crate::exit::{transfer_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_session, OutputFormat};

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let timeout = parse_duration(&args.timeout)?;

    let stream =
        LinkStream::connect(&endpoint).map_err(|err| transport_error("connect failed", err))?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|err| transport_error("connect failed", err))?;
    let reader = stream
        .try_clone()
        .map_err(|err| transport_error("connect failed", err))?;

    let manager = SessionManager::new();
    let peer = Transfer::connect(reader, stream, &manager, None)
        .map_err(|err| transfer_error("handshake failed", err))?;

    let session = peer.session();
    print_session(
        session.key(),
        &endpoint.to_string(),
        session.pending_sends().len(),
        format,
    );
    Ok(SUCCESS)
}
