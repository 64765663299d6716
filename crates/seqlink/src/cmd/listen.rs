use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use seqlink_pack::Pack;
use seqlink_peer::{TransferError, TransferListener};

use crate::cmd::{parse_endpoint, ListenArgs};
use crate::exit::{transfer_error, CliError, CliResult, SUCCESS};
use crate::output::{print_pack, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let listener =
        TransferListener::bind(&endpoint).map_err(|err| transfer_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut peer = match listener.accept() {
            Ok(peer) => peer,
            Err(err) => return Err(transfer_error("accept failed", err)),
        };

        while running.load(Ordering::SeqCst) {
            let pack = match peer.recv() {
                Ok(pack) => pack,
                Err(TransferError::ConnectionClosed) => break,
                Err(err) => return Err(transfer_error("receive failed", err)),
            };

            print_pack(&pack, peer.session().key(), format);
            printed = printed.saturating_add(1);

            if args.echo {
                peer.send(Pack::with_body(pack.body().clone()), None)
                    .map_err(|err| transfer_error("echo failed", err))?;
            }

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
