use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use seqlink_pack::Pack;
use seqlink_peer::{SessionKey, TransferHeader};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PackOutput<'a> {
    schema_id: &'a str,
    id: u64,
    seq: u64,
    body_size: usize,
    body: String,
    session: &'a str,
    timestamp: String,
}

pub fn print_pack(pack: &Pack, session: &SessionKey, format: OutputFormat) {
    // Packs handed out by recv always carry a DATA header.
    let (id, seq) = TransferHeader::parse(pack)
        .map(|header| (header.id(), header.seq()))
        .unwrap_or((0, 0));

    match format {
        OutputFormat::Json => {
            let out = PackOutput {
                schema_id: "https://schemas.seqlink.dev/cli/v1/pack-received.schema.json",
                id,
                seq,
                body_size: pack.body().len(),
                body: body_preview(pack.body().as_ref()),
                session: session.as_str(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "SEQ", "SIZE", "SESSION", "BODY"])
                .add_row(vec![
                    id.to_string(),
                    seq.to_string(),
                    pack.body().len().to_string(),
                    session.to_string(),
                    body_preview(pack.body().as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "id={} seq={} size={} session={} body={}",
                id,
                seq,
                pack.body().len(),
                session,
                body_preview(pack.body().as_ref())
            );
        }
        OutputFormat::Raw => {
            print_raw(pack.body().as_ref());
        }
    }
}

#[derive(Serialize)]
struct SessionOutput<'a> {
    schema_id: &'a str,
    session: &'a str,
    endpoint: String,
    pending_sends: usize,
}

pub fn print_session(session: &SessionKey, endpoint: &str, pending: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SessionOutput {
                schema_id: "https://schemas.seqlink.dev/cli/v1/session-info.schema.json",
                session: session.as_str(),
                endpoint: endpoint.to_string(),
                pending_sends: pending,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SESSION", "ENDPOINT", "PENDING"])
                .add_row(vec![
                    session.to_string(),
                    endpoint.to_string(),
                    pending.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("session={session} endpoint={endpoint} pending={pending}");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn body_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", body.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
