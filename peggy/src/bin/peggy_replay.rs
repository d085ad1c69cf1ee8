//! Replays a log of bridge messages against a genesis state and prints the outcome of each one.
//!
//! The log is JSON lines. Each line is one of:
//!
//! * `{"deliver":{"height":5,"msg":{"SubmitTransfer":{...}}}}`
//! * `{"encoded":{"height":5,"bytes":"0104..."}}`, a message encoded with the bridge codec
//! * `{"query":{"batch":{"nonce":1}}}`

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use peggy::{
    capabilities::{Ledger, StakingTable},
    cfg::Config,
    codec::Codec,
    handler::Peggy,
    message::Msg,
    query::Query,
    store::MemStore,
    types::Ctx,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// The message log to replay.
    log: PathBuf,
    #[clap(long, short, default_values = ["peggy.toml"])]
    config_file: Vec<PathBuf>,
    #[clap(long, default_value = "false")]
    log_json: bool,
}

type App = Peggy<MemStore, StakingTable, Ledger>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Entry {
    Deliver {
        height: u64,
        msg: Msg,
    },
    Encoded {
        height: u64,
        #[serde(with = "hex")]
        bytes: Vec<u8>,
    },
    Query(Query),
}

fn main() -> Result<()> {
    let args = Args::parse();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(io::stderr);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let config = Config::from_files(&args.config_file)?;
    let mut app: App = Peggy::new(
        Arc::new(Codec::new()),
        config.peggy.clone(),
        MemStore::new(),
        config.genesis.staking(),
        config.genesis.ledger()?,
    );
    info!(
        validators = config.genesis.validators.len(),
        accounts = config.genesis.balances.len(),
        "genesis loaded"
    );

    let log = File::open(&args.log).with_context(|| format!("opening {:?}", args.log))?;
    let mut stdout = io::stdout().lock();
    let (mut accepted, mut rejected) = (0usize, 0usize);
    for (index, line) in BufReader::new(log).lines().enumerate() {
        let line = line?;
        let number = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let entry: Entry =
            serde_json::from_str(&line).with_context(|| format!("line {number} of the log"))?;

        let (output, ok) = replay(&mut app, number, entry)?;
        if ok {
            accepted += 1;
        } else {
            rejected += 1;
        }
        writeln!(stdout, "{output}")?;
    }

    info!(accepted, rejected, "replay finished");
    Ok(())
}

/// Applies one log entry. Returns the output line and whether the entry was accepted. Rejected messages and queries
/// are reported in the output; only a result that cannot be written out is an error.
fn replay(app: &mut App, number: usize, entry: Entry) -> Result<(Value, bool)> {
    let result = match entry {
        Entry::Deliver { height, msg } => {
            app.deliver(Ctx::at(height), &msg).map(serde_json::to_value)
        }
        Entry::Encoded { height, bytes } => app
            .deliver_bytes(Ctx::at(height), &bytes)
            .map(serde_json::to_value),
        Entry::Query(query) => app.querier().query(&query).map(Ok),
    };
    match result {
        Ok(value) => {
            let value =
                value.with_context(|| format!("serializing the result of line {number}"))?;
            Ok((json!({ "line": number, "ok": value }), true))
        }
        Err(error) => {
            warn!(line = number, %error, code = error.code(), "entry rejected");
            let error = json!({ "code": error.code(), "message": error.to_string() });
            Ok((json!({ "line": number, "error": error }), false))
        }
    }
}
