//! # CLI - dsprep interactive shell
//!
//! A REPL-style front end for preparing stream datasets. Reads commands from
//! stdin, runs them against a store directory and prints results to stdout.
//! Works both interactively and scripted (pipe commands via stdin). Failed
//! commands print a single `ERR <message>` line and the shell keeps going.
//!
//! ## Commands
//!
//! ```text
//! IMPORT-WCUP path name [sid_field] [key_field]   Ingest a WorldCup trace
//! LIST                                            List datasets
//! INFO name                                       Print metadata and annotations
//! HASH-STREAMS name n                             stream_id := stream_id mod n
//! HASH-SOURCES name n                             source_id := source_id mod n
//! NEGATE name                                     Flip every update count
//! TIME-SHIFT name delta                           Add delta to every timestamp
//! MERGE target [window=DELTA] src1 src2 ...       Cascade merge into target
//! WINDOW target name delta                        In-memory sliding window
//! COPY src dst                                    Copy a dataset
//! REMOVE name                                     Delete a dataset
//! HEAD name [n]                                   Print the first n records
//! EXIT / QUIT                                     Leave the shell
//! ```
//!
//! ## Configuration
//!
//! ```text
//! DSPREP_STORE_DIR          store directory                   (default: "data")
//! DSPREP_OVERWRITE          replace existing datasets         (default: "false")
//! DSPREP_SCAN_CHUNK         records read per scanner refill   (default: 65536)
//! DSPREP_WRITE_BUFFER       merge output buffer in records    (default: 4194304)
//! DSPREP_PROGRESS_INTERVAL  records between progress logs     (default: 1048576)
//! RUST_LOG                  log filter, logs go to stderr     (default: "info")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! dsprep started (store=data, overwrite=false, scan_chunk=65536, write_buffer=4194304)
//! > IMPORT-WCUP wc_day44 day44
//! OK day44 (1000000 records)
//! > MERGE day44w window=3600 day44
//! OK day44w (2000000 records)
//! > EXIT
//! bye
//! ```

mod shell;

use anyhow::Result;
use config::{MergeConfig, StoreConfig};
use shell::{Flow, Shell, HELP};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();

    let store_config = StoreConfig::from_env();
    let merge_config = MergeConfig::from_env();
    let mut shell = Shell::open(&store_config, merge_config)?;

    println!(
        "dsprep started (store={}, overwrite={}, scan_chunk={}, write_buffer={})",
        shell.store().root().display(),
        store_config.overwrite,
        merge_config.scan_chunk,
        merge_config.write_buffer
    );
    println!("{}", HELP);
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut out = stdout.lock();
        match shell.execute(&line, &mut out) {
            Ok(Flow::Exit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => writeln!(out, "ERR {:#}", e)?,
        }

        write!(out, "> ")?;
        out.flush().ok();
    }

    Ok(())
}
