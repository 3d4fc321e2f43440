//! Command dispatch for the interactive shell.

use anyhow::{anyhow, bail, Context, Result};
use config::{MergeConfig, StoreConfig};
use dataset::wcup::{load_wcup, KeyField, SidField};
use dataset::{cascade_merge_with, Store, StreamArray, StreamDataset};
use std::io::Write;
use tracing::info;

/// Records printed by `HEAD` when no count is given.
const DEFAULT_HEAD: u64 = 10;

pub const HELP: &str = "\
Commands: IMPORT-WCUP path name [sid_field] [key_field] | LIST | INFO name
          HASH-STREAMS name n | HASH-SOURCES name n | NEGATE name | TIME-SHIFT name delta
          MERGE target [window=DELTA] src... | WINDOW target name delta
          COPY src dst | REMOVE name | HEAD name [n] | EXIT";

/// Whether the shell should keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Shell state: the open store and the settings every command runs with.
pub struct Shell {
    store: Store,
    merge: MergeConfig,
    overwrite: bool,
}

fn parse_arg<T>(value: Option<&str>, what: &str, usage: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = value.ok_or_else(|| anyhow!("usage: {}", usage))?;
    raw.parse::<T>()
        .map_err(|e| anyhow!("invalid {} '{}': {}", what, raw, e))
}

fn required<'a>(value: Option<&'a str>, usage: &str) -> Result<&'a str> {
    value.ok_or_else(|| anyhow!("usage: {}", usage))
}

impl Shell {
    pub fn open(store: &StoreConfig, merge: MergeConfig) -> Result<Self> {
        let opened = Store::open(&store.root)
            .with_context(|| format!("cannot open store at {}", store.root.display()))?;
        info!(
            "Opened store at {} ({} datasets)",
            store.root.display(),
            opened.names()?.len()
        );
        Ok(Self {
            store: opened,
            merge,
            overwrite: store.overwrite,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn open_dataset(&self, name: &str) -> Result<StreamDataset> {
        let ds = StreamDataset::open(&self.store, name)
            .with_context(|| format!("cannot open dataset '{}'", name))?;
        Ok(ds.with_scan_chunk(self.merge.scan_chunk))
    }

    /// Runs one command line, writing its output to `out`.
    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return Ok(Flow::Continue);
        };

        match cmd.to_uppercase().as_str() {
            "IMPORT-WCUP" => {
                const USAGE: &str = "IMPORT-WCUP path name [sid_field] [key_field]";
                let path = required(parts.next(), USAGE)?;
                let name = required(parts.next(), USAGE)?;
                let sid: SidField = match parts.next() {
                    Some(s) => parse_arg(Some(s), "sid_field", USAGE)?,
                    None => SidField::default(),
                };
                let key: KeyField = match parts.next() {
                    Some(s) => parse_arg(Some(s), "key_field", USAGE)?,
                    None => KeyField::default(),
                };
                let array = load_wcup(path, sid, key)
                    .with_context(|| format!("cannot read WorldCup trace {}", path))?;
                let ds = array.to_store(&self.store, name, self.overwrite)?;
                writeln!(out, "OK {} ({} records)", name, ds.len())?;
            }
            "LIST" => {
                let names = self.store.names()?;
                if names.is_empty() {
                    writeln!(out, "(empty)")?;
                }
                for name in &names {
                    writeln!(out, "{}", name)?;
                }
            }
            "INFO" => {
                let name = required(parts.next(), "INFO name")?;
                let ds = self.open_dataset(name)?;
                writeln!(out, "{}: {}", name, ds.metadata())?;
                for (attr, value) in ds.user_attrs() {
                    writeln!(out, "  {} = {}", attr, value)?;
                }
            }
            "HASH-STREAMS" | "HASH-SOURCES" => {
                let usage = format!("{} name n", cmd.to_uppercase());
                let name = required(parts.next(), &usage)?;
                let n: i16 = parse_arg(parts.next(), "modulus", &usage)?;
                if n <= 0 {
                    bail!("modulus must be positive, got {}", n);
                }
                let mut ds = self.open_dataset(name)?;
                if cmd.eq_ignore_ascii_case("HASH-STREAMS") {
                    ds.hash_streams(n)?;
                } else {
                    ds.hash_sources(n)?;
                }
                writeln!(out, "OK")?;
            }
            "NEGATE" => {
                let name = required(parts.next(), "NEGATE name")?;
                self.open_dataset(name)?.negate()?;
                writeln!(out, "OK")?;
            }
            "TIME-SHIFT" => {
                const USAGE: &str = "TIME-SHIFT name delta";
                let name = required(parts.next(), USAGE)?;
                let delta: i32 = parse_arg(parts.next(), "delta", USAGE)?;
                self.open_dataset(name)?.time_shift(delta)?;
                writeln!(out, "OK")?;
            }
            "MERGE" => {
                const USAGE: &str = "MERGE target [window=DELTA] src...";
                let target = required(parts.next(), USAGE)?;
                let mut window = None;
                let mut sources = Vec::new();
                for arg in parts {
                    match arg.strip_prefix("window=") {
                        Some(delta) => {
                            window = Some(parse_arg::<i32>(Some(delta), "window", USAGE)?);
                        }
                        None => sources.push(self.open_dataset(arg)?),
                    }
                }
                if sources.is_empty() {
                    bail!("usage: {}", USAGE);
                }
                let inputs: Vec<&StreamDataset> = sources.iter().collect();
                let ds = cascade_merge_with(
                    &self.store,
                    target,
                    &inputs,
                    window,
                    self.overwrite,
                    &self.merge,
                )?;
                writeln!(out, "OK {} ({} records)", target, ds.len())?;
            }
            "WINDOW" => {
                const USAGE: &str = "WINDOW target name delta";
                let target = required(parts.next(), USAGE)?;
                let name = required(parts.next(), USAGE)?;
                let delta: i32 = parse_arg(parts.next(), "delta", USAGE)?;
                let mut array = StreamArray::from_store(&self.store, name)
                    .with_context(|| format!("cannot load dataset '{}'", name))?;
                array.time_window(delta);
                let ds = array.to_store(&self.store, target, self.overwrite)?;
                writeln!(out, "OK {} ({} records)", target, ds.len())?;
            }
            "COPY" => {
                const USAGE: &str = "COPY src dst";
                let src = required(parts.next(), USAGE)?;
                let dst = required(parts.next(), USAGE)?;
                self.open_dataset(src)?
                    .copy_to(&self.store, dst, self.overwrite)?;
                writeln!(out, "OK")?;
            }
            "REMOVE" => {
                let name = required(parts.next(), "REMOVE name")?;
                self.store.remove(name)?;
                writeln!(out, "OK")?;
            }
            "HEAD" => {
                const USAGE: &str = "HEAD name [n]";
                let name = required(parts.next(), USAGE)?;
                let n: u64 = match parts.next() {
                    Some(s) => parse_arg(Some(s), "count", USAGE)?,
                    None => DEFAULT_HEAD,
                };
                let mut ds = self.open_dataset(name)?;
                let records = ds.read(..n)?;
                writeln!(out, "ts sid hid key upd")?;
                for r in &records {
                    writeln!(
                        out,
                        "{} {} {} {} {}",
                        r.timestamp, r.stream_id, r.source_id, r.key, r.update_count
                    )?;
                }
                writeln!(out, "({} of {} records)", records.len(), ds.len())?;
            }
            "HELP" => writeln!(out, "{}", HELP)?,
            "EXIT" | "QUIT" => {
                writeln!(out, "bye")?;
                return Ok(Flow::Exit);
            }
            other => writeln!(out, "unknown command: {}", other)?,
        }
        Ok(Flow::Continue)
    }
}
