//! # CLI - Layered Store Interactive Shell
//!
//! A REPL-style command-line interface over a [`LayeredStore`]. Reads
//! commands from stdin, executes them, and prints results to stdout. Works
//! interactively or scripted (pipe commands via stdin). Log output goes to
//! stderr so stdout stays parseable.
//!
//! ## Commands
//!
//! ```text
//! LIST               Print every record in the merged view, one per line
//! GET key            Print the record with this key (or "(nil)")
//! PUT {json}         Insert or replace a record (must carry the key field)
//! DEL key            Delete a record; defaults are tombstoned
//! STATS              Print store debug info
//! EXIT / QUIT        Shut down
//! ```
//!
//! Keys on the command line are taken as JSON strings.
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! LAYERSTORE_DIR       storage directory          (default: "data/config")
//! LAYERSTORE_DEFAULTS  default-record JSON file   (default: none)
//! LAYERSTORE_KEY       primary-key field name     (default: "name")
//! LAYERSTORE_SYNC      fsync before rename        (default: "true")
//! RUST_LOG             log filter                 (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ LAYERSTORE_DEFAULTS=drivers.json cargo run -p cli
//! layerstore started (dir=data/config, key=name, defaults=drivers.json)
//! > PUT {"name": "HSQLDB", "port": 9002}
//! OK
//! > GET HSQLDB
//! {"name":"HSQLDB","port":9002}
//! > EXIT
//! bye
//! ```

use anyhow::Result;
use serde_json::Value;
use std::io::{self, BufRead, Write};
use store::{primary_key, FileSource, LayeredStore, RecordSource};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let dir = env_or("LAYERSTORE_DIR", "data/config");
    let key = env_or("LAYERSTORE_KEY", "name");
    let sync: bool = env_or("LAYERSTORE_SYNC", "true").parse().unwrap_or(true);
    let defaults = std::env::var("LAYERSTORE_DEFAULTS").ok();

    let source = defaults
        .as_deref()
        .map(|path| Box::new(FileSource::new(path)) as Box<dyn RecordSource>);
    let mut store = LayeredStore::open(&dir, source, &key)?;
    store.set_sync(sync);
    info!(dir = %dir, key = %key, sync, "store opened");

    println!(
        "layerstore started (dir={}, key={}, defaults={})",
        dir,
        key,
        defaults.as_deref().unwrap_or("none")
    );
    println!("Commands: LIST | GET key | PUT {{json}} | DEL key | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        let (cmd, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (trimmed, ""),
        };

        if !cmd.is_empty() {
            match cmd.to_uppercase().as_str() {
                "LIST" => match store.list() {
                    Ok(records) => {
                        if records.is_empty() {
                            println!("(empty)");
                        } else {
                            for record in &records {
                                println!("{}", Value::Object(record.clone()));
                            }
                            println!("({} records)", records.len());
                        }
                    }
                    Err(e) => println!("ERR list failed: {}", e),
                },
                "GET" => {
                    if rest.is_empty() {
                        println!("ERR usage: GET key");
                    } else {
                        match store.get(&Value::from(rest)) {
                            Ok(Some(record)) => println!("{}", Value::Object(record)),
                            Ok(None) => println!("(nil)"),
                            Err(e) => println!("ERR read failed: {}", e),
                        }
                    }
                }
                "PUT" => match serde_json::from_str::<Value>(rest) {
                    Ok(Value::Object(record)) => {
                        if primary_key(&record, &key).is_none() {
                            println!("ERR record has no '{}' value", key);
                        } else {
                            match store.insert(&record) {
                                Ok(()) => println!("OK"),
                                Err(e) => println!("ERR put failed: {}", e),
                            }
                        }
                    }
                    Ok(_) => println!("ERR usage: PUT {{json object}}"),
                    Err(e) => println!("ERR invalid json: {}", e),
                },
                "DEL" => {
                    if rest.is_empty() {
                        println!("ERR usage: DEL key");
                    } else {
                        match store.delete(&Value::from(rest)) {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR del failed: {}", e),
                        }
                    }
                }
                "STATS" => {
                    println!("{:?}", store);
                }
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => {
                    println!("unknown command: {}", other);
                }
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
