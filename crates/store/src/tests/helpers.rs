use crate::*;
use anyhow::Result;
use serde_json::Value;

/// Four JDBC driver records keyed by `name`.
pub const DRIVERS: &str = include_str!("fixtures/drivers.json");

pub const DRIVER_NAMES: [&str; 4] = [
    "Oracle Thin Driver",
    "Derby Network Client",
    "SQL Server (jTDS)",
    "HSQLDB",
];

pub fn drivers() -> MemorySource {
    MemorySource::new("drivers.json", DRIVERS)
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

/// Returns the `name` field of every record in the merged view.
pub fn names(store: &mut LayeredStore) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for record in store.iter()? {
        let record = record?;
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<none>")
            .to_string();
        out.push(name);
    }
    Ok(out)
}
