/// Records and their on-disk text form.
///
/// Live data is newline-delimited JSON, one record per line. The reader also
/// accepts a single JSON array so that default datasets can be ordinary
/// `.json` documents.
use serde_json::de::IoRead;
use serde_json::{Map, StreamDeserializer, Value};
use std::io::{self, BufRead, BufReader, Read, Write};

use crate::StoreError;

/// A structured record: an ordered map of field name to JSON value.
pub type Record = Map<String, Value>;

/// Returns the primary-key value of `record`.
///
/// A missing field and an explicit `null` both yield `None`, so keyless
/// records never match anything.
pub fn primary_key<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.get(field).filter(|v| !v.is_null())
}

/// Appends `record` to `w` as a single NDJSON line.
pub(crate) fn write_record<W: Write>(w: &mut W, record: &Record) -> Result<(), StoreError> {
    serde_json::to_writer(&mut *w, record)?;
    w.write_all(b"\n")?;
    Ok(())
}

/// Lazy iterator over the records of a JSON byte stream.
///
/// NDJSON (or any whitespace-separated sequence of objects) is parsed one
/// record at a time. A top-level array is parsed in one go on construction.
/// The iterator fuses after the first error.
pub struct JsonRecords<R: Read> {
    state: State<R>,
}

enum State<R: Read> {
    Stream(StreamDeserializer<'static, IoRead<BufReader<R>>, Record>),
    Buffered(std::vec::IntoIter<Record>),
    Done,
}

impl<R: Read> JsonRecords<R> {
    /// Sniffs the first non-whitespace byte of `reader` to pick the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be read, or if it holds an array
    /// that does not parse as a list of objects.
    pub fn new(reader: R) -> Result<Self, StoreError> {
        let mut reader = BufReader::new(reader);

        let state = match first_significant_byte(&mut reader)? {
            None => State::Done,
            Some(b'[') => {
                let records: Vec<Record> = serde_json::from_reader(reader)?;
                State::Buffered(records.into_iter())
            }
            Some(_) => State::Stream(serde_json::Deserializer::from_reader(reader).into_iter()),
        };

        Ok(Self { state })
    }
}

impl<R: Read> Iterator for JsonRecords<R> {
    type Item = Result<Record, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match &mut self.state {
            State::Stream(stream) => stream.next().map(|r| r.map_err(StoreError::from)),
            State::Buffered(records) => records.next().map(Ok),
            State::Done => None,
        };

        if matches!(item, None | Some(Err(_))) {
            self.state = State::Done;
        }
        item
    }
}

/// Skips leading whitespace and returns the next byte without consuming it.
fn first_significant_byte<B: BufRead>(reader: &mut B) -> io::Result<Option<u8>> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }

        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(pos) => {
                let byte = buf[pos];
                reader.consume(pos);
                return Ok(Some(byte));
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}
