//! Binary snapshot serialization for protocol messages.
//!
//! Writes any prost message to a file in its wire encoding and reads it
//! back. Used for ad-hoc catalog exports; this is not a durability layer.

use std::fs;
use std::path::Path;

use prost::Message;

use crate::error::{Error, Result};

/// Encodes `message` and writes it to `path`, truncating any existing file.
pub fn write_to_file<M: Message>(message: &M, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let encoded = message.encode_to_vec();

    fs::write(path, encoded).map_err(|e| Error::Storage {
        context: format!("cannot write snapshot {}: {e}", path.display()),
    })
}

/// Reads and decodes a message of type `M` from `path`.
pub fn read_from_file<M: Message + Default>(path: impl AsRef<Path>) -> Result<M> {
    let path = path.as_ref();

    let encoded = fs::read(path).map_err(|e| Error::Storage {
        context: format!("cannot read snapshot {}: {e}", path.display()),
    })?;

    M::decode(encoded.as_slice()).map_err(|e| Error::Storage {
        context: format!("cannot decode snapshot {}: {e}", path.display()),
    })
}
