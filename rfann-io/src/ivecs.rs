/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The `.ivecs` ground-truth format: a stream of records, each an `i32`
//! length followed by that many `i32` neighbor ids, concatenated to
//! end-of-file.

use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadIvecsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("record {record} declares a negative length {len}")]
    NegativeLength { record: usize, len: i32 },
    #[error("record {record} is truncated")]
    Truncated { record: usize },
}

/// Read every record from `reader`.
pub fn read_ivecs(mut reader: impl Read) -> Result<Vec<Vec<i32>>, ReadIvecsError> {
    let mut records = Vec::new();
    loop {
        let record = records.len();
        let len = match reader.read_i32::<LittleEndian>() {
            Ok(len) => len,
            // A clean end-of-file at a record boundary terminates the stream.
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        };
        if len < 0 {
            return Err(ReadIvecsError::NegativeLength { record, len });
        }

        let mut ids = vec![0i32; len as usize];
        reader
            .read_i32_into::<LittleEndian>(&mut ids)
            .map_err(|err| match err.kind() {
                ErrorKind::UnexpectedEof => ReadIvecsError::Truncated { record },
                _ => ReadIvecsError::Io(err),
            })?;
        records.push(ids);
    }
    Ok(records)
}

/// Read an `.ivecs` file from disk.
pub fn read_ivecs_file(path: impl AsRef<Path>) -> Result<Vec<Vec<i32>>, ReadIvecsError> {
    read_ivecs(BufReader::new(File::open(path)?))
}

///////////
// Tests //
///////////
