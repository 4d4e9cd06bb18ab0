/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Read and write vectors in the flat binary format.
//!
//! The format is:
//! - 8-byte header
//!   - `npoints` (u32 LE)
//!   - `dim` (u32 LE)
//! - Payload: `npoints * dim` `f32` values, tightly packed in row-major order

use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom, Write},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

/// A vector file loaded into memory: `npoints` rows of `dim` values each.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorData {
    pub data: Vec<f32>,
    pub npoints: usize,
    pub dim: usize,
}

#[derive(Debug, Error)]
pub enum ReadBinError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("header dimensions {npoints} x {dim} overflow the addressable size")]
    Overflow { npoints: u32, dim: u32 },
    #[error(
        "file declares {npoints} x {dim} f32 values ({expected} payload bytes) but only \
         {available} bytes are present"
    )]
    Truncated {
        npoints: u32,
        dim: u32,
        expected: u64,
        available: u64,
    },
}

/// Read a vector file from `reader`.
///
/// Validates that the reader contains enough data before allocating.
pub fn read_bin(reader: &mut (impl Read + Seek)) -> Result<VectorData, ReadBinError> {
    let npoints = reader.read_u32::<LittleEndian>()?;
    let dim = reader.read_u32::<LittleEndian>()?;

    let values = (npoints as u64).checked_mul(dim as u64);
    let expected = values.and_then(|v| v.checked_mul(std::mem::size_of::<f32>() as u64));
    let (values, expected) = match (values, expected) {
        (Some(values), Some(expected)) if usize::try_from(values).is_ok() => (values, expected),
        _ => return Err(ReadBinError::Overflow { npoints, dim }),
    };

    let payload_start = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;
    let available = end - payload_start;
    reader.seek(SeekFrom::Start(payload_start))?;

    if available < expected {
        return Err(ReadBinError::Truncated {
            npoints,
            dim,
            expected,
            available,
        });
    }

    let mut data = vec![0.0f32; values as usize];
    reader.read_exact(bytemuck::cast_slice_mut::<f32, u8>(&mut data))?;

    Ok(VectorData {
        data,
        npoints: npoints as usize,
        dim: dim as usize,
    })
}

/// Read a vector file from disk.
pub fn read_bin_file(path: impl AsRef<Path>) -> Result<VectorData, ReadBinError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_bin(&mut reader)
}

/// Write `npoints` rows of `dim` values in the flat binary format.
///
/// # Panics
///
/// Panics if `data.len() != npoints * dim` or if either count exceeds `u32`.
pub fn write_bin(
    data: &[f32],
    npoints: usize,
    dim: usize,
    writer: &mut impl Write,
) -> std::io::Result<()> {
    assert_eq!(data.len(), npoints * dim, "data length mismatches the shape");
    writer.write_u32::<LittleEndian>(u32::try_from(npoints).expect("npoints exceeds u32"))?;
    writer.write_u32::<LittleEndian>(u32::try_from(dim).expect("dim exceeds u32"))?;
    writer.write_all(bytemuck::cast_slice::<f32, u8>(data))
}

///////////
// Tests //
///////////
