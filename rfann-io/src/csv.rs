/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Line-oriented filter files.
//!
//! The corpus filter file carries exactly one float per line. The query filter
//! file carries one `<min>-<max>` pair per line, split at the first ASCII `-`.
//! Malformed lines are fatal and reported with their 1-based line number.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterCsvError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("non-float or empty value at line {line}")]
    NotAFloat { line: usize },
    #[error("more than one value on line {line}")]
    ExtraTokens { line: usize },
}

/// Read one filter value per line.
pub fn read_filters(reader: impl BufRead) -> Result<Vec<f32>, FilterCsvError> {
    let mut values = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;

        let mut tokens = line.split_whitespace();
        let value = tokens
            .next()
            .and_then(|token| token.parse::<f32>().ok())
            .ok_or(FilterCsvError::NotAFloat { line: number })?;
        if tokens.next().is_some() {
            return Err(FilterCsvError::ExtraTokens { line: number });
        }
        values.push(value);
    }
    Ok(values)
}

/// Read a filter file from disk.
pub fn read_filters_file(path: impl AsRef<Path>) -> Result<Vec<f32>, FilterCsvError> {
    read_filters(BufReader::new(File::open(path)?))
}

#[derive(Debug, Error)]
pub enum RangeCsvError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid format on line {line}: expected 'min-max'")]
    MissingSeparator { line: usize },
    #[error("invalid number on line {line}")]
    NotAFloat { line: usize },
}

/// Read one `<min>-<max>` filter range per line.
pub fn read_query_ranges(reader: impl BufRead) -> Result<Vec<(f32, f32)>, RangeCsvError> {
    let mut ranges = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;

        let (min, max) = line
            .trim_end()
            .split_once('-')
            .ok_or(RangeCsvError::MissingSeparator { line: number })?;
        let min = min
            .trim()
            .parse::<f32>()
            .map_err(|_| RangeCsvError::NotAFloat { line: number })?;
        let max = max
            .trim()
            .parse::<f32>()
            .map_err(|_| RangeCsvError::NotAFloat { line: number })?;
        ranges.push((min, max));
    }
    Ok(ranges)
}

/// Read a query range file from disk.
pub fn read_query_ranges_file(path: impl AsRef<Path>) -> Result<Vec<(f32, f32)>, RangeCsvError> {
    read_query_ranges(BufReader::new(File::open(path)?))
}

///////////
// Tests //
///////////
