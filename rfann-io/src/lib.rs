/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! # rfann-io
//!
//! Readers and writers for the dataset file formats consumed by the rfann
//! benchmark driver: `.bin` vector files, `.ivecs` ground-truth files, and the
//! one-value-per-line filter CSVs.
//!
//! All parse failures are fatal and carry enough context (byte counts, line
//! numbers) for the driver to report them verbatim.

pub mod bin;
pub use bin::{ReadBinError, VectorData, read_bin, read_bin_file, write_bin};

pub mod csv;
pub use csv::{
    FilterCsvError, RangeCsvError, read_filters, read_filters_file, read_query_ranges,
    read_query_ranges_file,
};

pub mod ivecs;
pub use ivecs::{ReadIvecsError, read_ivecs, read_ivecs_file};
