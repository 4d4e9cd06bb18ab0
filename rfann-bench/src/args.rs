/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

/// Build a window search tree over a filtered corpus, then sweep query beam
/// sizes and report QPS and recall for each.
#[derive(Debug, Parser)]
#[command(name = "rfann-bench")]
pub struct Args {
    /// Database vectors in .bin format.
    pub data: PathBuf,

    /// Database filter values (one per line).
    pub filters: PathBuf,

    /// Query vectors in .bin format.
    pub queries: PathBuf,

    /// Query ranges (min-max per line).
    pub query_filters: PathBuf,

    /// Groundtruth in .ivecs format.
    pub groundtruth: PathBuf,

    /// Graph degree parameter.
    pub r: usize,

    /// Build beam size.
    pub l: usize,

    /// Alpha parameter.
    pub alpha: f32,

    /// Cutoff parameter.
    pub cutoff: usize,

    /// Split factor parameter.
    pub split_factor: usize,

    /// Number of neighbors to return.
    pub k: usize,

    /// Comma-separated list of L_search values (e.g. 10,20,50,100),
    /// optionally wrapped in brackets.
    pub l_search_list: String,

    /// Number of threads for index construction (0 = auto). Query execution
    /// is always single-threaded.
    pub threads: usize,
}

/// Parse a comma-separated list of positive integers, tolerating surrounding
/// brackets and a trailing comma.
pub fn parse_l_search_list(input: &str) -> Result<Vec<usize>> {
    let cleaned: String = input.chars().filter(|&c| c != '[' && c != ']').collect();

    let mut values = Vec::new();
    for token in cleaned.split_terminator(',') {
        let token = token.trim();
        let value: usize = match token.parse() {
            Ok(value) => value,
            Err(_) => bail!("invalid L_search value '{token}'"),
        };
        if value == 0 {
            bail!("L_search values must be positive");
        }
        values.push(value);
    }
    if values.is_empty() {
        bail!("L_search list is empty");
    }
    Ok(values)
}

///////////
// Tests //
///////////
