/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Combined build-and-query benchmark driver.
//!
//! Loads a filtered corpus, builds a window search tree once (timed, parallel),
//! then runs every query against it once per `L_search` value (timed,
//! single-threaded) and reports QPS and recall in a grep-stable format.

mod args;
mod recall;
mod telemetry;

use std::time::Instant;

use anyhow::{Context, Result, ensure};
use clap::Parser;

use rfann::{BuildParams, QueryParams, TreeParams, WindowTree};

use crate::{
    args::{Args, parse_l_search_list},
    recall::knn_recall,
    telemetry::ThreadMonitor,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    run(&Args::parse())
}

fn run(args: &Args) -> Result<()> {
    ensure!(args.k > 0, "k must be positive");
    let l_search_list = parse_l_search_list(&args.l_search_list)?;

    // ---- Data loading (not timed) ----
    let data = rfann_io::read_bin_file(&args.data)
        .with_context(|| format!("cannot read {}", args.data.display()))?;
    let filters = rfann_io::read_filters_file(&args.filters)
        .with_context(|| format!("cannot read {}", args.filters.display()))?;
    ensure!(
        data.npoints == filters.len(),
        "points ({}) and filters ({}) size mismatch",
        data.npoints,
        filters.len()
    );
    tracing::info!(points = data.npoints, dim = data.dim, "loaded database");

    let queries = rfann_io::read_bin_file(&args.queries)
        .with_context(|| format!("cannot read {}", args.queries.display()))?;
    ensure!(
        queries.dim == data.dim,
        "query dimension ({}) doesn't match data dimension ({})",
        queries.dim,
        data.dim
    );
    let query_ranges = rfann_io::read_query_ranges_file(&args.query_filters)
        .with_context(|| format!("cannot read {}", args.query_filters.display()))?;
    ensure!(
        queries.npoints == query_ranges.len(),
        "queries ({}) and query filters ({}) size mismatch",
        queries.npoints,
        query_ranges.len()
    );
    ensure!(queries.npoints > 0, "query file contains no vectors");

    let mut groundtruth: Vec<Vec<u32>> = rfann_io::read_ivecs_file(&args.groundtruth)
        .with_context(|| format!("cannot read {}", args.groundtruth.display()))?
        .into_iter()
        .map(|row| row.into_iter().map(|id| id as u32).collect())
        .collect();
    ensure!(
        groundtruth.len() == queries.npoints,
        "ground truth size ({}) doesn't match queries ({})",
        groundtruth.len(),
        queries.npoints
    );
    for row in &mut groundtruth {
        row.truncate(args.k);
    }
    tracing::info!(queries = queries.npoints, "loaded queries and ground truth");

    // ---- Index construction (timed) ----
    let build_params = BuildParams::new(args.r, args.l, args.alpha)?;
    let tree_params = TreeParams {
        cutoff: args.cutoff,
        split_factor: args.split_factor,
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build()
        .context("cannot create the construction thread pool")?;

    let build_monitor = ThreadMonitor::start();
    let build_start = Instant::now();
    let tree: WindowTree = pool.install(|| {
        WindowTree::build(data.data, data.dim, &filters, tree_params, &build_params)
    })?;
    let build_seconds = build_start.elapsed().as_secs_f64();
    let build_threads = build_monitor.stop();
    drop(pool);
    tracing::info!(seconds = build_seconds, "index construction complete");

    // ---- Query execution (timed per L_search, single-threaded) ----
    let query_monitor = ThreadMonitor::start();
    let mut metrics = Vec::with_capacity(l_search_list.len());
    for &l_search in &l_search_list {
        let params = QueryParams::new(args.k, l_search)?;

        let mut results = Vec::with_capacity(queries.npoints);
        let sweep_start = Instant::now();
        for (query, &range) in queries
            .data
            .chunks_exact(queries.dim.max(1))
            .zip(&query_ranges)
        {
            let found = tree.optimized_postfiltering_search(query, range, &params)?;
            results.push(
                found
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect::<Vec<u32>>(),
            );
        }
        let seconds = sweep_start.elapsed().as_secs_f64();

        metrics.push((
            l_search,
            queries.npoints as f64 / seconds,
            knn_recall(&results, &groundtruth, args.k),
        ));
    }
    let query_threads = query_monitor.stop();

    // ---- Report ----
    telemetry::print_memory_footprint();
    println!("Maximum number of threads during index construction: {build_threads}");
    println!("Maximum number of threads during query execution: {query_threads}");
    println!("Index construction time: {build_seconds:.3} s");
    for (l_search, qps, recall) in metrics {
        println!("L_search: {l_search} QPS: {qps:.3} Recall: {recall:.5}");
    }

    Ok(())
}
