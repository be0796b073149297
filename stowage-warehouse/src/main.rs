//! Simulator binary: run the warehouse for a fixed duration, then print the
//! order and loader reports.

use anyhow::Context;
use clap::Parser;
use stowage_warehouse::config::Cli;
use stowage_warehouse::stats::WarehouseReports;
use stowage_warehouse::Warehouse;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn print_reports(reports: &WarehouseReports) {
    println!("\n=== Order state report ===");
    println!("waiting:           {}", reports.orders.states.waiting);
    println!("picking queued:    {}", reports.orders.states.picking_queued);
    println!("actively picking:  {}", reports.orders.states.actively_picking);
    println!("partially shipped: {}", reports.orders.states.partially_shipped);
    println!("completed:         {}", reports.orders.states.completed);

    println!("\nCompletion-duration histogram:");
    for bucket in &reports.orders.completion_histogram {
        println!(
            "[{}ms - {}ms]: {}",
            bucket.start.as_millis(),
            bucket.end.as_millis(),
            bucket.count
        );
    }

    println!("\n=== Loader report ===");
    for loader in &reports.loaders.stats {
        println!("loader #{} rest time: {}ms", loader.loader_id, loader.rest_time.as_millis());
        for (kind, count) in &loader.tasks_completed {
            println!("  {kind}: {count}");
        }
    }
    println!("rest ratio: {:.4}", reports.loaders.rest_ratio);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Cli::parse().into_config();
    let duration = Duration::from_secs(config.simulation_seconds);

    let mut warehouse = Warehouse::new(config).context("invalid simulation config")?;
    warehouse.start().context("failed to start warehouse")?;

    std::thread::sleep(duration);

    warehouse.stop();
    warehouse.wait();

    print_reports(&warehouse.build_reports());
    Ok(())
}
