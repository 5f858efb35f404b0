//! # HANDOFF Demo Driver
//!
//! Pushes tagged items from several producer threads to several consumer
//! threads through one bounded buffer and verifies conservation.
//!
//! Usage: `handoff [config.toml]`
//!
//! Logging is controlled by `RUST_LOG` (default `handoff=info,handoff_core=info`).

mod demo;
mod trace;

use demo::{DemoConfig, DemoReport};
use std::process::ExitCode;

fn print_report(config: &DemoConfig, report: &DemoReport) {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║           HANDOFF - BOUNDED BUFFER RUN                           ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("Configuration:");
    println!("  Capacity:      {}", config.buffer.capacity);
    println!("  Producers:     {}", config.producers);
    println!("  Consumers:     {}", config.consumers);
    println!("  Items each:    {}", config.items_per_producer);
    println!();
    println!("--- Hand-off ---");
    println!("  Produced:      {}", report.produced);
    println!("  Consumed:      {}", report.consumed);
    println!("  Duplicates:    {}", report.duplicates);
    println!("  Missing:       {}", report.missing);
    println!("  Per consumer:  {:?}", report.per_consumer);
    println!("  Interrupted:   {} consumers", report.interrupted_consumers);
    println!("  Time:          {:?}", report.elapsed);
    println!();
    println!("--- Buffer Stats ---");
    println!("  Puts:            {}", report.stats.total_puts);
    println!("  Gets:            {}", report.stats.total_gets);
    println!("  Producer waits:  {}", report.stats.producer_waits);
    println!("  Consumer waits:  {}", report.stats.consumer_waits);
    println!("  Aborted waits:   {}", report.stats.interrupted);
    println!("  High water mark: {}", report.stats.high_water_mark);
    println!();
}

fn main() -> ExitCode {
    trace::init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => DemoConfig::load(&path),
        None => Ok(DemoConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            return ExitCode::FAILURE;
        }
    };

    let report = match demo::run(&config) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            return ExitCode::FAILURE;
        }
    };

    print_report(&config, &report);

    if report.is_conserved() {
        println!("RESULT: every item delivered exactly once");
        ExitCode::SUCCESS
    } else {
        println!("RESULT: conservation violated");
        ExitCode::FAILURE
    }
}
