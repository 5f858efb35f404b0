//! # Producer/Consumer Run
//!
//! ```text
//!   producer-0 ──┐                          ┌── consumer-0 ──┐
//!   producer-1 ──┼──> [ BoundedBuffer ] ────┼── consumer-1 ──┼──> collector (main)
//!   producer-N ──┘                          └── consumer-M ──┘
//! ```
//!
//! Producers put `items_per_producer` tagged items each. Consumers drain the
//! buffer and forward what they got to the main thread, which checks that
//! every item arrived exactly once. Once everything is collected the
//! consumers are parked on an empty buffer; they are interrupted and joined.

use crossbeam_channel::{bounded, unbounded, Receiver};
use handoff_core::{
    interrupt, BoundedBuffer, BufferConfig, BufferError, BufferStats, InterruptHandle,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from a demo run.
#[derive(Error, Debug)]
pub enum DemoError {
    /// Buffer configuration or operation failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// The OS refused to start a worker thread.
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        /// Which kind of worker.
        role: &'static str,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked or vanished.
    #[error("{0} thread exited unexpectedly")]
    WorkerLost(&'static str),
}

/// Demo configuration, loaded from TOML:
///
/// ```toml
/// producers = 4
/// consumers = 3
/// items_per_producer = 250
///
/// [buffer]
/// capacity = 10
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// Shared buffer settings.
    pub buffer: BufferConfig,
    /// Number of producer threads.
    pub producers: usize,
    /// Number of consumer threads.
    pub consumers: usize,
    /// Items each producer puts.
    pub items_per_producer: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            producers: 4,
            consumers: 3,
            items_per_producer: 250,
        }
    }
}

impl DemoConfig {
    /// Parses and validates a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, DemoError> {
        let config: Self =
            toml::from_str(text).map_err(|e| BufferError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DemoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BufferError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), BufferError> {
        self.buffer.validate()?;
        if self.producers == 0 || self.consumers == 0 {
            return Err(BufferError::InvalidConfig(
                "need at least one producer and one consumer".to_string(),
            ));
        }
        if self.producers.checked_mul(self.items_per_producer).is_none() {
            return Err(BufferError::InvalidConfig(format!(
                "{} producers x {} items overflows the item count",
                self.producers, self.items_per_producer
            )));
        }
        Ok(())
    }

    /// Total number of items the run moves.
    ///
    /// Saturates for configs that [`validate`](Self::validate) rejects.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.producers.saturating_mul(self.items_per_producer)
    }
}

/// One unit of work, tagged with its origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Item {
    producer: usize,
    seq: usize,
}

/// Outcome of a run.
#[derive(Clone, Debug)]
pub struct DemoReport {
    /// Items put by all producers.
    pub produced: usize,
    /// Items received by the collector.
    pub consumed: usize,
    /// Items received more than once.
    pub duplicates: usize,
    /// Items never received.
    pub missing: usize,
    /// Items taken by each consumer, by consumer index.
    pub per_consumer: Vec<usize>,
    /// Consumers that ended on an interrupt.
    pub interrupted_consumers: usize,
    /// Buffer counters at the end of the run.
    pub stats: BufferStats,
    /// Wall time of the hand-off phase.
    pub elapsed: Duration,
}

impl DemoReport {
    /// Returns whether every item arrived exactly once.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.duplicates == 0 && self.missing == 0 && self.consumed == self.produced
    }
}

fn join<T>(handle: JoinHandle<T>, role: &'static str) -> Result<T, DemoError> {
    handle.join().map_err(|_| DemoError::WorkerLost(role))
}

/// Interrupts the first `started` workers registered on `handles`.
///
/// Every worker registers before touching the buffer, so this never waits
/// on a worker that is itself blocked.
fn interrupt_workers(handles: &Receiver<InterruptHandle>, started: usize) {
    for handle in handles.iter().take(started) {
        handle.interrupt();
    }
}

/// Runs the demo to completion.
pub fn run(config: &DemoConfig) -> Result<DemoReport, DemoError> {
    config.validate()?;
    let buffer = BoundedBuffer::from_config(&config.buffer)?;
    let total = config.total_items();

    tracing::info!(
        capacity = buffer.capacity(),
        producers = config.producers,
        consumers = config.consumers,
        total,
        "starting hand-off"
    );

    let start = Instant::now();
    let (collect_tx, collect_rx) = unbounded::<Item>();
    // Consumers register first, then producers.
    let (handle_tx, handle_rx) = bounded::<InterruptHandle>(config.consumers + config.producers);

    let mut consumers = Vec::with_capacity(config.consumers);
    for id in 0..config.consumers {
        let buffer = Arc::clone(&buffer);
        let collect_tx = collect_tx.clone();
        let registry = handle_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("consumer-{id}"))
            .spawn(move || {
                if registry.send(interrupt::handle()).is_err() {
                    tracing::debug!("run abandoned before consumer registered");
                    return (0, false);
                }
                drop(registry);
                let mut taken = 0usize;
                loop {
                    match buffer.get() {
                        Ok(item) => {
                            taken += 1;
                            if collect_tx.send(item).is_err() {
                                return (taken, false);
                            }
                        }
                        Err(err) => {
                            tracing::debug!(taken, %err, "consumer stopped");
                            return (taken, err == BufferError::Interrupted);
                        }
                    }
                }
            });
        match spawned {
            Ok(spawned) => consumers.push(spawned),
            Err(source) => {
                drop(handle_tx);
                interrupt_workers(&handle_rx, consumers.len());
                return Err(DemoError::Spawn { role: "consumer", source });
            }
        }
    }
    drop(collect_tx);

    let mut producers = Vec::with_capacity(config.producers);
    for id in 0..config.producers {
        let buffer = Arc::clone(&buffer);
        let items = config.items_per_producer;
        let registry = handle_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("producer-{id}"))
            .spawn(move || -> Result<(), BufferError> {
                if registry.send(interrupt::handle()).is_err() {
                    tracing::debug!("run abandoned before producer registered");
                    return Ok(());
                }
                drop(registry);
                for seq in 0..items {
                    buffer.put(Item { producer: id, seq })?;
                }
                tracing::debug!(items, "producer done");
                Ok(())
            });
        match spawned {
            Ok(spawned) => producers.push(spawned),
            Err(source) => {
                drop(handle_tx);
                interrupt_workers(&handle_rx, consumers.len() + producers.len());
                return Err(DemoError::Spawn { role: "producer", source });
            }
        }
    }
    drop(handle_tx);
    let started = consumers.len() + producers.len();

    let mut seen = HashSet::with_capacity(total);
    let mut duplicates = 0;
    for _ in 0..total {
        let Ok(item) = collect_rx.recv() else {
            interrupt_workers(&handle_rx, started);
            return Err(DemoError::WorkerLost("consumer"));
        };
        if !seen.insert(item) {
            tracing::warn!(?item, "duplicate item");
            duplicates += 1;
        }
    }
    let elapsed = start.elapsed();

    let mut producer_result = Ok(());
    for producer in producers {
        let outcome = join(producer, "producer").and_then(|put| put.map_err(DemoError::from));
        if producer_result.is_ok() {
            producer_result = outcome;
        }
    }

    // Everything is collected, so every consumer is (or soon will be)
    // parked on an empty buffer. Producers have exited; their flags are
    // set on finished threads.
    interrupt_workers(&handle_rx, started);
    producer_result?;

    let mut per_consumer = Vec::with_capacity(config.consumers);
    let mut interrupted_consumers = 0;
    for consumer in consumers {
        let (taken, interrupted) = join(consumer, "consumer")?;
        per_consumer.push(taken);
        if interrupted {
            interrupted_consumers += 1;
        }
    }

    let report = DemoReport {
        produced: total,
        consumed: seen.len() + duplicates,
        duplicates,
        missing: total - seen.len(),
        per_consumer,
        interrupted_consumers,
        stats: buffer.stats(),
        elapsed,
    };

    tracing::info!(
        consumed = report.consumed,
        conserved = report.is_conserved(),
        elapsed = ?report.elapsed,
        "hand-off finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_conserves_items() {
        let config = DemoConfig::default();
        let report = run(&config).unwrap();

        assert!(report.is_conserved());
        assert_eq!(report.produced, 1000);
        assert_eq!(report.per_consumer.iter().sum::<usize>(), 1000);
        assert_eq!(report.interrupted_consumers, 3);
        assert_eq!(report.stats.total_puts, 1000);
        assert_eq!(report.stats.total_gets, 1000);
        assert_eq!(report.stats.interrupted, 3);
        assert!(report.stats.high_water_mark <= 10);
    }

    #[test]
    fn test_single_slot_many_threads() {
        let config = DemoConfig {
            buffer: BufferConfig::with_capacity(1),
            producers: 6,
            consumers: 6,
            items_per_producer: 50,
        };
        let report = run(&config).unwrap();

        assert!(report.is_conserved());
        assert_eq!(report.consumed, 300);
        assert_eq!(report.stats.high_water_mark, 1);
    }

    #[test]
    fn test_config_from_toml() {
        let config = DemoConfig::from_toml_str(
            "producers = 2\nconsumers = 5\nitems_per_producer = 7\n\n[buffer]\ncapacity = 3\n",
        )
        .unwrap();

        assert_eq!(config.producers, 2);
        assert_eq!(config.consumers, 5);
        assert_eq!(config.total_items(), 14);
        assert_eq!(config.buffer.capacity, 3);
    }

    #[test]
    fn test_config_partial_toml_uses_defaults() {
        let config = DemoConfig::from_toml_str("producers = 1").unwrap();
        assert_eq!(config.producers, 1);
        assert_eq!(config.consumers, 3);
        assert_eq!(config.buffer, BufferConfig::default());
    }

    #[test]
    fn test_config_rejects_zero_workers() {
        let err = DemoConfig::from_toml_str("consumers = 0").unwrap_err();
        assert!(matches!(err, DemoError::Buffer(BufferError::InvalidConfig(_))));

        let err = DemoConfig::from_toml_str("[buffer]\ncapacity = 0").unwrap_err();
        assert!(matches!(err, DemoError::Buffer(BufferError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_rejects_overflowing_item_count() {
        let err = DemoConfig::from_toml_str(&format!(
            "producers = 3\nitems_per_producer = {}",
            usize::MAX / 2
        ))
        .unwrap_err();
        match err {
            DemoError::Buffer(BufferError::InvalidConfig(msg)) => {
                assert!(msg.contains("overflows"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let config = DemoConfig {
            producers: 3,
            items_per_producer: usize::MAX / 2,
            ..DemoConfig::default()
        };
        assert_eq!(config.total_items(), usize::MAX);
        assert!(matches!(
            run(&config),
            Err(DemoError::Buffer(BufferError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_interrupt_workers_releases_parked_consumers() {
        let buffer: Arc<BoundedBuffer<u32>> = BoundedBuffer::new(2);
        let (handle_tx, handle_rx) = bounded(2);

        let parked: Vec<_> = (0..2)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                let handle_tx = handle_tx.clone();
                thread::spawn(move || {
                    handle_tx.send(interrupt::handle()).unwrap();
                    buffer.get()
                })
            })
            .collect();
        drop(handle_tx);

        interrupt_workers(&handle_rx, 2);

        for consumer in parked {
            assert_eq!(consumer.join().unwrap(), Err(BufferError::Interrupted));
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_items_still_terminates() {
        let config = DemoConfig {
            items_per_producer: 0,
            ..DemoConfig::default()
        };
        let report = run(&config).unwrap();

        assert!(report.is_conserved());
        assert_eq!(report.consumed, 0);
        assert_eq!(report.interrupted_consumers, 3);
    }
}
