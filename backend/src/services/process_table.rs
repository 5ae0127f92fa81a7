//! One live table per event channel.
//!
//! A `ProcessTable` owns the subscription lifecycle for its channel:
//! `activate` acquires a subscription and starts a pump task that folds every
//! event into a fresh `Aggregator`; `deactivate` releases it and throws the
//! accumulated rows away. Every successful apply bumps the table's update
//! counter so views can re-render.

use std::sync::{Arc, Mutex, MutexGuard};

use procview_adapters::{AdapterError, Channel, EventSource, Subscription};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::data_aggregator::{Aggregator, Applied, GroupedEntry};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table for {0} is already active")]
    AlreadyActive(Channel),
    #[error("activation of {0} was superseded by a deactivation")]
    Superseded(Channel),
    #[error("could not subscribe to {channel}: {source}")]
    Subscribe {
        channel: Channel,
        #[source]
        source: AdapterError,
    },
}

/// Channel selector for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    pub channel: Channel,
}

impl TableConfig {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

/// Link state between the table and its event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TableStatus {
    Inactive,
    Subscribed,
    Disconnected { reason: String },
}

/// Consistent view of a table at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub status: TableStatus,
    pub entries: Vec<GroupedEntry>,
    pub total_processes: u64,
}

#[derive(Debug)]
struct Shared {
    active: bool,
    /// Bumped on every activation and deactivation; a pump only writes while
    /// its own generation is current.
    generation: u64,
    aggregator: Aggregator,
    status: TableStatus,
}

impl Shared {
    fn owned_by(&self, generation: u64) -> bool {
        self.active && self.generation == generation
    }
}

pub struct ProcessTable {
    config: TableConfig,
    shared: Arc<Mutex<Shared>>,
    updates: Arc<watch::Sender<u64>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ProcessTable {
    pub fn new(config: TableConfig) -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            config,
            shared: Arc::new(Mutex::new(Shared {
                active: false,
                generation: 0,
                aggregator: Aggregator::new(),
                status: TableStatus::Inactive,
            })),
            updates: Arc::new(updates),
            pump: Mutex::new(None),
        }
    }

    pub fn channel(&self) -> Channel {
        self.config.channel
    }

    /// Subscribes to the configured channel and starts accumulating from an
    /// empty table.
    ///
    /// On failure the table stays inactive and reports the reason through
    /// its status.
    pub async fn activate(&self, source: &dyn EventSource) -> Result<(), TableError> {
        let channel = self.config.channel;
        let generation = {
            let mut shared = lock(&self.shared);
            if shared.active {
                return Err(TableError::AlreadyActive(channel));
            }
            shared.active = true;
            shared.generation += 1;
            shared.aggregator = Aggregator::new();
            shared.status = TableStatus::Subscribed;
            shared.generation
        };

        info!(
            event = "table.activate_started",
            channel = %channel,
            source = %source.describe(),
        );

        let subscription = match source.subscribe(channel).await {
            Ok(subscription) => subscription,
            Err(err) => {
                {
                    let mut shared = lock(&self.shared);
                    if shared.owned_by(generation) {
                        shared.active = false;
                        shared.status = TableStatus::Disconnected {
                            reason: err.to_string(),
                        };
                    }
                }
                self.notify();
                warn!(
                    event = "table.activate_failed",
                    channel = %channel,
                    error = %err,
                );
                return Err(TableError::Subscribe {
                    channel,
                    source: err,
                });
            }
        };

        {
            // Lock order is shared, then pump; `deactivate` follows it too.
            let shared = lock(&self.shared);
            if !shared.owned_by(generation) {
                drop(shared);
                drop(subscription);
                info!(event = "table.activate_superseded", channel = %channel);
                return Err(TableError::Superseded(channel));
            }

            let handle = tokio::spawn(pump(
                subscription,
                Arc::clone(&self.shared),
                Arc::clone(&self.updates),
                generation,
            ));
            if let Some(previous) = lock(&self.pump).replace(handle) {
                previous.abort();
            }
        }

        self.notify();
        info!(event = "table.activate_completed", channel = %channel);
        Ok(())
    }

    /// Releases the subscription and discards the accumulated rows.
    ///
    /// Events still in flight are dropped. Calling this on an inactive table
    /// does nothing.
    pub fn deactivate(&self) {
        let (was_active, pump) = {
            let mut shared = lock(&self.shared);
            let was_active = shared.active;
            shared.active = false;
            shared.generation += 1;
            shared.aggregator = Aggregator::new();
            shared.status = TableStatus::Inactive;
            (was_active, lock(&self.pump).take())
        };

        if let Some(handle) = pump {
            handle.abort();
        }

        self.notify();
        if was_active {
            info!(event = "table.deactivated", channel = %self.config.channel);
        }
    }

    /// Status, rows and total count read under one lock.
    pub fn state(&self) -> TableSnapshot {
        let shared = lock(&self.shared);
        TableSnapshot {
            status: shared.status.clone(),
            entries: shared.aggregator.snapshot(),
            total_processes: shared.aggregator.total_processes(),
        }
    }

    /// Receiver that changes once per applied event or status change.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    fn notify(&self) {
        self.updates.send_modify(|version| *version += 1);
    }
}

impl Drop for ProcessTable {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.pump).take() {
            handle.abort();
        }
    }
}

async fn pump(
    mut subscription: Subscription,
    shared: Arc<Mutex<Shared>>,
    updates: Arc<watch::Sender<u64>>,
    generation: u64,
) {
    let channel = subscription.channel();

    let reason = loop {
        match subscription.recv().await {
            Ok(Some(event)) => {
                let applied = {
                    let mut shared = lock(&shared);
                    if !shared.owned_by(generation) {
                        break None;
                    }
                    shared.aggregator.apply(event)
                };
                updates.send_modify(|version| *version += 1);
                match applied {
                    Applied::Inserted { position } => {
                        debug!(event = "table.group_inserted", channel = %channel, position);
                    }
                    Applied::Merged {
                        position,
                        n_processes,
                    } => {
                        debug!(
                            event = "table.group_merged",
                            channel = %channel,
                            position,
                            n_processes,
                        );
                    }
                }
            }
            Ok(None) => break Some("event source finished".to_string()),
            Err(err) => break Some(err.to_string()),
        }
    };

    subscription.release();

    if let Some(reason) = reason {
        let changed = {
            let mut shared = lock(&shared);
            if shared.owned_by(generation) {
                shared.status = TableStatus::Disconnected {
                    reason: reason.clone(),
                };
                true
            } else {
                false
            }
        };
        if changed {
            updates.send_modify(|version| *version += 1);
            warn!(event = "table.source_disconnected", channel = %channel, reason = %reason);
        }
    }
}
