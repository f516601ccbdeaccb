//! Actor registry: factory for creating actors from config.

use std::sync::Arc;

use relay_core::config::{ActorConfig, AppConfig};
use relay_core::{ActorStatus, MarketDataReader, MarketDataWriter, Outcome};
use tracing::{info, warn};

use crate::broker::{Broker, BrokerReader, BrokerWriter, MemoryBroker};
use crate::price_api::PriceApiReader;
use crate::store::{MemoryStore, StoreReader, StoreWriter, TimeSeriesStore};

/// Backend instances shared by every actor of a kind.
#[derive(Clone)]
pub struct Backends {
    pub broker: Arc<dyn Broker>,
    pub store: Arc<dyn TimeSeriesStore>,
}

impl Backends {
    /// In-process broker and store.
    pub fn in_memory() -> Self {
        Self { broker: Arc::new(MemoryBroker::new()), store: Arc::new(MemoryStore::new()) }
    }
}

/// One constructed actor.
pub enum AnyActor {
    Reader(Arc<dyn MarketDataReader>),
    Writer(Arc<dyn MarketDataWriter>),
}

/// Create one actor based on the `kind` of its config.
pub fn create_actor(config: &ActorConfig, backends: &Backends) -> AnyActor {
    match config {
        ActorConfig::PriceApi(c) => AnyActor::Reader(Arc::new(PriceApiReader::new(c.clone()))),
        ActorConfig::BrokerReader(c) => AnyActor::Reader(Arc::new(BrokerReader::new(c.clone(), Arc::clone(&backends.broker)))),
        ActorConfig::BrokerWriter(c) => AnyActor::Writer(Arc::new(BrokerWriter::new(c.clone(), Arc::clone(&backends.broker)))),
        ActorConfig::StoreReader(c) => AnyActor::Reader(Arc::new(StoreReader::new(c.clone(), Arc::clone(&backends.store)))),
        ActorConfig::StoreWriter(c) => AnyActor::Writer(Arc::new(StoreWriter::new(c.clone(), Arc::clone(&backends.store)))),
    }
}

/// Readers and writers built from one config, in config order.
#[derive(Default, Clone)]
pub struct ActorSet {
    pub readers: Vec<Arc<dyn MarketDataReader>>,
    pub writers: Vec<Arc<dyn MarketDataWriter>>,
}

impl ActorSet {
    pub fn len(&self) -> usize {
        self.readers.len() + self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Initialize every actor. Actors that fail stay in the set; their
    /// operations keep reporting `*_NOT_INITIALIZED`.
    ///
    /// Returns how many actors came up.
    pub async fn initialize_all(&self) -> usize {
        let mut ready = 0;
        for reader in &self.readers {
            ready += usize::from(log_lifecycle(reader.name(), "initialize", reader.initialize().await));
        }
        for writer in &self.writers {
            ready += usize::from(log_lifecycle(writer.name(), "initialize", writer.initialize().await));
        }
        ready
    }

    /// Clean up every actor, writers first so nothing is published into a
    /// half-closed backend.
    pub async fn cleanup_all(&self) {
        for writer in &self.writers {
            log_lifecycle(writer.name(), "cleanup", writer.cleanup().await);
        }
        for reader in &self.readers {
            log_lifecycle(reader.name(), "cleanup", reader.cleanup().await);
        }
    }

    pub fn statuses(&self) -> Vec<ActorStatus> {
        let readers = self.readers.iter().map(|r| r.status());
        readers.chain(self.writers.iter().map(|w| w.status())).collect()
    }
}

fn log_lifecycle(actor: &str, step: &str, outcome: Outcome<()>) -> bool {
    match outcome {
        Outcome::Success(()) => {
            info!("[{actor}] {step} ok");
            true
        }
        Outcome::Failure(e) => {
            warn!("[{actor}] {step} failed: {e}");
            false
        }
    }
}

/// Create every actor listed in `config`.
pub fn create_actors(config: &AppConfig, backends: &Backends) -> ActorSet {
    let mut set = ActorSet::default();
    for actor in &config.actors {
        match create_actor(actor, backends) {
            AnyActor::Reader(r) => set.readers.push(r),
            AnyActor::Writer(w) => set.writers.push(w),
        }
    }
    info!("created {} reader(s), {} writer(s)", set.readers.len(), set.writers.len());
    set
}
