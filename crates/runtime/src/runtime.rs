//! High-level runtime orchestrator.
//!
//! The runtime owns the simulation worker, wires up command/event channels,
//! and exposes a builder-based API for clients to drive a session.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use action_content::{ActionCatalog, SessionConfig};
use action_core::BehaviorRegistry;

use crate::api::{Result, RuntimeError, RuntimeHandle};
use crate::events::EventBus;
use crate::session::Session;
use crate::workers::{Command, SimulationWorker};

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub session: SessionConfig,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        SessionConfig::default().into()
    }
}

impl From<SessionConfig> for RuntimeConfig {
    fn from(session: SessionConfig) -> Self {
        Self {
            event_buffer_size: session.event_buffer_size,
            command_buffer_size: session.command_buffer_size,
            session,
        }
    }
}

/// Main runtime that hosts a session on a background task
///
/// [`RuntimeHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    handle: RuntimeHandle,
    sim_worker_handle: JoinHandle<()>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Build a runtime from `config` with the embedded catalog and builtin behaviors.
    pub async fn start(config: RuntimeConfig) -> Result<Runtime> {
        Self::builder().config(config).build().await
    }

    /// Get a cloneable handle to this runtime
    ///
    /// The handle can be shared across clients and async tasks.
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Shutdown the runtime gracefully
    ///
    /// The worker exits once every outstanding handle clone is dropped.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.handle);

        self.sim_worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    catalog: Option<ActionCatalog>,
    registry: Option<BehaviorRegistry>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            catalog: None,
            registry: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Action definitions for every peer. Defaults to the embedded catalog.
    pub fn catalog(mut self, catalog: ActionCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Behavior constructors. Defaults to [`BehaviorRegistry::with_builtins`].
    pub fn registry(mut self, registry: BehaviorRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the runtime
    pub async fn build(self) -> Result<Runtime> {
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => ActionCatalog::builtin().map_err(|e| RuntimeError::Content(format!("{e:#}")))?,
        };
        let registry = self.registry.unwrap_or_else(BehaviorRegistry::with_builtins);

        let event_bus = EventBus::with_capacity(self.config.event_buffer_size);
        let session =
            Session::new(self.config.session, catalog, registry)?.with_event_bus(event_bus.clone());

        let (command_tx, command_rx) =
            mpsc::channel::<Command>(self.config.command_buffer_size.max(1));
        let handle = RuntimeHandle::new(command_tx, event_bus);

        let sim_worker = SimulationWorker::new(session, command_rx);
        let sim_worker_handle = tokio::spawn(async move {
            sim_worker.run().await;
        });

        Ok(Runtime {
            handle,
            sim_worker_handle,
        })
    }
}
