//! High-level runtime orchestrator.
//!
//! The runtime owns the kernel worker, wires up the command channel and the
//! event bus, and exposes a builder-based API for hosts.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use saga_core::ability::AbilityRouter;
use saga_core::kernel::{HookRegistry, MutationKernel};
use saga_core::{GameConfig, WorldState};

use crate::api::{Result, RuntimeError, WorldHandle};
use crate::events::{Event, EventBus, Topic};
use crate::oracle::OracleManager;
use crate::workers::{Command, KernelWorker};

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Used when no [`OracleManager`] is supplied to the builder.
    pub game_config: GameConfig,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
    /// Seed for a freshly created world. Drawn at random when absent.
    pub world_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            game_config: GameConfig::default(),
            event_buffer_size: 100,
            command_buffer_size: 32,
            world_seed: None,
        }
    }
}

/// Main runtime that owns the kernel worker.
///
/// [`WorldHandle`] provides a cloneable entry point for callers.
pub struct Runtime {
    handle: WorldHandle,
    worker_handle: JoinHandle<()>,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    pub fn handle(&self) -> WorldHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.handle.subscribe(topic)
    }

    /// Drops the runtime's handle and waits for the worker to drain.
    ///
    /// The worker keeps running until every cloned [`WorldHandle`] is gone.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.handle);
        self.worker_handle.await.map_err(RuntimeError::WorkerJoin)
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    world: Option<WorldState>,
    oracles: Option<OracleManager>,
    router: Option<AbilityRouter>,
    hooks: Option<HookRegistry>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            world: None,
            oracles: None,
            router: None,
            hooks: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from an existing world instead of an empty one.
    pub fn world(mut self, world: WorldState) -> Self {
        self.world = Some(world);
        self
    }

    pub fn oracles(mut self, oracles: OracleManager) -> Self {
        self.oracles = Some(oracles);
        self
    }

    /// Replace the default ability handlers.
    pub fn router(mut self, router: AbilityRouter) -> Self {
        self.router = Some(router);
        self
    }

    /// Replace the default post-mutation hooks.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Build the runtime and spawn its worker.
    ///
    /// A supplied world has its derived stats recomputed before the worker
    /// accepts commands.
    pub async fn build(self) -> Result<Runtime> {
        let oracles = self
            .oracles
            .unwrap_or_else(|| OracleManager::from_config(self.config.game_config.clone()));
        let hooks = self.hooks.unwrap_or_else(HookRegistry::default_hooks);

        let world = match self.world {
            Some(mut world) => {
                let mut kernel =
                    MutationKernel::with_hooks(&mut world, oracles.as_game_env(), hooks.clone());
                kernel.recompute_all()?;
                world
            }
            None => {
                let seed = self.config.world_seed.unwrap_or_else(rand::random);
                info!(target: "runtime::worker", seed, "created empty world");
                WorldState::new(seed)
            }
        };

        let (command_tx, command_rx) =
            mpsc::channel::<Command>(self.config.command_buffer_size.max(1));
        let event_bus = EventBus::with_capacity(self.config.event_buffer_size);
        let handle = WorldHandle::new(command_tx, event_bus.clone());

        let worker = KernelWorker::new(
            world,
            oracles,
            self.router.unwrap_or_default(),
            hooks,
            command_rx,
            event_bus,
        );
        let worker_handle = tokio::spawn(worker.run());

        Ok(Runtime {
            handle,
            worker_handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{ "world_seed": 9, "command_buffer_size": 4 }"#).unwrap();
        assert_eq!(config.world_seed, Some(9));
        assert_eq!(config.command_buffer_size, 4);
        assert_eq!(config.event_buffer_size, 100);
        assert_eq!(config.game_config, GameConfig::default());
    }

    #[tokio::test]
    async fn shutdown_joins_the_worker() {
        let runtime = Runtime::builder()
            .config(RuntimeConfig {
                world_seed: Some(1),
                ..RuntimeConfig::default()
            })
            .build()
            .await
            .unwrap();
        let handle = runtime.handle();
        assert_eq!(handle.world().await.unwrap().game_seed, 1);
        drop(handle);
        runtime.shutdown().await.unwrap();
    }
}
