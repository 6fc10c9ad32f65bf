//! Scheduler handle
//!
//! The scheduler owns the process-wide handle to the execution backend.
//! It is connected once at startup and shared by every run pipeline for
//! the lifetime of the daemon; the local/cluster choice is made here, at
//! construction time, never per run.

use std::sync::Arc;
use tracing::info;

use crate::backend::{ExecutionBackend, GatewayBackend, ProcessBackend};
use crate::config::{Config, ExecutionMode};

/// Process-wide handle to the execution backend
pub struct Scheduler {
    address: String,
    backend: Arc<dyn ExecutionBackend>,
}

impl Scheduler {
    /// Connect the backend selected by the configuration
    pub fn connect(config: &Config) -> anyhow::Result<Self> {
        let (address, backend): (String, Arc<dyn ExecutionBackend>) = match config.mode {
            ExecutionMode::Local => {
                let address = format!("local:{}", config.work_dir.display());
                let backend =
                    ProcessBackend::new(config.interpreter.clone(), config.work_dir.clone());
                (address, Arc::new(backend))
            }
            ExecutionMode::Cluster => {
                let backend = GatewayBackend::new(config.gateway_url.clone());
                (config.gateway_url.clone(), Arc::new(backend))
            }
        };

        info!("Execution backend connected at {}", address);

        Ok(Self { address, backend })
    }

    /// Address of the connected backend
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The shared backend handle
    pub fn backend(&self) -> Arc<dyn ExecutionBackend> {
        Arc::clone(&self.backend)
    }
}
