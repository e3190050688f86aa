//! Caller-facing lifecycle of a registration supervisor.
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`.
//! A panic inside the supervisor task is caught by the join and logged.

use std::sync::Arc;

use beacon_catalog::{AgentApi, HttpCatalog, HttpCatalogOptions};
use beacon_core::IdGenerator;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use super::probe::HealthProbe;
use super::session::RegistrationSession;
use super::supervisor::RegistrationSupervisor;
use crate::config::{RegistrationConfig, SetupError};

/// Keeps a service registered until closed.
///
/// Owns exactly one background supervisor task. [`close`](Self::close)
/// consumes the handle, so it cannot be closed twice. Dropping the handle
/// without closing cancels the task but does not wait for it, so the final
/// deregistration may still be in flight.
///
/// Must be created inside a Tokio runtime.
#[derive(Debug)]
pub struct ServiceHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ServiceHandle {
    /// Spawns a supervisor with an entropy-seeded identifier source.
    pub fn start(
        agent: Arc<dyn AgentApi>,
        config: RegistrationConfig,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        Self::start_with_ids(agent, config, probe, IdGenerator::from_entropy())
    }

    /// Spawns a supervisor drawing identifiers from `ids`.
    pub fn start_with_ids(
        agent: Arc<dyn AgentApi>,
        config: RegistrationConfig,
        probe: Arc<dyn HealthProbe>,
        ids: IdGenerator,
    ) -> Self {
        let cancel = CancellationToken::new();
        let supervisor =
            RegistrationSupervisor::new(RegistrationSession::new(agent, probe, config), ids);
        let task = tokio::spawn(supervisor.run(cancel.clone()));

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Returns true while the supervisor task has not finished.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels the supervisor and waits for it to exit, including the
    /// final deregistration.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Registration supervisor task panicked");
            }
        }
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Registers `config` with an HTTP catalog and keeps it alive.
///
/// # Errors
///
/// - `SetupError::Config` if `config` fails validation
/// - `SetupError::Catalog` if the catalog client cannot be built
///
/// Catalog unavailability is handled by retrying in the background.
pub fn register(
    config: RegistrationConfig,
    options: HttpCatalogOptions,
    probe: Arc<dyn HealthProbe>,
) -> Result<ServiceHandle, SetupError> {
    config.validate()?;
    let catalog = HttpCatalog::new(options)?;
    Ok(ServiceHandle::start(Arc::new(catalog), config, probe))
}
