//! One registration attempt: register, heartbeat, deregister.
//!
//! ```text
//! Registering ──ok──▶ Heartbeating ──cancel / heartbeat error──▶ Deregistering ──▶ done
//!      │
//!      └──error──▶ done (nothing to clean up)
//! ```

use std::sync::Arc;

use beacon_catalog::AgentApi;
use beacon_core::{CatalogResult, HealthStatus, IdGenerator, Registration, ServiceId};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::probe::HealthProbe;
use crate::config::RegistrationConfig;

/// Runs single registration sessions against a catalog agent.
///
/// Holds no per-attempt state; every [`run`](Self::run) draws fresh
/// identifiers from the generator it is given.
pub struct RegistrationSession {
    agent: Arc<dyn AgentApi>,
    probe: Arc<dyn HealthProbe>,
    config: RegistrationConfig,
}

impl RegistrationSession {
    pub fn new(
        agent: Arc<dyn AgentApi>,
        probe: Arc<dyn HealthProbe>,
        config: RegistrationConfig,
    ) -> Self {
        Self {
            agent,
            probe,
            config,
        }
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Builds the registration for one attempt.
    pub fn registration(&self, ids: &mut IdGenerator) -> Registration {
        Registration::new(
            ids.service_id(),
            ids.check_id(),
            self.config.service.clone(),
            self.config.port,
            self.config.interval,
        )
        .with_address(self.config.address.clone())
        .with_tags(self.config.tags.clone())
        .with_proxy(self.config.proxy.clone())
    }

    /// Runs one session until a heartbeat fails or `cancel` fires.
    ///
    /// Returns `Ok(())` on cancellation. A registration failure is returned
    /// as-is without deregistering. Once registered, the service is always
    /// deregistered before returning, bounded by `cleanup_timeout` and
    /// independent of `cancel`.
    pub async fn run(
        &self,
        ids: &mut IdGenerator,
        cancel: &CancellationToken,
    ) -> CatalogResult<()> {
        let registration = self.registration(ids);

        let registered = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(service = %registration.name, "Cancelled before registration completed");
                return Ok(());
            }

            result = self.agent.register_service(&registration) => result,
        };
        registered?;

        info!(
            service = %registration.name,
            service_id = %registration.service_id,
            ttl = %registration.ttl_string(),
            "Service registered"
        );

        let result = self.heartbeat(&registration, cancel).await;
        self.deregister(&registration.service_id).await;
        result
    }

    async fn heartbeat(
        &self,
        registration: &Registration,
        cancel: &CancellationToken,
    ) -> CatalogResult<()> {
        let period = self.config.interval;
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let check_id = &registration.check.check_id;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),

                _ = tick.tick() => {}
            }

            let probed = tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),

                outcome = self.probe.check() => outcome,
            };
            let (status, output) = HealthStatus::from_probe(probed);

            let updated = tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),

                result = self.agent.update_ttl(check_id, status, &output) => result,
            };

            match updated {
                Ok(()) => {
                    debug!(check_id = %check_id, status = %status, "Heartbeat sent");
                }
                Err(e) => {
                    warn!(
                        check_id = %check_id,
                        error = %e,
                        "Heartbeat failed, ending session"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn deregister(&self, service_id: &ServiceId) {
        let timeout = self.config.cleanup_timeout;
        match tokio::time::timeout(timeout, self.agent.deregister_service(service_id)).await {
            Ok(Ok(())) => {
                info!(service_id = %service_id, "Service deregistered");
            }
            Ok(Err(e)) => {
                warn!(service_id = %service_id, error = %e, "Failed to deregister service");
            }
            Err(_) => {
                warn!(
                    service_id = %service_id,
                    timeout_secs = timeout.as_secs(),
                    "Deregistration timed out"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::NoopProbe;
    use async_trait::async_trait;
    use beacon_core::{CheckId, ProxyDefinition, ServiceKind};
    use std::time::Duration;

    struct Unreachable;

    #[async_trait]
    impl AgentApi for Unreachable {
        async fn register_service(&self, _: &Registration) -> CatalogResult<()> {
            Err(beacon_core::CatalogError::Transport("refused".to_string()))
        }
        async fn deregister_service(&self, _: &ServiceId) -> CatalogResult<()> {
            panic!("deregister must not follow a failed registration");
        }
        async fn update_ttl(&self, _: &CheckId, _: HealthStatus, _: &str) -> CatalogResult<()> {
            panic!("no heartbeat without registration");
        }
    }

    fn session(config: RegistrationConfig) -> RegistrationSession {
        RegistrationSession::new(Arc::new(Unreachable), Arc::new(NoopProbe), config)
    }

    #[test]
    fn test_registration_shape() {
        let config = RegistrationConfig {
            address: Some("10.0.0.5".to_string()),
            tags: vec!["blue".to_string()],
            ..RegistrationConfig::new("billing", 8090)
        };
        let mut ids = IdGenerator::seeded(1);
        let registration = session(config).registration(&mut ids);

        assert_eq!(registration.kind, ServiceKind::Typical);
        assert_eq!(registration.name, "billing");
        assert_eq!(registration.port, 8090);
        assert_eq!(registration.address.as_deref(), Some("10.0.0.5"));
        assert_eq!(registration.ttl_string(), "9s");
        assert_eq!(registration.deregister_after_string(), "15s");
        assert!(registration.native);
    }

    #[test]
    fn test_proxy_config_registers_connect_proxy() {
        let config = RegistrationConfig {
            proxy: Some(ProxyDefinition::new("db")),
            ..RegistrationConfig::new("db-proxy", 21000)
        };
        let mut ids = IdGenerator::seeded(1);
        let registration = session(config).registration(&mut ids);

        assert_eq!(registration.kind, ServiceKind::ConnectProxy);
        assert_eq!(
            registration.proxy.map(|p| p.destination_service_name),
            Some("db".to_string())
        );
    }

    #[test]
    fn test_fresh_ids_per_attempt() {
        let session = session(RegistrationConfig::new("billing", 8090));
        let mut ids = IdGenerator::seeded(7);

        let first = session.registration(&mut ids);
        let second = session.registration(&mut ids);

        assert_ne!(first.service_id, second.service_id);
        assert_ne!(first.check.check_id, second.check.check_id);
        assert_eq!(first.service_id.as_str().len(), 32);
    }

    #[tokio::test]
    async fn test_register_failure_returns_immediately() {
        let session = session(RegistrationConfig {
            interval: Duration::from_secs(1),
            ..RegistrationConfig::new("billing", 8090)
        });
        let mut ids = IdGenerator::seeded(3);
        let cancel = CancellationToken::new();

        let err = session.run(&mut ids, &cancel).await.unwrap_err();
        assert_eq!(err.as_label(), "catalog_transport");
    }

    #[tokio::test]
    async fn test_cancelled_before_register_is_ok() {
        let session = session(RegistrationConfig::new("billing", 8090));
        let mut ids = IdGenerator::seeded(3);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(session.run(&mut ids, &cancel).await.is_ok());
    }
}
