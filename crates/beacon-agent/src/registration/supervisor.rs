//! Restarts registration sessions until cancelled.
//!
//! Backoff is a fixed delay between attempts with no growth and no cap.
//! Every attempt registers under fresh identifiers drawn from the
//! supervisor's own [`IdGenerator`].

use std::time::Duration;

use beacon_core::IdGenerator;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::RegistrationSession;

/// Owns a session and the identifier source for its attempts.
pub struct RegistrationSupervisor {
    session: RegistrationSession,
    ids: IdGenerator,
    retry_delay: Duration,
}

impl RegistrationSupervisor {
    pub fn new(session: RegistrationSession, ids: IdGenerator) -> Self {
        let retry_delay = session.config().retry_delay;
        Self {
            session,
            ids,
            retry_delay,
        }
    }

    /// Runs sessions back to back, returning only once `cancel` fires.
    ///
    /// Session errors are logged and never escalated.
    pub async fn run(mut self, cancel: CancellationToken) {
        let service = self.session.config().service.clone();
        info!(
            service = %service,
            retry_delay_secs = self.retry_delay.as_secs(),
            "Registration supervisor started"
        );

        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            attempt = attempt.saturating_add(1);
            debug!(service = %service, attempt, "Starting registration session");

            if let Err(e) = self.session.run(&mut self.ids, &cancel).await {
                warn!(
                    service = %service,
                    attempt,
                    error = %e,
                    kind = e.as_label(),
                    "Registration session failed"
                );
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = sleep(self.retry_delay) => {
                    info!(service = %service, attempt, "Retrying registration");
                }
            }
        }

        info!(service = %service, "Registration supervisor stopped");
    }
}
