//! Local health probes.
//!
//! A probe is run once per heartbeat tick. `Ok(())` reports `passing` with
//! output `"ok"`; an error reports `critical` with the error message as the
//! check output.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use beacon_core::ProbeError;
use tokio::net::TcpStream;

/// Health check of the local service, invoked on every heartbeat.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<(), ProbeError>;
}

/// Always healthy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProbe;

#[async_trait]
impl HealthProbe for NoopProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        Ok(())
    }
}

/// Wraps a synchronous closure.
pub struct FnProbe<F> {
    check: F,
}

impl<F> FnProbe<F>
where
    F: Fn() -> Result<(), ProbeError> + Send + Sync,
{
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

#[async_trait]
impl<F> HealthProbe for FnProbe<F>
where
    F: Fn() -> Result<(), ProbeError> + Send + Sync,
{
    async fn check(&self) -> Result<(), ProbeError> {
        (self.check)()
    }
}

/// Healthy when a TCP connection to `addr` succeeds within `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    addr: SocketAddr,
    timeout: Duration,
}

impl TcpProbe {
    /// Connect timeout used by [`TcpProbe::new`].
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl HealthProbe for TcpProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(ProbeError::new(format!(
                "connect to {} failed: {e}",
                self.addr
            ))),
            Err(_) => Err(ProbeError::new(format!(
                "connect to {} timed out after {:?}",
                self.addr, self.timeout
            ))),
        }
    }
}
