//! Self-healing service registration.
//!
//! [`ServiceHandle`] owns a [`RegistrationSupervisor`], which runs
//! [`RegistrationSession`]s back to back with a fixed delay between them.

mod handle;
mod probe;
mod session;
mod supervisor;

pub use handle::{register, ServiceHandle};
pub use probe::{FnProbe, HealthProbe, NoopProbe, TcpProbe};
pub use session::RegistrationSession;
pub use supervisor::RegistrationSupervisor;
