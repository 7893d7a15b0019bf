/// Resilience primitives for the live channel and delivery providers
///
/// - **Backoff**: bounded exponential reconnect policy with an injectable
///   backoff function, so tests run without real timers
/// - **Timeout**: deadline for a single provider call
pub mod backoff;
pub mod timeout;

pub use backoff::{exponential, fixed, Backoff, BackoffFn, ReconnectPolicy};
pub use timeout::{with_deadline, TimeoutError};
