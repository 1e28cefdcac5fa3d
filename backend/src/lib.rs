//! Notes service backend.
//!
//! The core is the [`domain::CommitInterceptor`]: every commit of a
//! [`domain::UnitOfWork`] stamps audit timestamps and advances optimistic
//! concurrency versions from a single clock reading before the change set
//! reaches the store. Inbound HTTP adapters and outbound store adapters sit
//! around it.

pub mod config;
pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod monitor;
pub mod outbound;
pub mod server;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::Trace;
