//! Census-Upstream: management API surface for backup-census
//!
//! This crate defines the narrow capability set the enumeration engine needs
//! from a cloud management API, independent of any concrete transport.
//!
//! ## Layer 0 - Upstream
//!
//! Focus: wire types, paging, and a typed error whose status classification
//! drives the retry policy one layer up.
//!
//! ## Key Components
//!
//! - `UpstreamApi`: list compartments, child resources, backups and
//!   maintenance runs
//! - `UpstreamError` / `StatusClass`: rate-limited, server or client failure
//! - `FixtureUpstream`: in-memory tree with failure injection (see [`fakes`])
//! - `HttpUpstream`: REST gateway client built on `reqwest`

mod api;
mod error;
pub mod fakes;
mod http;

pub use api::{
    Page, PatchingEstimate, RawBackup, RawMaintenanceRun, RawResource, ResourceKind, UpstreamApi,
};
pub use error::{StatusClass, UpstreamError};
pub use http::{HttpUpstream, HttpUpstreamConfig, NEXT_PAGE_HEADER};

/// Result type for upstream calls
pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;
