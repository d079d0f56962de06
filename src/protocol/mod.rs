//! Request and response types exchanged with the host.
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | [`SchemeRequest`] | Host → Pool | Decomposed intercepted request |
//! | [`ResponseMeta`] | Pool → Host | Status line and headers |
//! | [`Reply`] | Handler → Task | One `receive`/`finish` payload |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `headers` | Ordered, case-insensitive header map |
//! | `request` | URL decomposition |
//! | `response` | Response metadata and header synthesis |

// ============================================================================
// Submodules
// ============================================================================

/// Ordered header map and well-known header names.
pub mod headers;

/// Scheme request decomposition.
pub mod request;

/// Response metadata, replies and header synthesis.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use headers::HeaderMap;
pub use request::SchemeRequest;
pub use response::{Reply, ResponseMeta, synthesize_headers};
