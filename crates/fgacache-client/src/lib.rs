//! fgacache-client: collaborator surface for the fgacache core
//!
//! This crate defines the boundary between the caching core and the remote
//! relationship-based authorization service:
//! - Value types for relationship facts and check requests
//! - The `AuthorizationClient` trait the core calls through
//! - The `ActivityLog` trait used for activity-driven cache warming
//! - An in-memory client used as a test double and reference implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               fgacache-client                │
//! ├─────────────────────────────────────────────┤
//! │  types.rs  - TupleKey, CheckRequest, Expand │
//! │  traits.rs - AuthorizationClient, Activity  │
//! │  error.rs  - ClientError                    │
//! │  memory.rs - In-memory reference client     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

// Re-export commonly used types at the crate root
pub use error::{ClientError, ClientResult};
pub use memory::MemoryAuthorizationClient;
pub use traits::{ActivityLog, AuthorizationClient};
pub use types::{CheckRequest, ExpandTree, TupleKey};
