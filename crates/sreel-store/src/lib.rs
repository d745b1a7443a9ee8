//! Persisted project state: on-disk layout and atomic JSON store.
//!
//! `script.json` is the single source of truth for a project. All writers
//! go through `ProjectStore`, which serializes writes per project and
//! replaces the file atomically (write-temp-then-rename), so a foreground
//! request and a background job completion can race without ever producing
//! a partial file.

pub mod error;
pub mod layout;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use layout::ProjectLayout;
pub use store::{atomic_write, ProjectStore};
