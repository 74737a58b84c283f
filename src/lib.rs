//! Two-way reconciliation between a cloud notes list and a local shopping
//! list.
//!
//! A run reads both lists, compares their modification times with the
//! watermark stored by the previous run, and then either does nothing or
//! makes one side a copy of the other. See [`reconcile::Reconciler`].

pub mod config;
pub mod error;
pub mod keep;
pub mod model;
pub mod reconcile;
pub mod state;
pub mod store;

pub use error::{Phase, Result, SyncError};
pub use model::{ListItem, ListSnapshot, StoreKind, SyncWatermark, Timestamp};
pub use reconcile::{decide, Reconciler, SyncOutcome, SyncReport};
