//! Relation membership and scope notification.
//!
//! Tracks which units participate in which relations between services and
//! notifies units when counterparts of the same relation scope join or
//! depart. All coordination happens through atomic multi-document
//! transactions on a shared [`Store`]; nothing in this crate takes a lock.
//!
//! ```text
//! State ─ add_relation / relation ─> Relation ─ unit(u) ─> RelationUnit
//!                                                          ├ ensure_join / ensure_depart
//!                                                          ├ settings / read_settings
//!                                                          └ watch_scope ─> RelationScopeWatcher
//! ```

mod config;
pub mod constants;
mod errors;
mod life;
pub mod metrics;
mod relation;
mod settings;
mod state;
mod storage;
mod unit;

pub use config::*;
pub use errors::*;
pub use life::Life;
pub use relation::*;
pub use settings::*;
pub use state::*;
pub use storage::*;
pub use unit::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
