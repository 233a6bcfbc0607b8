//! # Versioned keys and values
//!
//! Every record handled by the import engine is addressed by an [`MvccKey`]
//! (user key plus timestamp) and carries a [`Value`] whose integrity tag is
//! bound to the user key it is stored under.
//!
//! ## Ordering
//!
//! MvccKeys are ordered by:
//! 1. user key (ascending)
//! 2. timestamp (descending - newer first)

mod key;
mod value;

pub use key::{MvccKey, MvccKeyValue, Timestamp};
pub use value::{Value, ValueTag, VALUE_HEADER_SIZE};
