//! Core types and rules for the Shelf material tracker.
//!
//! Holds the data model, the status classifier, the transition table and
//! the history aggregator. Storage backends implement [`store::LibraryStore`];
//! the API layer drives everything through it.

pub mod classify;
pub mod error;
pub mod history;
pub mod material;
pub mod notify;
pub mod person;
pub mod status;
pub mod store;
pub mod transition;

pub use error::{Classify, Error, ErrorClass, Result};
