//! Campus Assistant - offline topic matching engine
//!
//! Parses curated campus topic documents, expands keywords with same-sound
//! spellings, classifies incoming questions and ranks the topic a question
//! refers to. Drafting the final prose answer is left to an external
//! completion service behind the [`retrieval::CompletionService`] trait.

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod intent;
pub mod phonetic;
pub mod retrieval;
pub mod topics;

pub use error::{CampusError, Result};
