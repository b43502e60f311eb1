//! Ledger abstraction and implementations for autocrew.
//!
//! This crate provides a trait-based interface for recording task outcomes,
//! with a Markdown compliance checklist as the reference implementation.

#![warn(missing_docs)]

pub mod trait_;
pub mod compliance;
pub mod memory;

pub use trait_::{Ledger, LedgerError, Result};
pub use compliance::{ComplianceLedger, LedgerConfig};
pub use memory::MemoryLedger;
