//! Type definitions for transaction checks

pub mod action;
pub mod table;

pub use action::{Action, CheckReport, Decision, INDETERMINATE_SENTINEL};
pub use table::{Cell, TransactionTable, ID_COLUMN};
