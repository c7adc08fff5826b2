//! # Inventory Stock Ledger
//!
//! Every quantity change is an immutable `stock_movements` row written in the
//! same transaction as the balance it moves. Writers on the same item or bin
//! serialize on a row lock taken before the balance is read.
//!
//! - [`calculation`] - Pure movement arithmetic
//! - [`stock_ledger`] - Central item balances, queries and machine refills
//! - [`machine_stock`] - Per-machine bin levels with activity-log entries

pub mod calculation;
pub mod machine_stock;
pub mod stock_ledger;

pub use calculation::{apply_movement, signed_delta, MovementOutcome};
pub use machine_stock::{BinChange, MachineStock};
pub use stock_ledger::{RecordMovement, StockLedger};
