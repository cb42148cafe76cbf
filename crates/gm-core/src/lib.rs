//! gm-core
//!
//! Domain model of the order reconciliation engine: money, order-number
//! validation, the order lifecycle state machine, ledger rows, the storage
//! traits every backend implements, and the transport-agnostic submission
//! and withdrawal services.
//!
//! Deterministic, pure logic. No IO of its own.

pub mod ledger;
pub mod luhn;
pub mod money;
pub mod order;
pub mod service;
pub mod store;

pub use ledger::{Balance, WithdrawOutcome, Withdrawal};
pub use luhn::{check_digit, is_admissible};
pub use money::{Micros, MoneyParseError, MICROS_SCALE};
pub use order::{
    AppliedTransition, CreateOutcome, InvalidOrderNumber, Order, OrderNumber, OrderStatus,
    TransitionError,
};
pub use service::{request_withdrawal, submit_order, SubmitOutcome, WithdrawalRequestOutcome};
pub use store::{LedgerStore, MartStore, OrderRegistry};
