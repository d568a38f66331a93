//! Services module for business logic and integrations

pub mod notification;
pub mod order_ref;
pub mod orders;
pub mod reconciliation;

pub use crate::services::reconciliation::{ReconcileError, ReconcileOutcome, ReconciliationEngine};
