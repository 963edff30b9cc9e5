pub mod order_reconciliation;
pub mod position_tracker;
pub mod sales_summary;
