// Cart pricing and order numbering
pub mod order_number;
pub mod pricing;

// Order workflow
pub mod order_lifecycle;
pub mod orders;

// Payment gateway reconciliation
pub mod payments;
