pub mod login;
pub mod receipts;
pub mod stats;
