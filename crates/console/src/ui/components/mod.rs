pub mod hints;
pub mod modal;
pub mod toast;
