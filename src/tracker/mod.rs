pub mod controller;
pub mod error;
pub mod format;
pub mod observable;
