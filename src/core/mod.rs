pub mod codec;
pub mod constants;
pub mod error;
pub mod events;
pub mod format;
pub mod provider;
pub mod traces;
pub mod units;
