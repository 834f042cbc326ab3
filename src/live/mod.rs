pub mod buffer;
pub mod events;
pub mod link;
pub mod traces;
