pub mod job;
pub mod message;
pub mod translation;
