pub mod aps;
pub mod auth;
pub mod fanout;
pub mod gateway;
pub mod monitor;
pub mod prober;
