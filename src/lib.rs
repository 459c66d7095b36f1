//! CAD Translation Monitor
//!
//! Backend that submits CAD files for cloud translation through Autodesk
//! Platform Services and streams job progress to WebSocket subscribers. One
//! polling task runs per job key, fanned out to every client watching it.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
