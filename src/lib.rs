//! nmpafetch - NMPA drug registration data acquisition.
//!
//! Retrieves structured drug-registration records from the NMPA data
//! portal, either by delegating requests to a live browser session so
//! the site's own request signing runs unmodified, or through an
//! experimental direct-HTTP engine with an externally supplied signing
//! command.

pub mod cli;
pub mod config;
pub mod crawler;
pub mod error;
pub mod export;
pub mod extract;
pub mod flatten;
pub mod models;
pub mod resolver;
pub mod runner;
pub mod transport;
