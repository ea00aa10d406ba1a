//! `opendatabo` library crate.
//!
//! The binary (`odbo`) is a thin wrapper around this library so that:
//!
//! - scraping and normalization are testable without spawning processes
//! - the price pipeline can be reused by other front-ends (notebooks, jobs)

pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod prices;
