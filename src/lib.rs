//! pullcord - incremental, append-only archiver for chat guild and channel history
//!
//! This crate provides the core functionality for the `pullcord` CLI tool.
//!
//! # Architecture
//!
//! - [`archive`] - TSV log format, state replay and change reconciliation
//! - [`pull`] - Guild and channel synchronization against a [`pull::DataSource`]
//! - [`remote`] - HTTP adapters for the REST API and the CDN
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod pull;
pub mod remote;

pub use error::{Error, Result};
