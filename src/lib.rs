//! pypi-index - A private PyPI-compatible package index
//!
//! This crate serves the distutils `register`/`upload` protocol and the
//! simple HTML pages that pip and easy_install read from.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod forms;
pub mod index;
pub mod logging;
pub mod models;
pub mod server;
pub mod storage;
pub mod views;
