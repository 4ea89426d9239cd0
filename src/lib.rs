// consolectl: command-line client for a SaaS security-management console
// Exposes the range fetcher, bulk input pipeline and command plumbing as a library

pub mod bulk;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod fields;
pub mod http;
pub mod models;
pub mod output;
pub mod pagination;
pub mod validation;
pub mod watch;
