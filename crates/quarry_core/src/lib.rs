//! Query engine over pluggable row sources.
//!
//! Queries are built as an AST (see [`ast::builder`]), compiled against a
//! [`datasource::DataSourceRegistry`] with [`engine::compile`], then run into
//! a [`result::table::Table`] with [`engine::run`].

pub mod ast;
pub mod coerce;
pub mod config;
pub mod datasource;
pub mod engine;
pub mod execution;
pub mod explain;
pub mod expr;
pub mod functions;
pub mod planner;
pub mod result;
pub mod rewrite;
pub mod types;
pub mod util;
