//! Query rewrites applied while compiling.
//!
//! Rewrites never modify their input. AST passes return new trees and bound
//! expression passes operate on owned copies.

pub mod apply;
pub mod cse;
pub mod cte;
pub mod pushdown;
pub mod split;
