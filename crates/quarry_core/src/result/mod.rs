//! Row, key and table primitives shared by every operator.

pub mod group;
pub mod key;
pub mod row;
pub mod table;
