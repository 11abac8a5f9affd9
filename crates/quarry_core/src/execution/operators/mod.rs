pub mod apply;
pub mod cte_scan;
pub mod distinct;
pub mod filter;
pub mod hash_aggregate;
pub mod join;
pub mod limit;
pub mod pivot;
pub mod project;
pub mod scan;
pub mod set_operation;
pub mod sort;
pub mod values;
