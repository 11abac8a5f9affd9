pub mod hash;
pub mod suggest;
