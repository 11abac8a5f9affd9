pub mod datatype;
pub mod scalar;
