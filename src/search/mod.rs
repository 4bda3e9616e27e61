pub mod group;
pub mod options;
pub mod results;
pub mod set_ops;
pub mod sort;
