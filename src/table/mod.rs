pub mod double_array;
pub mod hash;
pub mod keys;
pub mod lock;
pub mod options;
pub mod patricia;
pub mod record;
pub mod table;
