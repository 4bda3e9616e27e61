pub mod checkpoint;
pub mod journal;
pub mod layout;
pub mod lock_file;
pub mod region;
