pub mod coordinator;
pub mod format;
pub mod pager;
pub mod player;
pub mod worker;
