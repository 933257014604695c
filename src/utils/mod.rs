pub mod command;
pub mod file;
pub mod process;
pub mod storage;
pub mod system;
