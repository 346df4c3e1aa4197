pub mod command;
pub mod config;
pub mod doc;
pub mod init;
pub mod run;
pub mod state;
