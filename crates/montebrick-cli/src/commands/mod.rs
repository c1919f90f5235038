pub mod config;
pub mod env;
pub mod info;
pub mod run;
pub mod runlist;
