pub mod about;
pub mod config;
pub mod engine;
pub mod error;
pub mod linkage;
pub mod persistence;
pub mod roster;
pub mod session;
pub mod shell;
