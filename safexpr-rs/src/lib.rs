pub mod cli;
pub mod config;
pub mod pattern;
pub mod repl;
pub mod script;
pub mod var;
