#![forbid(unsafe_code)]

pub mod command;
pub mod emit;
pub mod filter;
pub mod methods;
pub mod parse;
pub mod trace_file;
pub mod tracker;

pub mod utils;
