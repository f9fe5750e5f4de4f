pub mod bootstrap;
pub mod cli;
pub mod gate;
pub mod service;
pub mod state;
