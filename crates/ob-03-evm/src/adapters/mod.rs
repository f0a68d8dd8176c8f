//! Adapters binding the interpreter's ports to the state subsystem.

pub mod state;
