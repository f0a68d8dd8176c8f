//! # EVM (Subsystem 03)
//!
//! The fork-parameterized bytecode interpreter: stack machine, gas
//! accounting, memory, call-depth tracking, warm/cold access pricing,
//! static-call enforcement, and the call-family chaining that runs child
//! frames on an explicit frame stack instead of the host call stack.
//!
//! ## Components
//!
//! - [`opcodes::Opcode`] - opcode table with per-fork availability
//! - [`gas::GasSchedule`] - per-fork static and dynamic gas costs
//! - [`stack::Stack`] / [`memory::Memory`] - bounded EVM scratch state
//! - [`message::Message`] - call-frame input
//! - [`computation::Computation`] - per-frame mutable state
//! - [`interpreter::Evm`] - the dispatch loop and frame chaining
//! - [`precompiles`] - the precompiled contracts
//! - [`ports::StateAccess`] - the seam to the accounts cache

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod computation;
pub mod errors;
pub mod gas;
pub mod interpreter;
pub mod memory;
pub mod message;
pub mod opcodes;
pub mod ports;
pub mod precompiles;
pub mod stack;

// Re-exports
pub use computation::{Computation, ExecutionOutcome, GasMeter, OutcomeStatus};
pub use errors::{PrecompileError, VmError};
pub use gas::GasSchedule;
pub use interpreter::{create2_address, create_address, Evm, MAX_CALL_DEPTH, MAX_CODE_SIZE};
pub use message::{CallKind, Message};
pub use ports::{BlockEnv, BlockHashes, NoBlockHashes, StateAccess, TxEnv};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
