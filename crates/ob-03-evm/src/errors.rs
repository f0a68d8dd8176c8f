//! # Error Types
//!
//! Interpreter and precompile failure kinds. A `VmError` terminates the
//! current frame; every kind except `Revert` burns the frame's remaining
//! gas.

use ob_02_state_trie::StateError;
use shared_types::Address;
use thiserror::Error;

/// Errors that terminate an EVM frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Execution ran out of gas.
    #[error("out of gas")]
    OutOfGas,

    /// Stack grew past 1024 items.
    #[error("stack overflow")]
    StackOverflow,

    /// Pop from an empty stack (or DUP/SWAP past the bottom).
    #[error("stack underflow")]
    StackUnderflow,

    /// Opcode byte not assigned in the active fork.
    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpcode(u8),

    /// Jump target is not a JUMPDEST.
    #[error("invalid jump destination: {0}")]
    InvalidJumpDest(usize),

    /// Call depth passed 1024.
    #[error("call depth exceeded")]
    CallDepthExceeded,

    /// State-mutating operation inside a STATICCALL context.
    #[error("state modification in static context")]
    StaticContextViolation,

    /// CREATE target address already has code or a nonce.
    #[error("contract creation collision at {0}")]
    CreateCollision(Address),

    /// Deployed code exceeds the EIP-170 limit.
    #[error("code size {size} exceeds limit {limit}")]
    CodeTooLarge {
        /// Returned code length.
        size: usize,
        /// Fork limit (24576 from Spurious Dragon).
        limit: usize,
    },

    /// Deployed code begins with the 0xEF reserved byte (EIP-3541).
    #[error("code starts with reserved 0xEF byte")]
    InvalidCodePrefix,

    /// RETURNDATACOPY past the end of the return buffer.
    #[error("return data access out of bounds")]
    ReturnDataOutOfBounds,

    /// Memory expansion past the interpreter's hard cap.
    #[error("memory limit exceeded")]
    MemoryLimitExceeded,

    /// REVERT opcode: terminates the frame, returns unused gas.
    #[error("execution reverted")]
    RevertExecution,

    /// A precompiled contract rejected its input; consumes the frame's
    /// gas like any other fault.
    #[error("precompile failure: {0}")]
    PrecompileFailure(PrecompileError),

    /// State access failed underneath the interpreter.
    #[error("state error: {0}")]
    State(#[from] StateError),
}

impl VmError {
    /// All errors burn the frame's remaining gas except `Revert`.
    #[must_use]
    pub fn burns_gas(&self) -> bool {
        !matches!(self, VmError::RevertExecution)
    }
}

/// Errors from precompiled contract execution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrecompileError {
    /// Gas limit below the precompile's cost.
    #[error("precompile out of gas")]
    OutOfGas,

    /// Input failed the precompile's structural checks.
    #[error("invalid precompile input")]
    InvalidInput,

    /// The precompile exists in the fork's set but has no implementation
    /// in this build.
    #[error("precompile not implemented: {0}")]
    NotImplemented(Address),
}

impl From<PrecompileError> for VmError {
    fn from(err: PrecompileError) -> Self {
        match err {
            PrecompileError::OutOfGas => VmError::OutOfGas,
            other => VmError::PrecompileFailure(other),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
