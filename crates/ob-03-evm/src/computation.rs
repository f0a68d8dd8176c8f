//! # Computation
//!
//! Per-frame mutable state: stack, memory, gas meter, program counter,
//! accrued logs, and the continuation recorded when a frame suspends on a
//! child call.

use crate::errors::VmError;
use crate::memory::Memory;
use crate::message::Message;
use crate::opcodes::analyze_jump_dests;
use crate::stack::Stack;
use ob_02_state_trie::Snapshot;
use shared_types::{Address, Bytes, Log};
use std::collections::HashSet;

/// Gas meter for one frame. All faults except REVERT drain it.
#[derive(Clone, Copy, Debug)]
pub struct GasMeter {
    limit: u64,
    remaining: u64,
}

impl GasMeter {
    /// A meter holding `limit` gas.
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    /// The frame's gas budget.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Gas left.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Gas consumed so far.
    #[must_use]
    pub fn used(&self) -> u64 {
        self.limit - self.remaining
    }

    /// Consume `amount` gas.
    ///
    /// # Errors
    ///
    /// Returns `OutOfGas` on deficit; the meter is left empty.
    pub fn consume(&mut self, amount: u64) -> Result<(), VmError> {
        if amount > self.remaining {
            self.remaining = 0;
            return Err(VmError::OutOfGas);
        }
        self.remaining -= amount;
        Ok(())
    }

    /// Return unused gas from a child frame.
    pub fn return_gas(&mut self, amount: u64) {
        self.remaining = self.remaining.saturating_add(amount);
    }

    /// Drain the meter; used when a fault burns the frame's gas.
    pub fn consume_all(&mut self) {
        self.remaining = 0;
    }
}

/// Continuation recorded on a frame suspended by a call-family opcode,
/// applied when its child terminates.
#[derive(Clone, Copy, Debug)]
pub struct Resume {
    /// Memory offset of the caller's output window.
    pub out_offset: usize,
    /// Size of the caller's output window.
    pub out_size: usize,
    /// True when the child is a creation frame.
    pub is_create: bool,
}

/// How a frame ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// STOP, RETURN, or SELFDESTRUCT.
    Success,
    /// REVERT: state undone, unused gas returned to the caller.
    Revert,
    /// Any other fault: state undone, gas burned.
    Failed(VmError),
}

impl OutcomeStatus {
    /// True only for `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Success)
    }
}

/// Result of executing one message to completion.
#[derive(Clone, Debug)]
pub struct ExecutionOutcome {
    /// How the frame ended.
    pub status: OutcomeStatus,
    /// Gas left in the frame (zero after a burning fault).
    pub gas_remaining: u64,
    /// Accumulated refund counter; zeroed on failure.
    pub refund: i64,
    /// RETURN/REVERT payload, or deployed code for creation frames.
    pub output: Bytes,
    /// Logs emitted by this frame and successful descendants.
    pub logs: Vec<Log>,
    /// Address of the created contract, for creation frames.
    pub created_address: Option<Address>,
}

impl ExecutionOutcome {
    /// Gas consumed relative to the message budget.
    #[must_use]
    pub fn gas_used(&self, budget: u64) -> u64 {
        budget.saturating_sub(self.gas_remaining)
    }
}

/// Per-frame mutable state.
#[derive(Debug)]
pub struct Computation {
    /// The frame's input.
    pub message: Message,
    /// Code being executed.
    pub code: Bytes,
    /// Program counter.
    pub pc: usize,
    /// Operand stack.
    pub stack: Stack,
    /// Frame memory.
    pub memory: Memory,
    /// Gas meter.
    pub gas: GasMeter,
    /// Refund counter delta accumulated by this frame; merged into the
    /// parent on success. Net metering can drive it negative.
    pub refund: i64,
    /// Logs emitted by this frame and merged-in children.
    pub logs: Vec<Log>,
    /// Return-data buffer from the most recent child.
    pub return_data: Bytes,
    /// This frame's own output (RETURN/REVERT payload).
    pub output: Bytes,
    /// Valid jump targets in `code`.
    pub jump_dests: HashSet<usize>,
    /// State snapshot taken at frame entry.
    pub snapshot: Snapshot,
    /// Continuation for a pending child.
    pub resume: Option<Resume>,
}

impl Computation {
    /// Build a frame for `message` running `code`.
    #[must_use]
    pub fn new(message: Message, code: Bytes, snapshot: Snapshot) -> Self {
        let gas = GasMeter::new(message.gas);
        let jump_dests = analyze_jump_dests(code.as_slice());
        Self {
            message,
            code,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            gas,
            refund: 0,
            logs: Vec::new(),
            return_data: Bytes::new(),
            output: Bytes::new(),
            jump_dests,
            snapshot,
            resume: None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
