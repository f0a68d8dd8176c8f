//! # Messages
//!
//! The input record of one call frame: who calls what, with how much gas
//! and value, under which call kind.

use shared_types::{Address, Bytes, U256};

/// The six ways a frame can be entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// Plain message call.
    Call,
    /// Run the callee's code against the caller's storage.
    CallCode,
    /// CallCode preserving the original sender and value.
    DelegateCall,
    /// Read-only call; descendants may not mutate state.
    StaticCall,
    /// Contract creation.
    Create,
    /// Salted contract creation.
    Create2,
}

impl CallKind {
    /// True for CREATE and CREATE2.
    #[must_use]
    pub fn is_create(self) -> bool {
        matches!(self, CallKind::Create | CallKind::Create2)
    }
}

/// Input to one call frame.
#[derive(Clone, Debug)]
pub struct Message {
    /// How the frame is entered.
    pub kind: CallKind,
    /// Frame depth; the root frame is zero.
    pub depth: usize,
    /// Gas budget for the frame (stipend already included).
    pub gas: u64,
    /// `msg.sender` inside the frame.
    pub sender: Address,
    /// Context address: whose storage and balance the frame addresses.
    pub recipient: Address,
    /// Whose code runs; differs from `recipient` for CALLCODE and
    /// DELEGATECALL.
    pub code_address: Address,
    /// Apparent value (`msg.value`).
    pub value: U256,
    /// Whether the value actually moves between accounts; false for
    /// CALLCODE and DELEGATECALL.
    pub transfers_value: bool,
    /// Calldata, or init code for creation frames.
    pub input: Bytes,
    /// Static context flag; inherited by every descendant.
    pub is_static: bool,
    /// For creation frames, the address assigned by the spawner.
    pub created_address: Option<Address>,
}
