//! # Interpreter
//!
//! Runs EVM frames on an explicit frame stack. A call-family opcode does
//! not recurse: it records a continuation on the current frame, the loop
//! pushes that frame aside and enters the child, and the continuation
//! merges the child's outcome back when it terminates. Host recursion
//! depth stays constant no matter how deep the EVM call chain goes.

use crate::computation::{Computation, ExecutionOutcome, OutcomeStatus, Resume};
use crate::errors::VmError;
use crate::gas::{self, GasSchedule};
use crate::memory::WORD_SIZE;
use crate::message::{CallKind, Message};
use crate::opcodes::Opcode;
use crate::ports::{BlockEnv, BlockHashes, StateAccess, TxEnv};
use crate::precompiles::{execute_precompile, is_precompile};
use ob_02_state_trie::AccessStatus;
use shared_types::rlp::RlpList;
use shared_types::{Address, Bytes, Fork, Hash, Log, StorageKey, StorageValue, U256, U512};
use tracing::trace;

/// EVM call depth bound.
pub const MAX_CALL_DEPTH: usize = 1024;

/// Deployed code size bound from Spurious Dragon (EIP-170).
pub const MAX_CODE_SIZE: usize = 24_576;

enum FrameSignal {
    /// The frame suspended on a child message.
    Spawn(Message),
    /// The frame terminated normally (STOP/RETURN/SELFDESTRUCT).
    Done,
}

enum Entered {
    /// A frame to run.
    Frame(Box<Computation>),
    /// The message completed without running bytecode (precompile, empty
    /// code, or an entry fault).
    Done(ExecutionOutcome),
}

/// The EVM: executes one message and everything it spawns.
pub struct Evm<'a> {
    state: &'a mut dyn StateAccess,
    block: &'a BlockEnv,
    tx: TxEnv,
    fork: Fork,
    schedule: GasSchedule,
    block_hashes: &'a dyn BlockHashes,
}

impl<'a> Evm<'a> {
    /// Build an interpreter over the given state and context.
    pub fn new(
        state: &'a mut dyn StateAccess,
        block: &'a BlockEnv,
        tx: TxEnv,
        fork: Fork,
        block_hashes: &'a dyn BlockHashes,
    ) -> Self {
        Self {
            state,
            block,
            tx,
            fork,
            schedule: GasSchedule::for_fork(fork),
            block_hashes,
        }
    }

    /// Execute `message` to completion, running child frames on an
    /// explicit stack.
    pub fn execute(&mut self, message: Message) -> ExecutionOutcome {
        let mut frames: Vec<Box<Computation>> = Vec::new();
        let mut current = match self.begin_frame(message) {
            Entered::Frame(frame) => frame,
            Entered::Done(outcome) => return outcome,
        };

        loop {
            let signal = self.run_frame(&mut current);
            match signal {
                Ok(FrameSignal::Spawn(child_message)) => match self.begin_frame(child_message) {
                    Entered::Frame(child) => {
                        frames.push(current);
                        current = child;
                    }
                    Entered::Done(outcome) => self.resume(&mut current, outcome),
                },
                terminal => {
                    let error = match terminal {
                        Ok(FrameSignal::Done) => None,
                        Err(err) => Some(err),
                        Ok(FrameSignal::Spawn(_)) => unreachable!(),
                    };
                    let outcome = self.finish_frame(*current, error);
                    match frames.pop() {
                        Some(parent) => {
                            current = parent;
                            self.resume(&mut current, outcome);
                        }
                        None => return outcome,
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Frame lifecycle
    // -------------------------------------------------------------------------

    fn begin_frame(&mut self, message: Message) -> Entered {
        let snapshot = self.state.snapshot();
        match self.enter(&message, snapshot) {
            Ok(entered) => entered,
            Err(err) => {
                self.state.revert(snapshot);
                Entered::Done(ExecutionOutcome {
                    status: OutcomeStatus::Failed(err),
                    gas_remaining: 0,
                    refund: 0,
                    output: Bytes::new(),
                    logs: Vec::new(),
                    created_address: None,
                })
            }
        }
    }

    fn enter(
        &mut self,
        message: &Message,
        snapshot: ob_02_state_trie::Snapshot,
    ) -> Result<Entered, VmError> {
        self.state.touch(message.recipient);

        if message.kind.is_create() {
            let created = message
                .created_address
                .unwrap_or(message.recipient);

            // EIP-684 collision: a nonce or code at the target kills the
            // creation with the gas it was given.
            if self.state.nonce(created)? != 0 || self.state.code_hash(created)? != Hash::EMPTY_CODE
            {
                return Err(VmError::CreateCollision(created));
            }

            if self.fork.reaps_empty_accounts() {
                self.state.set_nonce(created, 1)?;
            }
            if !message.value.is_zero() {
                self.state.transfer(message.sender, created, message.value)?;
            }

            let mut frame_message = message.clone();
            let input = std::mem::take(&mut frame_message.input);
            return Ok(Entered::Frame(Box::new(Computation::new(
                frame_message,
                input,
                snapshot,
            ))));
        }

        if message.transfers_value && !message.value.is_zero() {
            self.state
                .transfer(message.sender, message.recipient, message.value)?;
        }

        if is_precompile(message.code_address, self.fork) {
            let result = execute_precompile(
                message.code_address,
                message.input.as_slice(),
                message.gas,
                self.fork,
            );
            return match result {
                Some(Ok(output)) => {
                    self.state.commit(snapshot);
                    Ok(Entered::Done(ExecutionOutcome {
                        status: OutcomeStatus::Success,
                        gas_remaining: message.gas - output.gas_used,
                        refund: 0,
                        output: output.output,
                        logs: Vec::new(),
                        created_address: None,
                    }))
                }
                Some(Err(err)) => Err(VmError::from(err)),
                None => Err(VmError::InvalidOpcode(0)),
            };
        }

        let code = self.state.code(message.code_address)?;
        if code.is_empty() {
            self.state.commit(snapshot);
            return Ok(Entered::Done(ExecutionOutcome {
                status: OutcomeStatus::Success,
                gas_remaining: message.gas,
                refund: 0,
                output: Bytes::new(),
                logs: Vec::new(),
                created_address: None,
            }));
        }

        Ok(Entered::Frame(Box::new(Computation::new(
            message.clone(),
            code,
            snapshot,
        ))))
    }

    /// Close a frame: settle create deposits, classify the outcome, and
    /// commit or revert its state snapshot.
    fn finish_frame(&mut self, mut frame: Computation, error: Option<VmError>) -> ExecutionOutcome {
        let mut status = match error {
            None => OutcomeStatus::Success,
            Some(VmError::RevertExecution) => OutcomeStatus::Revert,
            Some(err) => OutcomeStatus::Failed(err),
        };

        if status.is_success() && frame.message.kind.is_create() {
            if let Err(err) = self.settle_create(&mut frame) {
                status = OutcomeStatus::Failed(err);
            }
        }

        let created_address = if frame.message.kind.is_create() {
            frame.message.created_address
        } else {
            None
        };

        match &status {
            OutcomeStatus::Success => {
                self.state.commit(frame.snapshot);
                ExecutionOutcome {
                    status,
                    gas_remaining: frame.gas.remaining(),
                    refund: frame.refund,
                    output: frame.output,
                    logs: frame.logs,
                    created_address,
                }
            }
            OutcomeStatus::Revert => {
                self.state.revert(frame.snapshot);
                ExecutionOutcome {
                    status,
                    gas_remaining: frame.gas.remaining(),
                    refund: 0,
                    output: frame.output,
                    logs: Vec::new(),
                    created_address,
                }
            }
            OutcomeStatus::Failed(_) => {
                self.state.revert(frame.snapshot);
                frame.gas.consume_all();
                ExecutionOutcome {
                    status,
                    gas_remaining: 0,
                    refund: 0,
                    output: Bytes::new(),
                    logs: Vec::new(),
                    created_address,
                }
            }
        }
    }

    /// Validate and deposit the code returned by an init frame.
    fn settle_create(&mut self, frame: &mut Computation) -> Result<(), VmError> {
        let code = std::mem::take(&mut frame.output);

        if self.fork.rejects_ef_code() && code.as_slice().first() == Some(&0xEF) {
            return Err(VmError::InvalidCodePrefix);
        }
        if self.fork.limits_code_size() && code.len() > MAX_CODE_SIZE {
            return Err(VmError::CodeTooLarge {
                size: code.len(),
                limit: MAX_CODE_SIZE,
            });
        }

        let deposit = self
            .schedule
            .code_deposit_byte
            .saturating_mul(code.len() as u64);
        if frame.gas.consume(deposit).is_err() {
            // Frontier tolerated an unpaid deposit and simply kept the
            // account codeless; Homestead turned it into a failure.
            if self.fork >= Fork::Homestead {
                return Err(VmError::OutOfGas);
            }
            return Ok(());
        }

        let created = frame.message.created_address.unwrap_or(frame.message.recipient);
        self.state.set_code(created, code)?;
        Ok(())
    }

    /// Apply a child's outcome to its suspended parent.
    fn resume(&mut self, parent: &mut Computation, outcome: ExecutionOutcome) {
        let Some(resume) = parent.resume.take() else {
            return;
        };

        parent.gas.return_gas(outcome.gas_remaining);

        // The return buffer carries call output always, but creation
        // output only for reverts (EIP-211).
        let exposes_output = !resume.is_create || outcome.status == OutcomeStatus::Revert;
        parent.return_data = if exposes_output {
            outcome.output.clone()
        } else {
            Bytes::new()
        };

        if !resume.is_create && resume.out_size > 0 {
            let copied = outcome.output.len().min(resume.out_size);
            parent
                .memory
                .write_bytes(resume.out_offset, &outcome.output.as_slice()[..copied]);
        }

        let pushed = match (&outcome.status, resume.is_create) {
            (OutcomeStatus::Success, false) => U256::one(),
            (OutcomeStatus::Success, true) => outcome
                .created_address
                .map(Address::into_word)
                .unwrap_or_default(),
            _ => U256::zero(),
        };
        // The parent reserved stack room by popping the call arguments.
        let _ = parent.stack.push(pushed);

        if outcome.status.is_success() {
            parent.logs.extend(outcome.logs);
            parent.refund += outcome.refund;
        }
    }

    // -------------------------------------------------------------------------
    // The dispatch loop
    // -------------------------------------------------------------------------

    fn run_frame(&mut self, frame: &mut Computation) -> Result<FrameSignal, VmError> {
        loop {
            if frame.pc >= frame.code.len() {
                // Running off the end is an implicit STOP.
                frame.output = Bytes::new();
                return Ok(FrameSignal::Done);
            }

            let byte = frame.code.as_slice()[frame.pc];
            let opcode = Opcode::from_byte_in_fork(byte, self.fork)
                .ok_or(VmError::InvalidOpcode(byte))?;

            frame.gas.consume(self.schedule.flat_cost(opcode))?;
            frame.pc += 1;

            if let Some(signal) = self.step(frame, opcode)? {
                return Ok(signal);
            }
        }
    }

    /// Execute one opcode. Returns a signal when the frame suspends or
    /// terminates.
    #[allow(clippy::too_many_lines)]
    fn step(
        &mut self,
        frame: &mut Computation,
        opcode: Opcode,
    ) -> Result<Option<FrameSignal>, VmError> {
        use Opcode::*;

        match opcode {
            Stop => {
                frame.output = Bytes::new();
                return Ok(Some(FrameSignal::Done));
            }

            // -----------------------------------------------------------------
            // Arithmetic
            // -----------------------------------------------------------------
            Add => binary_op(frame, |a, b| a.overflowing_add(b).0)?,
            Mul => binary_op(frame, |a, b| a.overflowing_mul(b).0)?,
            Sub => binary_op(frame, |a, b| a.overflowing_sub(b).0)?,
            Div => binary_op(frame, |a, b| if b.is_zero() { U256::zero() } else { a / b })?,
            SDiv => binary_op(frame, signed_div)?,
            Mod => binary_op(frame, |a, b| if b.is_zero() { U256::zero() } else { a % b })?,
            SMod => binary_op(frame, signed_mod)?,
            AddMod => {
                let a = frame.stack.pop()?;
                let b = frame.stack.pop()?;
                let n = frame.stack.pop()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    let sum = U512::from(a) + U512::from(b);
                    truncate_u512(sum % U512::from(n))
                };
                frame.stack.push(result)?;
            }
            MulMod => {
                let a = frame.stack.pop()?;
                let b = frame.stack.pop()?;
                let n = frame.stack.pop()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    truncate_u512(a.full_mul(b) % U512::from(n))
                };
                frame.stack.push(result)?;
            }
            Exp => {
                let base = frame.stack.pop()?;
                let exponent = frame.stack.pop()?;
                frame.gas.consume(self.schedule.exp_cost(exponent))?;
                frame.stack.push(exp_by_squaring(base, exponent))?;
            }
            SignExtend => {
                let position = frame.stack.pop()?;
                let value = frame.stack.pop()?;
                let result = if position < U256::from(32u64) {
                    let bit_index = position.low_u64() as usize * 8 + 7;
                    let mask = (U256::one() << (bit_index + 1)) - 1;
                    if value.bit(bit_index) {
                        value | !mask
                    } else {
                        value & mask
                    }
                } else {
                    value
                };
                frame.stack.push(result)?;
            }

            // -----------------------------------------------------------------
            // Comparison & bitwise
            // -----------------------------------------------------------------
            Lt => binary_op(frame, |a, b| bool_word(a < b))?,
            Gt => binary_op(frame, |a, b| bool_word(a > b))?,
            SLt => binary_op(frame, |a, b| bool_word(signed_lt(a, b)))?,
            SGt => binary_op(frame, |a, b| bool_word(signed_lt(b, a)))?,
            Eq => binary_op(frame, |a, b| bool_word(a == b))?,
            IsZero => {
                let a = frame.stack.pop()?;
                frame.stack.push(bool_word(a.is_zero()))?;
            }
            And => binary_op(frame, |a, b| a & b)?,
            Or => binary_op(frame, |a, b| a | b)?,
            Xor => binary_op(frame, |a, b| a ^ b)?,
            Not => {
                let a = frame.stack.pop()?;
                frame.stack.push(!a)?;
            }
            Byte => binary_op(frame, |index, value| {
                if index < U256::from(32u64) {
                    U256::from(value.byte(31 - index.low_u64() as usize))
                } else {
                    U256::zero()
                }
            })?,
            Shl => binary_op(frame, |shift, value| {
                if shift >= U256::from(256u64) {
                    U256::zero()
                } else {
                    value << shift.low_u64() as usize
                }
            })?,
            Shr => binary_op(frame, |shift, value| {
                if shift >= U256::from(256u64) {
                    U256::zero()
                } else {
                    value >> shift.low_u64() as usize
                }
            })?,
            Sar => binary_op(frame, sar)?,

            // -----------------------------------------------------------------
            // Keccak
            // -----------------------------------------------------------------
            Keccak256 => {
                let offset = frame.stack.pop()?;
                let size = frame.stack.pop()?;
                let (offset, size) = self.memory_region(frame, offset, size)?;
                frame.gas.consume(self.schedule.keccak_cost(size as u64))?;
                let digest = Hash::keccak(&frame.memory.read_bytes(offset, size));
                frame.stack.push(digest.into_word())?;
            }

            // -----------------------------------------------------------------
            // Environment
            // -----------------------------------------------------------------
            // Qualified: the bare name resolves to the address type.
            Opcode::Address => frame.stack.push(frame.message.recipient.into_word())?,
            Balance => {
                let address = shared_types::Address::from_word(frame.stack.pop()?);
                let cost = self.account_access_cost(address, self.schedule.balance);
                frame.gas.consume(cost)?;
                let balance = self.state.balance(address)?;
                frame.stack.push(balance)?;
            }
            Origin => frame.stack.push(self.tx.origin.into_word())?,
            Caller => frame.stack.push(frame.message.sender.into_word())?,
            CallValue => frame.stack.push(frame.message.value)?,
            CallDataLoad => {
                let offset = frame.stack.pop()?;
                let mut word = [0u8; 32];
                if offset <= U256::from(u64::MAX) {
                    let offset = offset.low_u64() as usize;
                    let data = frame.message.input.as_slice();
                    for (i, byte) in word.iter_mut().enumerate() {
                        if let Some(&value) = data.get(offset.saturating_add(i)) {
                            *byte = value;
                        }
                    }
                }
                frame.stack.push(U256::from_big_endian(&word))?;
            }
            CallDataSize => frame.stack.push(U256::from(frame.message.input.len()))?,
            CallDataCopy => {
                let dest = frame.stack.pop()?;
                let offset = frame.stack.pop()?;
                let size = frame.stack.pop()?;
                frame.gas.consume(self.schedule.very_low)?;
                let (dest, size) = self.memory_region(frame, dest, size)?;
                frame.gas.consume(self.schedule.copy_cost(size as u64))?;
                let source = slice_padded(frame.message.input.as_slice(), offset, size);
                frame.memory.write_bytes(dest, &source);
            }
            CodeSize => frame.stack.push(U256::from(frame.code.len()))?,
            CodeCopy => {
                let dest = frame.stack.pop()?;
                let offset = frame.stack.pop()?;
                let size = frame.stack.pop()?;
                frame.gas.consume(self.schedule.very_low)?;
                let (dest, size) = self.memory_region(frame, dest, size)?;
                frame.gas.consume(self.schedule.copy_cost(size as u64))?;
                let source = slice_padded(frame.code.as_slice(), offset, size);
                frame.memory.write_bytes(dest, &source);
            }
            GasPrice => frame.stack.push(self.tx.gas_price)?,
            ExtCodeSize => {
                let address = shared_types::Address::from_word(frame.stack.pop()?);
                let cost = self.account_access_cost(address, self.schedule.extcode);
                frame.gas.consume(cost)?;
                let size = self.state.code(address)?.len();
                frame.stack.push(U256::from(size))?;
            }
            ExtCodeCopy => {
                let address = shared_types::Address::from_word(frame.stack.pop()?);
                let dest = frame.stack.pop()?;
                let offset = frame.stack.pop()?;
                let size = frame.stack.pop()?;
                let cost = self.account_access_cost(address, self.schedule.extcode);
                frame.gas.consume(cost)?;
                let (dest, size) = self.memory_region(frame, dest, size)?;
                frame.gas.consume(self.schedule.copy_cost(size as u64))?;
                let code = self.state.code(address)?;
                let source = slice_padded(code.as_slice(), offset, size);
                frame.memory.write_bytes(dest, &source);
            }
            ReturnDataSize => frame.stack.push(U256::from(frame.return_data.len()))?,
            ReturnDataCopy => {
                let dest = frame.stack.pop()?;
                let offset = frame.stack.pop()?;
                let size = frame.stack.pop()?;
                frame.gas.consume(self.schedule.very_low)?;

                // Reads past the buffer fault instead of padding.
                let end = offset
                    .checked_add(size)
                    .ok_or(VmError::ReturnDataOutOfBounds)?;
                if end > U256::from(frame.return_data.len()) {
                    return Err(VmError::ReturnDataOutOfBounds);
                }

                let (dest, size) = self.memory_region(frame, dest, size)?;
                frame.gas.consume(self.schedule.copy_cost(size as u64))?;
                let offset = offset.low_u64() as usize;
                let source = frame.return_data.as_slice()[offset..offset + size].to_vec();
                frame.memory.write_bytes(dest, &source);
            }
            ExtCodeHash => {
                let address = shared_types::Address::from_word(frame.stack.pop()?);
                let cost = self.account_access_cost(address, self.schedule.extcodehash);
                frame.gas.consume(cost)?;
                let hash = if self.state.is_empty_account(address)? {
                    U256::zero()
                } else {
                    self.state.code_hash(address)?.into_word()
                };
                frame.stack.push(hash)?;
            }

            // -----------------------------------------------------------------
            // Block context
            // -----------------------------------------------------------------
            BlockHash => {
                let number = frame.stack.pop()?;
                let current = self.block.number;
                let hash = if number < U256::from(current)
                    && number >= U256::from(current.saturating_sub(256))
                {
                    self.block_hashes
                        .block_hash(number.low_u64())
                        .map(Hash::into_word)
                        .unwrap_or_default()
                } else {
                    U256::zero()
                };
                frame.stack.push(hash)?;
            }
            Coinbase => frame.stack.push(self.block.coinbase.into_word())?,
            Timestamp => frame.stack.push(U256::from(self.block.timestamp))?,
            Number => frame.stack.push(U256::from(self.block.number))?,
            Difficulty => frame.stack.push(self.block.difficulty)?,
            GasLimit => frame.stack.push(U256::from(self.block.gas_limit))?,
            ChainId => frame.stack.push(U256::from(self.block.chain_id))?,
            SelfBalance => {
                let balance = self.state.balance(frame.message.recipient)?;
                frame.stack.push(balance)?;
            }
            BaseFee => frame.stack.push(self.block.base_fee.unwrap_or_default())?,

            // -----------------------------------------------------------------
            // Stack, memory, storage, flow
            // -----------------------------------------------------------------
            Pop => {
                frame.stack.pop()?;
            }
            MLoad => {
                let offset = frame.stack.pop()?;
                let (offset, _) = self.memory_region(frame, offset, U256::from(WORD_SIZE))?;
                let word = frame.memory.read_word(offset);
                frame.stack.push(U256::from_big_endian(&word))?;
            }
            MStore => {
                let offset = frame.stack.pop()?;
                let value = frame.stack.pop()?;
                let (offset, _) = self.memory_region(frame, offset, U256::from(WORD_SIZE))?;
                let mut word = [0u8; 32];
                value.to_big_endian(&mut word);
                frame.memory.write_word(offset, &word);
            }
            MStore8 => {
                let offset = frame.stack.pop()?;
                let value = frame.stack.pop()?;
                let (offset, _) = self.memory_region(frame, offset, U256::one())?;
                frame.memory.write_byte(offset, value.byte(0));
            }
            SLoad => {
                let key = StorageKey::from_word(frame.stack.pop()?);
                let address = frame.message.recipient;
                let cost = if self.fork.charges_cold_access() {
                    match self.state.access_slot(address, key) {
                        AccessStatus::Cold => self.schedule.cold_sload,
                        AccessStatus::Warm => self.schedule.warm_access,
                    }
                } else {
                    self.schedule.sload
                };
                frame.gas.consume(cost)?;
                let value = self.state.storage(address, key)?;
                frame.stack.push(value.into_word())?;
            }
            SStore => {
                if frame.message.is_static {
                    return Err(VmError::StaticContextViolation);
                }
                let key = StorageKey::from_word(frame.stack.pop()?);
                let new = StorageValue::from_word(frame.stack.pop()?);
                let address = frame.message.recipient;

                let is_cold = self.fork.charges_cold_access()
                    && self.state.access_slot(address, key) == AccessStatus::Cold;
                let original = self.state.original_storage(address, key)?;
                let current = self.state.storage(address, key)?;
                let (cost, refund) = self.schedule.sstore_cost(
                    original,
                    current,
                    new,
                    is_cold,
                    frame.gas.remaining(),
                )?;
                frame.gas.consume(cost)?;
                frame.refund += refund;
                self.state.set_storage(address, key, new)?;
            }
            Jump => {
                let dest = frame.stack.pop()?;
                frame.pc = validate_jump(frame, dest)?;
            }
            JumpI => {
                let dest = frame.stack.pop()?;
                let condition = frame.stack.pop()?;
                if !condition.is_zero() {
                    frame.pc = validate_jump(frame, dest)?;
                }
            }
            Pc => frame.stack.push(U256::from(frame.pc - 1))?,
            MSize => frame.stack.push(U256::from(frame.memory.len()))?,
            Gas => frame.stack.push(U256::from(frame.gas.remaining()))?,
            JumpDest => {}

            // -----------------------------------------------------------------
            // Logs
            // -----------------------------------------------------------------
            Log0 | Log1 | Log2 | Log3 | Log4 => {
                if frame.message.is_static {
                    return Err(VmError::StaticContextViolation);
                }
                let topic_count = opcode.log_topics().unwrap_or(0);
                let offset = frame.stack.pop()?;
                let size = frame.stack.pop()?;
                let mut topics = Vec::with_capacity(topic_count);
                for _ in 0..topic_count {
                    let mut word = [0u8; 32];
                    frame.stack.pop()?.to_big_endian(&mut word);
                    topics.push(Hash::new(word));
                }
                let (offset, size) = self.memory_region(frame, offset, size)?;
                frame
                    .gas
                    .consume(self.schedule.log_cost(topic_count, size as u64))?;
                let data = Bytes::from_vec(frame.memory.read_bytes(offset, size));
                frame
                    .logs
                    .push(Log::new(frame.message.recipient, topics, data));
            }

            // -----------------------------------------------------------------
            // Call family
            // -----------------------------------------------------------------
            Call | CallCode | DelegateCall | StaticCall => {
                return self.op_call(frame, opcode);
            }
            Create | Create2 => {
                return self.op_create(frame, opcode);
            }

            // -----------------------------------------------------------------
            // Termination
            // -----------------------------------------------------------------
            Return => {
                let offset = frame.stack.pop()?;
                let size = frame.stack.pop()?;
                let (offset, size) = self.memory_region(frame, offset, size)?;
                frame.output = Bytes::from_vec(frame.memory.read_bytes(offset, size));
                return Ok(Some(FrameSignal::Done));
            }
            Revert => {
                let offset = frame.stack.pop()?;
                let size = frame.stack.pop()?;
                let (offset, size) = self.memory_region(frame, offset, size)?;
                frame.output = Bytes::from_vec(frame.memory.read_bytes(offset, size));
                return Err(VmError::RevertExecution);
            }
            Invalid => return Err(VmError::InvalidOpcode(Opcode::Invalid as u8)),
            SelfDestruct => return self.op_selfdestruct(frame).map(Some),

            // -----------------------------------------------------------------
            // Push / dup / swap
            // -----------------------------------------------------------------
            _ => {
                if let Some(size) = opcode.push_size() {
                    let end = (frame.pc + size).min(frame.code.len());
                    let mut word = [0u8; 32];
                    let available = end - frame.pc;
                    word[32 - size..32 - size + available]
                        .copy_from_slice(&frame.code.as_slice()[frame.pc..end]);
                    frame.stack.push(U256::from_big_endian(&word))?;
                    frame.pc += size;
                } else if let Some(depth) = opcode.dup_depth() {
                    frame.stack.dup(depth)?;
                } else if let Some(depth) = opcode.swap_depth() {
                    frame.stack.swap(depth)?;
                } else {
                    return Err(VmError::InvalidOpcode(opcode as u8));
                }
            }
        }

        Ok(None)
    }

    // -------------------------------------------------------------------------
    // Call-family handlers
    // -------------------------------------------------------------------------

    fn op_call(
        &mut self,
        frame: &mut Computation,
        opcode: Opcode,
    ) -> Result<Option<FrameSignal>, VmError> {
        let has_value_operand = matches!(opcode, Opcode::Call | Opcode::CallCode);

        let requested_gas = frame.stack.pop()?;
        let target = Address::from_word(frame.stack.pop()?);
        let value = if has_value_operand {
            frame.stack.pop()?
        } else {
            U256::zero()
        };
        let in_offset = frame.stack.pop()?;
        let in_size = frame.stack.pop()?;
        let out_offset = frame.stack.pop()?;
        let out_size = frame.stack.pop()?;

        // A value call may not originate inside a static context; this
        // trips before any call-specific gas is charged.
        if opcode == Opcode::Call && frame.message.is_static && !value.is_zero() {
            return Err(VmError::StaticContextViolation);
        }

        let access_cost = self.account_access_cost(target, self.schedule.call);
        frame.gas.consume(access_cost)?;

        let (in_offset, in_size) = self.memory_region(frame, in_offset, in_size)?;
        let (out_offset, out_size) = self.memory_region(frame, out_offset, out_size)?;

        let mut extra = 0u64;
        if !value.is_zero() {
            extra = extra.saturating_add(self.schedule.call_value);
            if opcode == Opcode::Call && self.is_dead_account(target)? {
                extra = extra.saturating_add(self.schedule.call_new_account);
            }
        }
        frame.gas.consume(extra)?;

        let mut child_gas = if self.fork.caps_call_gas() {
            let cap = gas::all_but_one_64th(frame.gas.remaining());
            if requested_gas > U256::from(cap) {
                cap
            } else {
                requested_gas.low_u64()
            }
        } else {
            if requested_gas > U256::from(frame.gas.remaining()) {
                return Err(VmError::OutOfGas);
            }
            requested_gas.low_u64()
        };
        frame.gas.consume(child_gas)?;

        if !value.is_zero() {
            child_gas = child_gas.saturating_add(self.schedule.call_stipend);
        }

        // Depth and balance preflights fail the call without entering a
        // frame: push zero, hand the whole child budget back.
        let sender = frame.message.recipient;
        let depth_exhausted = frame.message.depth + 1 > MAX_CALL_DEPTH;
        let underfunded = has_value_operand
            && !value.is_zero()
            && self.state.balance(sender)? < value;
        if depth_exhausted || underfunded {
            trace!(?target, depth_exhausted, "call preflight failed");
            frame.gas.return_gas(child_gas);
            frame.return_data = Bytes::new();
            frame.stack.push(U256::zero())?;
            return Ok(None);
        }

        let input = Bytes::from_vec(frame.memory.read_bytes(in_offset, in_size));
        let message = match opcode {
            Opcode::Call => Message {
                kind: CallKind::Call,
                depth: frame.message.depth + 1,
                gas: child_gas,
                sender,
                recipient: target,
                code_address: target,
                value,
                transfers_value: true,
                input,
                is_static: frame.message.is_static,
                created_address: None,
            },
            Opcode::CallCode => Message {
                kind: CallKind::CallCode,
                depth: frame.message.depth + 1,
                gas: child_gas,
                sender,
                recipient: sender,
                code_address: target,
                value,
                transfers_value: false,
                input,
                is_static: frame.message.is_static,
                created_address: None,
            },
            Opcode::DelegateCall => Message {
                kind: CallKind::DelegateCall,
                depth: frame.message.depth + 1,
                gas: child_gas,
                sender: frame.message.sender,
                recipient: sender,
                code_address: target,
                value: frame.message.value,
                transfers_value: false,
                input,
                is_static: frame.message.is_static,
                created_address: None,
            },
            _ => Message {
                kind: CallKind::StaticCall,
                depth: frame.message.depth + 1,
                gas: child_gas,
                sender,
                recipient: target,
                code_address: target,
                value: U256::zero(),
                transfers_value: false,
                input,
                is_static: true,
                created_address: None,
            },
        };

        frame.resume = Some(Resume {
            out_offset,
            out_size,
            is_create: false,
        });
        Ok(Some(FrameSignal::Spawn(message)))
    }

    fn op_create(
        &mut self,
        frame: &mut Computation,
        opcode: Opcode,
    ) -> Result<Option<FrameSignal>, VmError> {
        if frame.message.is_static {
            return Err(VmError::StaticContextViolation);
        }

        let value = frame.stack.pop()?;
        let offset = frame.stack.pop()?;
        let size = frame.stack.pop()?;
        let salt = if opcode == Opcode::Create2 {
            Some(frame.stack.pop()?)
        } else {
            None
        };

        let (offset, size) = self.memory_region(frame, offset, size)?;
        if opcode == Opcode::Create2 {
            frame
                .gas
                .consume(self.schedule.keccak256_word.saturating_mul((size as u64).div_ceil(32)))?;
        }
        frame.gas.consume(self.schedule.create)?;

        let child_gas = if self.fork.caps_call_gas() {
            gas::all_but_one_64th(frame.gas.remaining())
        } else {
            frame.gas.remaining()
        };
        frame.gas.consume(child_gas)?;

        let sender = frame.message.recipient;
        let sender_nonce = self.state.nonce(sender)?;
        let depth_exhausted = frame.message.depth + 1 > MAX_CALL_DEPTH;
        let underfunded = self.state.balance(sender)? < value;
        if depth_exhausted || underfunded || sender_nonce == u64::MAX {
            frame.gas.return_gas(child_gas);
            frame.return_data = Bytes::new();
            frame.stack.push(U256::zero())?;
            return Ok(None);
        }

        let init_code = frame.memory.read_bytes(offset, size);
        let created = match salt {
            None => create_address(sender, sender_nonce),
            Some(salt) => create2_address(sender, salt, &init_code),
        };

        self.state.increment_nonce(sender)?;
        if self.fork.charges_cold_access() {
            // The created address is warmed whether or not the init code
            // succeeds.
            self.state.access_address(created);
        }

        let message = Message {
            kind: if opcode == Opcode::Create2 {
                CallKind::Create2
            } else {
                CallKind::Create
            },
            depth: frame.message.depth + 1,
            gas: child_gas,
            sender,
            recipient: created,
            code_address: created,
            value,
            transfers_value: true,
            input: Bytes::from_vec(init_code),
            is_static: false,
            created_address: Some(created),
        };

        frame.resume = Some(Resume {
            out_offset: 0,
            out_size: 0,
            is_create: true,
        });
        Ok(Some(FrameSignal::Spawn(message)))
    }

    fn op_selfdestruct(&mut self, frame: &mut Computation) -> Result<FrameSignal, VmError> {
        if frame.message.is_static {
            return Err(VmError::StaticContextViolation);
        }
        let beneficiary = Address::from_word(frame.stack.pop()?);
        let contract = frame.message.recipient;

        let mut cost = self.schedule.selfdestruct;
        if self.fork.charges_cold_access()
            && self.state.access_address(beneficiary) == AccessStatus::Cold
        {
            cost = cost.saturating_add(self.schedule.cold_account_access);
        }
        if self.schedule.selfdestruct_new_account > 0
            && !self.state.balance(contract)?.is_zero()
            && self.is_dead_account(beneficiary)?
        {
            cost = cost.saturating_add(self.schedule.selfdestruct_new_account);
        }
        frame.gas.consume(cost)?;

        let newly_queued = self.state.selfdestruct(contract, beneficiary)?;
        if newly_queued && self.fork.refunds_selfdestruct() {
            frame.refund += self.schedule.selfdestruct_refund as i64;
        }

        frame.output = Bytes::new();
        Ok(FrameSignal::Done)
    }

    // -------------------------------------------------------------------------
    // Shared helpers
    // -------------------------------------------------------------------------

    /// Charge memory expansion for `[offset, offset + size)` and return
    /// the region as native offsets. Zero-size regions charge nothing.
    fn memory_region(
        &self,
        frame: &mut Computation,
        offset: U256,
        size: U256,
    ) -> Result<(usize, usize), VmError> {
        if size.is_zero() {
            return Ok((0, 0));
        }
        let offset = word_to_u64(offset)?;
        let size = word_to_u64(size)?;
        let end = offset.checked_add(size).ok_or(VmError::OutOfGas)?;

        let cost = gas::memory_expansion_cost(frame.memory.word_count() as u64, end);
        frame.gas.consume(cost)?;
        frame
            .memory
            .expand(usize::try_from(end).map_err(|_| VmError::MemoryLimitExceeded)?)?;
        Ok((offset as usize, size as usize))
    }

    /// Account-access pricing: warm/cold under Berlin rules, the fork's
    /// flat cost before.
    fn account_access_cost(&mut self, address: Address, flat: u64) -> u64 {
        if self.fork.charges_cold_access() {
            match self.state.access_address(address) {
                AccessStatus::Cold => self.schedule.cold_account_access,
                AccessStatus::Warm => self.schedule.warm_access,
            }
        } else {
            flat
        }
    }

    /// "Dead" for new-account surcharges: empty once EIP-161 is active,
    /// absent before.
    fn is_dead_account(&mut self, address: Address) -> Result<bool, VmError> {
        if self.fork.reaps_empty_accounts() {
            Ok(self.state.is_empty_account(address)?)
        } else {
            Ok(!self.state.account_exists(address)?)
        }
    }
}

// =============================================================================
// ADDRESS DERIVATION
// =============================================================================

/// CREATE address: `keccak(rlp([sender, nonce]))[12..]`.
#[must_use]
pub fn create_address(sender: Address, nonce: u64) -> Address {
    let mut list = RlpList::new();
    list.append_address(&sender).append_u64(nonce);
    Address::from_word(Hash::keccak(&list.finish()).into_word())
}

/// CREATE2 address: `keccak(0xff ‖ sender ‖ salt ‖ keccak(init))[12..]`.
#[must_use]
pub fn create2_address(sender: Address, salt: U256, init_code: &[u8]) -> Address {
    let mut salt_bytes = [0u8; 32];
    salt.to_big_endian(&mut salt_bytes);
    let code_hash = Hash::keccak(init_code);

    let mut preimage = Vec::with_capacity(85);
    preimage.push(0xFF);
    preimage.extend_from_slice(sender.as_bytes());
    preimage.extend_from_slice(&salt_bytes);
    preimage.extend_from_slice(code_hash.as_bytes());
    Address::from_word(Hash::keccak(&preimage).into_word())
}

// =============================================================================
// WORD HELPERS
// =============================================================================

fn binary_op(
    frame: &mut Computation,
    op: impl FnOnce(U256, U256) -> U256,
) -> Result<(), VmError> {
    let a = frame.stack.pop()?;
    let b = frame.stack.pop()?;
    frame.stack.push(op(a, b))
}

fn bool_word(condition: bool) -> U256 {
    if condition {
        U256::one()
    } else {
        U256::zero()
    }
}

fn word_to_u64(value: U256) -> Result<u64, VmError> {
    if value > U256::from(u64::MAX) {
        return Err(VmError::OutOfGas);
    }
    Ok(value.low_u64())
}

fn validate_jump(frame: &Computation, dest: U256) -> Result<usize, VmError> {
    if dest > U256::from(u64::MAX) {
        return Err(VmError::InvalidJumpDest(usize::MAX));
    }
    let dest = dest.low_u64() as usize;
    if !frame.jump_dests.contains(&dest) {
        return Err(VmError::InvalidJumpDest(dest));
    }
    Ok(dest)
}

fn truncate_u512(value: U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

fn slice_padded(source: &[u8], offset: U256, size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    if offset <= U256::from(usize::MAX as u64) {
        let offset = offset.low_u64() as usize;
        if offset < source.len() {
            let available = (source.len() - offset).min(size);
            out[..available].copy_from_slice(&source[offset..offset + available]);
        }
    }
    out
}

fn signed_lt(a: U256, b: U256) -> bool {
    match (a.bit(255), b.bit(255)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_negative = a.bit(255);
    let b_negative = b.bit(255);
    let a_abs = if a_negative { twos_complement(a) } else { a };
    let b_abs = if b_negative { twos_complement(b) } else { b };
    // -2^255 / -1 stays -2^255 by two's complement wrap.
    let quotient = a_abs / b_abs;
    if a_negative == b_negative {
        quotient
    } else {
        twos_complement(quotient)
    }
}

fn signed_mod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_negative = a.bit(255);
    let a_abs = if a_negative { twos_complement(a) } else { a };
    let b_abs = if b.bit(255) { twos_complement(b) } else { b };
    let remainder = a_abs % b_abs;
    if a_negative {
        twos_complement(remainder)
    } else {
        remainder
    }
}

fn sar(shift: U256, value: U256) -> U256 {
    let negative = value.bit(255);
    if shift >= U256::from(256u64) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = shift.low_u64() as usize;
    if shift == 0 {
        return value;
    }
    let shifted = value >> shift;
    if negative {
        shifted | (U256::MAX << (256 - shift))
    } else {
        shifted
    }
}

fn exp_by_squaring(mut base: U256, mut exponent: U256) -> U256 {
    let mut result = U256::one();
    while !exponent.is_zero() {
        if exponent.bit(0) {
            result = result.overflowing_mul(base).0;
        }
        exponent >>= 1;
        base = base.overflowing_mul(base).0;
    }
    result
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::NoBlockHashes;
    use ob_01_kv_store::MemoryKeyValueStore;
    use ob_02_state_trie::AccountsCache;

    fn block_env() -> BlockEnv {
        BlockEnv {
            number: 100,
            timestamp: 1_600_000_000,
            coinbase: Address::new([0xCC; 20]),
            difficulty: U256::from(131_072u64),
            gas_limit: 30_000_000,
            base_fee: None,
            chain_id: 1,
        }
    }

    fn sender() -> Address {
        Address::new([0xAA; 20])
    }

    fn contract() -> Address {
        Address::new([0xBB; 20])
    }

    fn call_message(gas: u64) -> Message {
        Message {
            kind: CallKind::Call,
            depth: 0,
            gas,
            sender: sender(),
            recipient: contract(),
            code_address: contract(),
            value: U256::zero(),
            transfers_value: true,
            input: Bytes::new(),
            is_static: false,
            created_address: None,
        }
    }

    /// Install `code` at the contract address and execute a call to it.
    fn run_code(fork: Fork, code: &[u8], gas: u64) -> ExecutionOutcome {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);
        cache.add_balance(sender(), U256::from(10u64).pow(U256::from(18u64))).unwrap();
        cache.set_code(contract(), Bytes::from_slice(code)).unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::from(1u64),
        };
        let mut evm = Evm::new(&mut cache, &block, tx, fork, &NoBlockHashes);
        evm.execute(call_message(gas))
    }

    #[test]
    fn test_add_and_return() {
        // PUSH1 5, PUSH1 3, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [
            0x60, 0x05, 0x60, 0x03, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
        ];
        let outcome = run_code(Fork::London, &code, 100_000);
        assert!(outcome.status.is_success());
        assert_eq!(outcome.output.len(), 32);
        assert_eq!(U256::from_big_endian(outcome.output.as_slice()), U256::from(8u64));
        // 5 pushes + ADD at 3 gas each, MSTORE 3 + one memory word 3, RETURN 0
        assert_eq!(outcome.gas_used(100_000), 6 * 3 + 3 + 3);
    }

    #[test]
    fn test_stop_is_implicit_at_code_end() {
        // A lone PUSH1 1 runs off the end of the code
        let outcome = run_code(Fork::London, &[0x60, 0x01], 100_000);
        assert!(outcome.status.is_success());
        assert!(outcome.output.is_empty());
        assert_eq!(outcome.gas_used(100_000), 3);
    }

    #[test]
    fn test_invalid_jump_burns_gas() {
        // PUSH1 1, JUMP: target 1 is push data, not a JUMPDEST
        let outcome = run_code(Fork::London, &[0x60, 0x01, 0x56], 50_000);
        assert!(matches!(
            outcome.status,
            OutcomeStatus::Failed(VmError::InvalidJumpDest(1))
        ));
        assert_eq!(outcome.gas_remaining, 0);
    }

    #[test]
    fn test_jump_to_jumpdest() {
        // PUSH1 4, JUMP, INVALID, JUMPDEST, STOP
        let code = [0x60, 0x04, 0x56, 0xFE, 0x5B, 0x00];
        let outcome = run_code(Fork::London, &code, 50_000);
        assert!(outcome.status.is_success());
    }

    #[test]
    fn test_revert_keeps_gas_and_output() {
        // PUSH1 1, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, REVERT
        let code = [0x60, 0x01, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xFD];
        let outcome = run_code(Fork::London, &code, 50_000);
        assert_eq!(outcome.status, OutcomeStatus::Revert);
        assert!(outcome.gas_remaining > 0);
        assert_eq!(outcome.output.as_slice(), &[0x01]);
        assert!(outcome.logs.is_empty());
    }

    #[test]
    fn test_revert_unavailable_before_byzantium() {
        let outcome = run_code(Fork::SpuriousDragon, &[0x60, 0x00, 0x60, 0x00, 0xFD], 50_000);
        assert!(matches!(
            outcome.status,
            OutcomeStatus::Failed(VmError::InvalidOpcode(0xFD))
        ));
    }

    #[test]
    fn test_out_of_gas_drains_frame() {
        let outcome = run_code(Fork::London, &[0x60, 0x01, 0x60, 0x01], 4);
        assert!(matches!(outcome.status, OutcomeStatus::Failed(VmError::OutOfGas)));
        assert_eq!(outcome.gas_remaining, 0);
    }

    #[test]
    fn test_sstore_static_context_violation() {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);
        // PUSH1 1, PUSH1 1, SSTORE
        cache
            .set_code(contract(), Bytes::from_slice(&[0x60, 0x01, 0x60, 0x01, 0x55]))
            .unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::one(),
        };
        let mut evm = Evm::new(&mut cache, &block, tx, Fork::London, &NoBlockHashes);
        let mut message = call_message(100_000);
        message.kind = CallKind::StaticCall;
        message.transfers_value = false;
        message.is_static = true;
        let outcome = evm.execute(message);
        assert!(matches!(
            outcome.status,
            OutcomeStatus::Failed(VmError::StaticContextViolation)
        ));
    }

    #[test]
    fn test_value_call_from_static_context_fails_early() {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);
        // CALL with value 1: PUSH1 0 x2 (ret), PUSH1 0 x2 (args),
        // PUSH1 1 (value), PUSH1 0 (addr), PUSH1 0 (gas), CALL
        let code = [
            0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x01, 0x60, 0x00, 0x60, 0x00,
            0xF1,
        ];
        cache.set_code(contract(), Bytes::from_slice(&code)).unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::one(),
        };
        let mut evm = Evm::new(&mut cache, &block, tx, Fork::London, &NoBlockHashes);
        let mut message = call_message(100_000);
        message.is_static = true;
        message.transfers_value = false;
        let outcome = evm.execute(message);
        assert!(matches!(
            outcome.status,
            OutcomeStatus::Failed(VmError::StaticContextViolation)
        ));
    }

    #[test]
    fn test_call_at_depth_limit_pushes_zero_and_refunds() {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);
        // CALL to 0x10 with zero value, then store the status word and
        // return it.
        let code = [
            0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x10, 0x61, 0xFF,
            0xFF, 0xF1, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
        ];
        cache.set_code(contract(), Bytes::from_slice(&code)).unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::one(),
        };
        let mut evm = Evm::new(&mut cache, &block, tx, Fork::London, &NoBlockHashes);
        let mut message = call_message(100_000);
        message.depth = MAX_CALL_DEPTH;
        let outcome = evm.execute(message);

        assert!(outcome.status.is_success());
        assert!(U256::from_big_endian(outcome.output.as_slice()).is_zero());
        // The child budget came straight back: only the flat costs, the
        // warm access, and the memory word were paid.
        let pushes = 8 * 3;
        let access = 2_600;
        let store_and_return = 3 + 3 + 3 + 3;
        assert_eq!(outcome.gas_used(100_000), pushes + access + store_and_return);
    }

    #[test]
    fn test_tangerine_call_to_absent_account_costs_700() {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);
        // Zero-value CALL to 0x10, then STOP
        let code = [
            0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x10, 0x60, 0x00,
            0xF1, 0x00,
        ];
        cache.set_code(contract(), Bytes::from_slice(&code)).unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::one(),
        };
        let mut evm = Evm::new(&mut cache, &block, tx, Fork::Tangerine, &NoBlockHashes);
        let outcome = evm.execute(call_message(100_000));

        assert!(outcome.status.is_success());
        // Seven pushes plus the 700 account-load charge; no new-account
        // surcharge and no account materialization for a zero-value call.
        assert_eq!(outcome.gas_used(100_000), 7 * 3 + 700);
        let mut target = [0u8; 20];
        target[19] = 0x10;
        assert!(!cache.account_exists(Address::new(target)).unwrap());
    }

    #[test]
    fn test_berlin_sstore_cold_set_then_clear_refund() {
        // PUSH1 1, PUSH1 0, SSTORE (cold set), PUSH1 0, PUSH1 0, SSTORE
        // (same-transaction reversal)
        let code = [0x60, 0x01, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0x55];
        let outcome = run_code(Fork::Berlin, &code, 100_000);
        assert!(outcome.status.is_success());
        assert_eq!(outcome.gas_used(100_000), 4 * 3 + 22_100 + 100);
        assert_eq!(outcome.refund, 19_900);
    }

    #[test]
    fn test_selfdestruct_credits_beneficiary() {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);
        cache.add_balance(contract(), U256::from(500u64)).unwrap();
        // PUSH20 beneficiary, SELFDESTRUCT
        let mut code = vec![0x73];
        code.extend_from_slice(&[0xDD; 20]);
        code.push(0xFF);
        cache.set_code(contract(), Bytes::from_slice(&code)).unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::one(),
        };
        let mut evm = Evm::new(&mut cache, &block, tx, Fork::Berlin, &NoBlockHashes);
        let outcome = evm.execute(call_message(100_000));

        assert!(outcome.status.is_success());
        // Berlin still refunds self-destructs
        assert_eq!(outcome.refund, 24_000);
        assert_eq!(cache.balance(Address::new([0xDD; 20])).unwrap(), U256::from(500u64));
        assert_eq!(cache.balance(contract()).unwrap(), U256::zero());
    }

    #[test]
    fn test_selfdestruct_refund_removed_in_london() {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);
        cache.add_balance(contract(), U256::from(500u64)).unwrap();
        let mut code = vec![0x73];
        code.extend_from_slice(contract().as_bytes());
        code.push(0xFF);
        cache.set_code(contract(), Bytes::from_slice(&code)).unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::one(),
        };
        let mut evm = Evm::new(&mut cache, &block, tx, Fork::London, &NoBlockHashes);
        let outcome = evm.execute(call_message(100_000));

        assert!(outcome.status.is_success());
        assert_eq!(outcome.refund, 0);
        // Self-beneficiary burns the balance
        assert_eq!(cache.balance(contract()).unwrap(), U256::zero());
    }

    #[test]
    fn test_call_merges_child_logs_and_writes_output() {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);

        let callee = Address::new([0x11; 20]);
        // Callee: LOG0 over empty data, then return one byte 0x2A:
        // PUSH1 0, PUSH1 0, LOG0, PUSH1 0x2A, PUSH1 0, MSTORE8,
        // PUSH1 1, PUSH1 0, RETURN
        let callee_code = [
            0x60, 0x00, 0x60, 0x00, 0xA0, 0x60, 0x2A, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00,
            0xF3,
        ];
        cache.set_code(callee, Bytes::from_slice(&callee_code)).unwrap();

        // Caller: CALL(gas=0xFFFF, callee, value 0, out window [0..1]),
        // then return memory[0..1]
        let mut caller_code = vec![
            0x60, 0x01, // retLength = 1
            0x60, 0x00, // retOffset = 0
            0x60, 0x00, // argsLength
            0x60, 0x00, // argsOffset
            0x60, 0x00, // value
            0x73,
        ];
        caller_code.extend_from_slice(callee.as_bytes());
        caller_code.extend_from_slice(&[0x61, 0xFF, 0xFF, 0xF1]); // gas, CALL
        caller_code.extend_from_slice(&[0x60, 0x01, 0x60, 0x00, 0xF3]); // RETURN mem[0..1]
        cache.set_code(contract(), Bytes::from_vec(caller_code)).unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::one(),
        };
        let mut evm = Evm::new(&mut cache, &block, tx, Fork::London, &NoBlockHashes);
        let outcome = evm.execute(call_message(200_000));

        assert!(outcome.status.is_success());
        assert_eq!(outcome.output.as_slice(), &[0x2A]);
        assert_eq!(outcome.logs.len(), 1);
        assert_eq!(outcome.logs[0].address, callee);
    }

    #[test]
    fn test_failed_child_discards_state_and_logs() {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);

        let callee = Address::new([0x11; 20]);
        // Callee logs, stores, then hits INVALID
        let callee_code = [
            0x60, 0x00, 0x60, 0x00, 0xA0, // LOG0
            0x60, 0x07, 0x60, 0x00, 0x55, // SSTORE 0 <- 7
            0xFE, // INVALID
        ];
        cache.set_code(callee, Bytes::from_slice(&callee_code)).unwrap();

        // Caller calls, stores the status word, returns it
        let mut caller_code = vec![
            0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x73,
        ];
        caller_code.extend_from_slice(callee.as_bytes());
        caller_code.extend_from_slice(&[0x61, 0xFF, 0xFF, 0xF1]);
        caller_code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3]);
        cache.set_code(contract(), Bytes::from_vec(caller_code)).unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::one(),
        };
        let mut evm = Evm::new(&mut cache, &block, tx, Fork::London, &NoBlockHashes);
        let outcome = evm.execute(call_message(200_000));

        assert!(outcome.status.is_success());
        assert!(U256::from_big_endian(outcome.output.as_slice()).is_zero());
        assert!(outcome.logs.is_empty());
        assert!(cache
            .get_storage(callee, StorageKey::ZERO)
            .unwrap()
            .is_zero());
    }

    #[test]
    fn test_create_address_derivation() {
        let a = create_address(sender(), 0);
        let b = create_address(sender(), 1);
        assert_ne!(a, b);
        assert_ne!(a, sender());
    }

    #[test]
    fn test_create2_address_eip1014_vector() {
        let address = create2_address(Address::ZERO, U256::zero(), &[]);
        assert_eq!(
            hex::encode(address.as_bytes()),
            "4d1a2e2bb4f88f0250f26ffff098b0b30b26bf38"
        );
    }

    #[test]
    fn test_create_deploys_code() {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);
        // Init code returning one byte 0x2A:
        //   PUSH1 0x2A, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, RETURN
        // Caller: store init code in memory, CREATE, return the address
        // word.
        let init = [0x60, 0x2A, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xF3];
        let mut code = Vec::new();
        // Write init code into memory at 0 via PUSH10 ... MSTORE trick:
        // PUSH10 <init>, PUSH1 22, MSTORE  (left-padded into bytes 0..32,
        // so the code sits at offset 32-10+22 = 22? Use simpler loop.)
        for (i, &byte) in init.iter().enumerate() {
            code.extend_from_slice(&[0x60, byte, 0x60, i as u8, 0x53]); // MSTORE8
        }
        code.extend_from_slice(&[
            0x60, init.len() as u8, // length
            0x60, 0x00, // offset
            0x60, 0x00, // value
            0xF0, // CREATE
        ]);
        // Return the created address word
        code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3]);
        cache.set_code(contract(), Bytes::from_vec(code)).unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::one(),
        };
        let mut evm = Evm::new(&mut cache, &block, tx, Fork::London, &NoBlockHashes);
        let outcome = evm.execute(call_message(500_000));

        assert!(outcome.status.is_success());
        let created = Address::from_word(U256::from_big_endian(outcome.output.as_slice()));
        assert_eq!(created, create_address(contract(), 0));
        assert_eq!(cache.code(created).unwrap().as_slice(), &[0x2A]);
        // EIP-161: fresh contracts start at nonce one
        assert_eq!(cache.nonce(created).unwrap(), 1);
        assert_eq!(cache.nonce(contract()).unwrap(), 1);
    }

    #[test]
    fn test_london_rejects_ef_code() {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);
        // Init code returning 0xEF:
        //   PUSH1 0xEF, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, RETURN
        let init = [0x60, 0xEF, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xF3];
        let mut code = Vec::new();
        for (i, &byte) in init.iter().enumerate() {
            code.extend_from_slice(&[0x60, byte, 0x60, i as u8, 0x53]);
        }
        code.extend_from_slice(&[0x60, init.len() as u8, 0x60, 0x00, 0x60, 0x00, 0xF0]);
        code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3]);
        cache.set_code(contract(), Bytes::from_vec(code.clone())).unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::one(),
        };
        {
            let mut evm = Evm::new(&mut cache, &block, tx, Fork::London, &NoBlockHashes);
            let outcome = evm.execute(call_message(500_000));
            assert!(outcome.status.is_success());
            // CREATE pushed zero: the deposit was rejected
            assert!(U256::from_big_endian(outcome.output.as_slice()).is_zero());
        }

        // The same deployment is fine under Berlin
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);
        cache.set_code(contract(), Bytes::from_vec(code)).unwrap();
        cache.begin_transaction();
        let mut evm = Evm::new(&mut cache, &block, tx, Fork::Berlin, &NoBlockHashes);
        let outcome = evm.execute(call_message(500_000));
        assert!(outcome.status.is_success());
        assert!(!U256::from_big_endian(outcome.output.as_slice()).is_zero());
    }

    #[test]
    fn test_precompile_call_from_evm() {
        let db = MemoryKeyValueStore::new();
        let mut cache = AccountsCache::new(&db);
        // Put 0xAB at memory 0, CALL identity (0x04) with in [0..1] and
        // out [1..2], return memory[1..2]
        let code = [
            0x60, 0xAB, 0x60, 0x00, 0x53, // MSTORE8(0, 0xAB)
            0x60, 0x01, // retLength
            0x60, 0x01, // retOffset
            0x60, 0x01, // argsLength
            0x60, 0x00, // argsOffset
            0x60, 0x00, // value
            0x60, 0x04, // identity precompile
            0x61, 0xFF, 0xFF, // gas
            0xF1, // CALL
            0x50, // POP status
            0x60, 0x01, 0x60, 0x01, 0xF3, // RETURN mem[1..2]
        ];
        cache.set_code(contract(), Bytes::from_slice(&code)).unwrap();
        cache.begin_transaction();

        let block = block_env();
        let tx = TxEnv {
            origin: sender(),
            gas_price: U256::one(),
        };
        let mut evm = Evm::new(&mut cache, &block, tx, Fork::London, &NoBlockHashes);
        let outcome = evm.execute(call_message(200_000));
        assert!(outcome.status.is_success());
        assert_eq!(outcome.output.as_slice(), &[0xAB]);
    }

    #[test]
    fn test_signed_arithmetic_helpers() {
        let minus_one = U256::MAX;
        let minus_two = twos_complement(U256::from(2u64));

        assert_eq!(signed_div(minus_two, U256::from(2u64)), minus_one);
        assert_eq!(signed_div(minus_two, minus_one), U256::from(2u64));
        assert_eq!(signed_div(U256::from(7u64), U256::zero()), U256::zero());

        // -2^255 / -1 = -2^255
        let int_min = U256::one() << 255;
        assert_eq!(signed_div(int_min, minus_one), int_min);

        assert_eq!(signed_mod(twos_complement(U256::from(7u64)), U256::from(3u64)),
            twos_complement(U256::from(1u64)));
        assert!(signed_lt(minus_one, U256::zero()));
        assert!(!signed_lt(U256::zero(), minus_one));

        // SAR of a negative value fills with ones
        assert_eq!(sar(U256::from(1u64), minus_two), minus_one);
        assert_eq!(sar(U256::from(300u64), minus_two), minus_one);
        assert_eq!(sar(U256::from(300u64), U256::from(5u64)), U256::zero());
    }
}
