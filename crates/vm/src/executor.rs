//! The payload evaluator.
//!
//! Runs the data-building prefix of a script and halts at the first opcode
//! outside the supported subset, leaving the program counter just past it.
//! Transfer payloads halt at `APPCALL` or `SYSCALL`; the parser inspects
//! the halting opcode and the evaluation stack from there.

use crate::{opcode, ValueStack, VmError, VmResult, VmValue};
use num_bigint::BigInt;

/// A script evaluator with an evaluation stack and an alt stack.
pub struct Executor {
    code: Vec<u8>,
    pc: usize,
    /// The evaluation stack.
    pub eval: ValueStack,
    /// The alt stack used by struct-building scripts.
    pub alt: ValueStack,
}

impl Executor {
    /// Creates an executor over the given script.
    pub fn new(code: &[u8]) -> Self {
        Self {
            code: code.to_vec(),
            pc: 0,
            eval: ValueStack::new(),
            alt: ValueStack::new(),
        }
    }

    /// The current program counter.
    pub fn position(&self) -> usize {
        self.pc
    }

    /// Reads `n` operand bytes from the code stream at the program counter.
    pub fn read_operand(&mut self, n: usize) -> VmResult<Vec<u8>> {
        if self.pc + n > self.code.len() {
            return Err(VmError::UnexpectedEnd);
        }
        let out = self.code[self.pc..self.pc + n].to_vec();
        self.pc += n;
        Ok(out)
    }

    fn read_operand_u8(&mut self) -> VmResult<usize> {
        Ok(self.read_operand(1)?[0] as usize)
    }

    fn read_operand_u16(&mut self) -> VmResult<usize> {
        let raw = self.read_operand(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]) as usize)
    }

    fn read_operand_u32(&mut self) -> VmResult<usize> {
        let raw = self.read_operand(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize)
    }

    /// Runs the script until an opcode outside the supported subset is
    /// reached, returning that opcode with the program counter just past
    /// it. Reaching the end of the script without halting is an error.
    pub fn run_to_invocation(&mut self) -> VmResult<u8> {
        loop {
            if self.pc >= self.code.len() {
                return Err(VmError::MissingInvocation);
            }
            let op = self.code[self.pc];
            self.pc += 1;
            match op {
                opcode::PUSH0 => self.eval.push(VmValue::Bytes(Vec::new())),
                1..=opcode::PUSHBYTES75 => {
                    let data = self.read_operand(op as usize)?;
                    self.eval.push(VmValue::Bytes(data));
                }
                opcode::PUSHDATA1 => {
                    let len = self.read_operand_u8()?;
                    let data = self.read_operand(len)?;
                    self.eval.push(VmValue::Bytes(data));
                }
                opcode::PUSHDATA2 => {
                    let len = self.read_operand_u16()?;
                    let data = self.read_operand(len)?;
                    self.eval.push(VmValue::Bytes(data));
                }
                opcode::PUSHDATA4 => {
                    let len = self.read_operand_u32()?;
                    let data = self.read_operand(len)?;
                    self.eval.push(VmValue::Bytes(data));
                }
                opcode::PUSHM1 => self.eval.push(VmValue::Int(BigInt::from(-1))),
                opcode::PUSH1..=opcode::PUSH16 => {
                    let v = (op - opcode::PUSH1 + 1) as i64;
                    self.eval.push(VmValue::Int(BigInt::from(v)));
                }
                opcode::NOP => {}
                opcode::DUP => {
                    let top = self.eval.peek()?.clone();
                    self.eval.push(top);
                }
                opcode::SWAP => self.eval.swap_top()?,
                opcode::TOALTSTACK => {
                    let item = self.eval.pop()?;
                    self.alt.push(item);
                }
                opcode::FROMALTSTACK => {
                    let item = self.alt.pop()?;
                    self.eval.push(item);
                }
                opcode::DUPFROMALTSTACK => {
                    let item = self.alt.peek()?.clone();
                    self.eval.push(item);
                }
                opcode::PACK => {
                    let count = self.eval.pop_as_count()?;
                    let mut items = Vec::with_capacity(count);
                    for _ in 0..count {
                        items.push(self.eval.pop()?);
                    }
                    self.eval.push(VmValue::array(items));
                }
                opcode::NEWARRAY => {
                    let count = self.eval.pop_as_count()?;
                    let items = vec![VmValue::Bytes(Vec::new()); count];
                    self.eval.push(VmValue::array(items));
                }
                opcode::NEWSTRUCT => {
                    let count = self.eval.pop_as_count()?;
                    let items = vec![VmValue::Bytes(Vec::new()); count];
                    self.eval.push(VmValue::struct_of(items));
                }
                opcode::APPEND => {
                    let item = self.eval.pop()?;
                    let target = self.eval.pop()?;
                    match &target {
                        VmValue::Array(items) | VmValue::Struct(items) => {
                            items.borrow_mut().push(item);
                        }
                        _ => {
                            return Err(VmError::TypeMismatch {
                                expected: "collection",
                            })
                        }
                    }
                }
                other => return Ok(other),
            }
        }
    }
}
