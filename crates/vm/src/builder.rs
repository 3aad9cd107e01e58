//! Invoke-code builders.
//!
//! These emit the exact opcode sequences the chain's transaction builders
//! produce, so a payload built here decodes through
//! [`parse_payload`](crate::parse_payload) and matches on-chain payloads
//! byte for byte.

use crate::{opcode, VmError, VmResult};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use ont_core::io::Sink;
use ont_core::num::{bigint_to_i128_bytes, bigint_to_neo_bytes};
use ont_core::Address;

/// The interop service name dispatching native contract invocations.
const NATIVE_INVOKE_NAME: &[u8] = b"Ontology.Native.Invoke";

/// A parameter of a contract invocation.
#[derive(Clone, Debug)]
pub enum InvokeParam {
    Bytes(Vec<u8>),
    String(String),
    Int(BigInt),
    Address(Address),
    Array(Vec<InvokeParam>),
    Struct(Vec<InvokeParam>),
}

#[derive(Default)]
struct ScriptBuilder {
    out: Vec<u8>,
}

impl ScriptBuilder {
    fn emit(&mut self, op: u8) {
        self.out.push(op);
    }

    fn push_bytes(&mut self, data: &[u8]) {
        let len = data.len();
        if len < opcode::PUSHDATA1 as usize {
            self.out.push(len as u8);
        } else if len <= 0xFF {
            self.out.push(opcode::PUSHDATA1);
            self.out.push(len as u8);
        } else if len <= 0xFFFF {
            self.out.push(opcode::PUSHDATA2);
            self.out.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.out.push(opcode::PUSHDATA4);
            self.out.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.out.extend_from_slice(data);
    }

    fn push_int(&mut self, value: &BigInt) {
        if value.is_zero() {
            self.emit(opcode::PUSH0);
        } else if *value == BigInt::from(-1) {
            self.emit(opcode::PUSHM1);
        } else if value.is_positive() && *value <= BigInt::from(16) {
            let v = value.to_u8().expect("range checked");
            self.emit(opcode::PUSH1 + v - 1);
        } else {
            let data = bigint_to_neo_bytes(value);
            self.push_bytes(&data);
        }
    }

    // The VM loads parameters in reverse order.
    fn push_params(&mut self, params: &[InvokeParam]) {
        for param in params.iter().rev() {
            self.push_param(param);
        }
    }

    fn push_param(&mut self, param: &InvokeParam) {
        match param {
            InvokeParam::Bytes(data) => self.push_bytes(data),
            InvokeParam::String(s) => self.push_bytes(s.as_bytes()),
            InvokeParam::Int(v) => self.push_int(v),
            InvokeParam::Address(addr) => self.push_bytes(&addr.0),
            InvokeParam::Array(items) => {
                self.push_params(items);
                self.push_int(&BigInt::from(items.len()));
                self.emit(opcode::PACK);
            }
            InvokeParam::Struct(fields) => {
                self.push_int(&BigInt::zero());
                self.emit(opcode::NEWSTRUCT);
                self.emit(opcode::TOALTSTACK);
                for field in fields {
                    self.push_param(field);
                    self.emit(opcode::DUPFROMALTSTACK);
                    self.emit(opcode::SWAP);
                    self.emit(opcode::APPEND);
                }
                self.emit(opcode::FROMALTSTACK);
            }
        }
    }
}

/// Builds NeoVM invocation code for a user (OEP4) contract.
pub fn build_neovm_invoke_code(contract: &Address, params: Vec<InvokeParam>) -> Vec<u8> {
    let mut builder = ScriptBuilder::default();
    builder.push_params(&params);
    builder.emit(opcode::APPCALL);
    builder.out.extend_from_slice(&contract.0);
    builder.out
}

/// Builds invocation code for a native contract method.
pub fn build_native_invoke_code(
    contract: &Address,
    version: u8,
    method: &str,
    params: Vec<InvokeParam>,
) -> Vec<u8> {
    let mut builder = ScriptBuilder::default();
    builder.push_params(&params);
    builder.push_bytes(method.as_bytes());
    builder.push_bytes(&contract.0);
    builder.push_int(&BigInt::from(version));
    builder.emit(opcode::SYSCALL);
    let mut sink = Sink::new();
    sink.write_var_bytes(NATIVE_INVOKE_NAME);
    builder.out.extend_from_slice(sink.bytes());
    builder.out
}

/// Builds invocation code for a WASM contract: the raw contract address
/// followed by the fixed-layout argument serialization.
pub fn build_wasm_invoke_code(contract: &Address, params: &[InvokeParam]) -> VmResult<Vec<u8>> {
    let mut sink = Sink::new();
    sink.write_address(contract);
    write_wasm_params(&mut sink, params)?;
    Ok(sink.into_bytes())
}

fn write_wasm_params(sink: &mut Sink, params: &[InvokeParam]) -> VmResult<()> {
    for param in params {
        match param {
            InvokeParam::String(s) => sink.write_string(s),
            InvokeParam::Bytes(data) => sink.write_var_bytes(data),
            InvokeParam::Address(addr) => sink.write_address(addr),
            InvokeParam::Int(v) => {
                let raw = bigint_to_i128_bytes(v).ok_or(VmError::IntegerOutOfRange)?;
                sink.write_bytes(&raw);
            }
            InvokeParam::Array(items) | InvokeParam::Struct(items) => {
                sink.write_var_uint(items.len() as u64);
                write_wasm_params(sink, items)?;
            }
        }
    }
    Ok(())
}
