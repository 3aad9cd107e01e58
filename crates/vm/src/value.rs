//! Stack values.
//!
//! Arrays and structs are reference values: duplicating one on the stack
//! shares the underlying storage, which is what makes the alt-stack
//! struct-building idiom in emitted scripts work.

use crate::{VmError, VmResult};
use num_bigint::BigInt;
use ont_core::num::{bigint_from_neo_bytes, bigint_to_neo_bytes};
use std::cell::RefCell;
use std::rc::Rc;

/// A value on the evaluation stack.
#[derive(Clone, Debug)]
pub enum VmValue {
    /// An arbitrary-precision integer.
    Int(BigInt),
    /// A byte string.
    Bytes(Vec<u8>),
    /// An array with shared storage.
    Array(Rc<RefCell<Vec<VmValue>>>),
    /// A struct with shared storage.
    Struct(Rc<RefCell<Vec<VmValue>>>),
}

impl VmValue {
    /// Creates an array value from items.
    pub fn array(items: Vec<VmValue>) -> Self {
        VmValue::Array(Rc::new(RefCell::new(items)))
    }

    /// Creates a struct value from items.
    pub fn struct_of(items: Vec<VmValue>) -> Self {
        VmValue::Struct(Rc::new(RefCell::new(items)))
    }

    /// Converts to a byte string. Integers convert through the VM's
    /// canonical little-endian signed encoding.
    pub fn as_bytes(&self) -> VmResult<Vec<u8>> {
        match self {
            VmValue::Bytes(data) => Ok(data.clone()),
            VmValue::Int(v) => Ok(bigint_to_neo_bytes(v)),
            _ => Err(VmError::TypeMismatch { expected: "bytes" }),
        }
    }

    /// Converts to an integer. Byte strings convert through the VM's
    /// canonical little-endian signed encoding.
    pub fn as_int(&self) -> VmResult<BigInt> {
        match self {
            VmValue::Int(v) => Ok(v.clone()),
            VmValue::Bytes(data) => Ok(bigint_from_neo_bytes(data)),
            _ => Err(VmError::TypeMismatch { expected: "integer" }),
        }
    }

    /// Returns the items of an array.
    pub fn as_array(&self) -> VmResult<Vec<VmValue>> {
        match self {
            VmValue::Array(items) => Ok(items.borrow().clone()),
            _ => Err(VmError::TypeMismatch { expected: "array" }),
        }
    }

    /// Returns the items of a struct.
    pub fn as_struct(&self) -> VmResult<Vec<VmValue>> {
        match self {
            VmValue::Struct(items) => Ok(items.borrow().clone()),
            _ => Err(VmError::TypeMismatch { expected: "struct" }),
        }
    }
}
