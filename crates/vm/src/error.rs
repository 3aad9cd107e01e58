//! Error types for the VM crate.

use thiserror::Error;

/// Errors raised while evaluating or interpreting a payload script.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Execution reached the end of the script without hitting an
    /// invocation opcode.
    #[error("script ended without an invocation")]
    MissingInvocation,

    /// Execution halted at an opcode that is not an invocation.
    #[error("unexpected opcode {0:#04x}")]
    UnexpectedOpcode(u8),

    /// A pop was attempted on an empty stack.
    #[error("stack underflow")]
    StackUnderflow,

    /// An operand or inline data ran past the end of the script.
    #[error("unexpected end of script")]
    UnexpectedEnd,

    /// A stack value had the wrong shape for the requested conversion.
    #[error("type mismatch: expected {expected}")]
    TypeMismatch {
        /// The kind of value the caller asked for.
        expected: &'static str,
    },

    /// A value that should be a 20-byte address was not.
    #[error("bad address bytes: {0}")]
    BadAddressBytes(String),

    /// A transfer struct had an unexpected number of fields.
    #[error("bad struct arity: expected {expected}, got {got}")]
    BadStructArity { expected: usize, got: usize },

    /// The invoked method is not a transfer method.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// An integer operand was out of the range the operation accepts.
    #[error("integer out of range")]
    IntegerOutOfRange,
}

/// Convenience alias for VM results.
pub type VmResult<T> = Result<T, VmError>;
