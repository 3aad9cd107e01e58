//! The opcode subset needed to evaluate transfer payloads.

/// Pushes the empty byte string.
pub const PUSH0: u8 = 0x00;
/// Highest direct push opcode; `0x01..=0x4B` push that many inline bytes.
pub const PUSHBYTES75: u8 = 0x4B;
/// Pushes bytes with a one-byte length prefix.
pub const PUSHDATA1: u8 = 0x4C;
/// Pushes bytes with a two-byte length prefix.
pub const PUSHDATA2: u8 = 0x4D;
/// Pushes bytes with a four-byte length prefix.
pub const PUSHDATA4: u8 = 0x4E;
/// Pushes the integer -1.
pub const PUSHM1: u8 = 0x4F;
/// Pushes the integer 1; `PUSH1..=PUSH16` push 1 through 16.
pub const PUSH1: u8 = 0x51;
/// Pushes the integer 16.
pub const PUSH16: u8 = 0x60;
/// Does nothing.
pub const NOP: u8 = 0x61;
/// Invokes a user contract; followed by a 20-byte contract address.
pub const APPCALL: u8 = 0x67;
/// Invokes a native service; followed by a var-bytes service name.
pub const SYSCALL: u8 = 0x68;
/// Copies the top of the alt stack onto the evaluation stack.
pub const DUPFROMALTSTACK: u8 = 0x6A;
/// Moves the top of the evaluation stack to the alt stack.
pub const TOALTSTACK: u8 = 0x6B;
/// Moves the top of the alt stack to the evaluation stack.
pub const FROMALTSTACK: u8 = 0x6C;
/// Duplicates the top of the stack.
pub const DUP: u8 = 0x76;
/// Swaps the top two stack items.
pub const SWAP: u8 = 0x7C;
/// Pops a count then that many items, pushing them as an array.
pub const PACK: u8 = 0xC1;
/// Pops a count and pushes a new array of that many placeholder items.
pub const NEWARRAY: u8 = 0xC5;
/// Pops a count and pushes a new struct of that many placeholder items.
pub const NEWSTRUCT: u8 = 0xC6;
/// Pops an item and a collection and appends the item to the collection.
pub const APPEND: u8 = 0xC8;
/// Verifies a signature against a public key.
pub const CHECKSIG: u8 = 0xAC;
