//! The invocation-payload parser.
//!
//! Evaluates a transfer payload script and reconstructs the transfer
//! parameters from the evaluation stack once execution halts at the
//! invocation opcode. `APPCALL` scripts target user (OEP4) contracts and
//! carry the contract address inline; `SYSCALL` scripts target the native
//! services and carry the contract on the stack.

use crate::{opcode, Executor, ValueStack, VmError, VmResult, VmValue};
use num_bigint::BigInt;
use ont_core::Address;

/// A transfer decoded from an invocation payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    /// The approved spender for `transferFrom` payloads.
    pub payer: Option<Address>,
    pub from: Address,
    pub to: Address,
    pub amount: BigInt,
}

/// Parses a transfer payload, returning the transfers and the target
/// contract address.
pub fn parse_payload(code: &[u8]) -> VmResult<(Vec<Transfer>, Address)> {
    let mut executor = Executor::new(code);
    match executor.run_to_invocation()? {
        opcode::APPCALL => parse_app(&mut executor),
        opcode::SYSCALL => parse_sys(&mut executor.eval),
        other => Err(VmError::UnexpectedOpcode(other)),
    }
}

fn parse_app(executor: &mut Executor) -> VmResult<(Vec<Transfer>, Address)> {
    let inline = executor.read_operand(20)?;
    let mut contract = parse_address(&inline)?;
    if contract.is_null() {
        let raw = executor.eval.pop_as_bytes()?;
        contract = parse_address(&raw)?;
    }
    let method = executor.eval.pop_as_bytes()?;
    let params = executor.eval.pop_as_array()?;
    match method.as_slice() {
        b"transfer" => {
            expect_arity(&params, 3)?;
            Ok((vec![parse_transfer_fields(&params)?], contract))
        }
        b"transferFrom" => {
            expect_arity(&params, 4)?;
            Ok((vec![parse_transfer_from_fields(&params)?], contract))
        }
        b"transferMulti" => {
            expect_arity(&params, 1)?;
            let inner = params[0].as_array()?;
            Ok((parse_transfers(&inner)?, contract))
        }
        other => Err(VmError::UnknownMethod(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

fn parse_sys(stack: &mut ValueStack) -> VmResult<(Vec<Transfer>, Address)> {
    // The version value on top of the stack is ignored.
    stack.pop_as_bytes()?;
    let raw = stack.pop_as_bytes()?;
    let contract = parse_address(&raw)?;
    let method = stack.pop_as_bytes()?;
    match method.as_slice() {
        b"transfer" | b"transferV2" => {
            let params = stack.pop_as_array()?;
            Ok((parse_transfers(&params)?, contract))
        }
        b"transferFrom" | b"transferFromV2" => {
            let fields = stack.pop_as_struct()?;
            expect_arity(&fields, 4)?;
            Ok((vec![parse_transfer_from_fields(&fields)?], contract))
        }
        other => Err(VmError::UnknownMethod(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

fn parse_transfers(params: &[VmValue]) -> VmResult<Vec<Transfer>> {
    let mut transfers = Vec::with_capacity(params.len());
    for param in params {
        let fields = param.as_struct()?;
        expect_arity(&fields, 3)?;
        transfers.push(parse_transfer_fields(&fields)?);
    }
    Ok(transfers)
}

fn parse_transfer_fields(fields: &[VmValue]) -> VmResult<Transfer> {
    let from = parse_address(&fields[0].as_bytes()?)?;
    let to = parse_address(&fields[1].as_bytes()?)?;
    let amount = fields[2].as_int()?;
    Ok(Transfer {
        payer: None,
        from,
        to,
        amount,
    })
}

fn parse_transfer_from_fields(fields: &[VmValue]) -> VmResult<Transfer> {
    let payer = parse_address(&fields[0].as_bytes()?)?;
    let mut transfer = parse_transfer_fields(&fields[1..])?;
    transfer.payer = Some(payer);
    Ok(transfer)
}

fn parse_address(raw: &[u8]) -> VmResult<Address> {
    Address::parse_from_bytes(raw).map_err(|_| VmError::BadAddressBytes(hex::encode(raw)))
}

fn expect_arity(fields: &[VmValue], expected: usize) -> VmResult<()> {
    if fields.len() != expected {
        return Err(VmError::BadStructArity {
            expected,
            got: fields.len(),
        });
    }
    Ok(())
}
