//! The transaction envelope codec.
//!
//! The envelope hash covers only the signature-free serialization, so the
//! hash of a signed transaction equals the hash that was signed. That same
//! hash doubles as the nonce-collision key in the store's unsigned-hash
//! set.

use crate::address::{self, sha256d, verification_program};
use crate::io::{Sink, Source};
use crate::{Address, CoreError, Hash256};

/// Signature scheme byte for SHA512/Ed25519 signatures.
const SIG_SCHEME_ED25519: u8 = 0x0A;

/// Transaction kinds. Deployments and the two invocation kinds are
/// modeled in full; anything else keeps its wire byte and an opaque
/// payload so the envelope still serializes and hashes faithfully.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxType {
    /// Contract deployment.
    Deploy,
    /// NeoVM contract invocation (native and OEP4 transfers).
    InvokeNeo,
    /// WASM contract invocation.
    InvokeWasm,
    /// A transaction kind the gateway does not model.
    Other(u8),
}

impl TxType {
    /// The wire byte for this transaction type.
    pub fn as_byte(self) -> u8 {
        match self {
            TxType::Deploy => 0xD0,
            TxType::InvokeNeo => 0xD1,
            TxType::InvokeWasm => 0xD2,
            TxType::Other(b) => b,
        }
    }

    /// Classifies a wire byte.
    pub fn from_byte(b: u8) -> Self {
        match b {
            0xD0 => TxType::Deploy,
            0xD1 => TxType::InvokeNeo,
            0xD2 => TxType::InvokeWasm,
            other => TxType::Other(other),
        }
    }
}

/// Deployment payload fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployCode {
    pub code: Vec<u8>,
    pub vm_flags: u8,
    pub name: String,
    pub version: String,
    pub author: String,
    pub email: String,
    pub description: String,
}

/// A transaction payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// NeoVM invocation code.
    InvokeNeo(Vec<u8>),
    /// WASM invocation code.
    InvokeWasm(Vec<u8>),
    /// Contract deployment.
    Deploy(DeployCode),
    /// The raw payload bytes of an unmodeled transaction kind, carried
    /// so the envelope hash stays exact.
    Opaque(Vec<u8>),
}

impl Payload {
    /// The invocation code, when this is an invoke payload.
    pub fn invoke_code(&self) -> Option<&[u8]> {
        match self {
            Payload::InvokeNeo(code) | Payload::InvokeWasm(code) => Some(code),
            Payload::Deploy(_) | Payload::Opaque(_) => None,
        }
    }
}

/// A signature entry: the invocation script carrying the signature bytes
/// and the verification program carrying the public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sig {
    pub invocation: Vec<u8>,
    pub verification: Vec<u8>,
}

impl Sig {
    /// Builds a single-key Ed25519 signature entry.
    pub fn single_ed25519(pubkey: &[u8; 32], signature: &[u8; 64]) -> Self {
        let mut payload = Vec::with_capacity(65);
        payload.push(SIG_SCHEME_ED25519);
        payload.extend_from_slice(signature);
        let mut invocation = Vec::with_capacity(66);
        invocation.push(payload.len() as u8);
        invocation.extend_from_slice(&payload);
        Self {
            invocation,
            verification: verification_program(pubkey),
        }
    }

    /// Extracts the Ed25519 public key from the verification program.
    pub fn public_key(&self) -> Result<[u8; 32], CoreError> {
        address::pubkey_from_verification_program(&self.verification)
    }
}

/// A transaction envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u8,
    pub tx_type: TxType,
    pub nonce: u32,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub payer: Address,
    pub payload: Payload,
    pub sigs: Vec<Sig>,
}

impl Transaction {
    /// Serializes the signature-free portion of the envelope.
    pub fn serialize_unsigned(&self, sink: &mut Sink) {
        sink.write_u8(self.version);
        sink.write_u8(self.tx_type.as_byte());
        sink.write_u32(self.nonce);
        sink.write_u64(self.gas_price);
        sink.write_u64(self.gas_limit);
        sink.write_address(&self.payer);
        match &self.payload {
            Payload::InvokeNeo(code) | Payload::InvokeWasm(code) | Payload::Opaque(code) => {
                sink.write_var_bytes(code)
            }
            Payload::Deploy(dc) => {
                sink.write_var_bytes(&dc.code);
                sink.write_u8(dc.vm_flags);
                sink.write_string(&dc.name);
                sink.write_string(&dc.version);
                sink.write_string(&dc.author);
                sink.write_string(&dc.email);
                sink.write_string(&dc.description);
            }
        }
        // No attributes are defined for this transaction version.
        sink.write_var_uint(0);
    }

    /// The envelope hash: a double sha256 over the signature-free
    /// serialization.
    pub fn hash(&self) -> Hash256 {
        let mut sink = Sink::new();
        self.serialize_unsigned(&mut sink);
        Hash256(sha256d(sink.bytes()))
    }

    /// Serializes the full envelope including signatures.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut sink = Sink::new();
        self.serialize_unsigned(&mut sink);
        sink.write_var_uint(self.sigs.len() as u64);
        for sig in &self.sigs {
            sink.write_var_bytes(&sig.invocation);
            sink.write_var_bytes(&sig.verification);
        }
        sink.into_bytes()
    }

    /// Decodes a full envelope, rejecting trailing bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        let mut source = Source::new(data);
        let version = source.read_u8()?;
        let tx_type = TxType::from_byte(source.read_u8()?);
        let nonce = source.read_u32()?;
        let gas_price = source.read_u64()?;
        let gas_limit = source.read_u64()?;
        let payer = source.read_address()?;
        let payload = match tx_type {
            TxType::InvokeNeo => Payload::InvokeNeo(source.read_var_bytes()?.to_vec()),
            TxType::InvokeWasm => Payload::InvokeWasm(source.read_var_bytes()?.to_vec()),
            // Every non-deploy payload serializes as var-bytes.
            TxType::Other(_) => Payload::Opaque(source.read_var_bytes()?.to_vec()),
            TxType::Deploy => {
                fn read_string(source: &mut Source<'_>) -> Result<String, CoreError> {
                    String::from_utf8(source.read_var_bytes()?.to_vec())
                        .map_err(|err| CoreError::InvalidEncoding(err.to_string()))
                }
                let code = source.read_var_bytes()?.to_vec();
                let vm_flags = source.read_u8()?;
                Payload::Deploy(DeployCode {
                    code,
                    vm_flags,
                    name: read_string(&mut source)?,
                    version: read_string(&mut source)?,
                    author: read_string(&mut source)?,
                    email: read_string(&mut source)?,
                    description: read_string(&mut source)?,
                })
            }
        };
        let attributes = source.read_var_uint()?;
        if attributes != 0 {
            return Err(CoreError::InvalidTransaction(format!(
                "unexpected attribute count {attributes}"
            )));
        }
        let sig_count = source.read_var_uint()?;
        let mut sigs = Vec::with_capacity(sig_count as usize);
        for _ in 0..sig_count {
            let invocation = source.read_var_bytes()?.to_vec();
            let verification = source.read_var_bytes()?.to_vec();
            sigs.push(Sig {
                invocation,
                verification,
            });
        }
        if !source.is_exhausted() {
            return Err(CoreError::InvalidTransaction(
                "trailing bytes after envelope".into(),
            ));
        }
        Ok(Self {
            version,
            tx_type,
            nonce,
            gas_price,
            gas_limit,
            payer,
            payload,
            sigs,
        })
    }
}
