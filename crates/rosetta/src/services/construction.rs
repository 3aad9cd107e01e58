//! The `/construction/*` endpoints.
//!
//! The preprocess/metadata/payloads flow carries its decisions in an
//! opaque binary options blob, hex-encoded inside the metadata maps. The
//! signing payload is the envelope hash over the signature-free
//! serialization, which is the same hash used for nonce-collision
//! detection against the store's unsigned-hash set.

use super::{append_operations, Services, TransferDetails, OP_TRANSFER};
use crate::types::{
    AccountIdentifier, ConstructionCombineRequest, ConstructionCombineResponse,
    ConstructionDeriveRequest, ConstructionDeriveResponse, ConstructionHashRequest,
    ConstructionMetadataRequest, ConstructionMetadataResponse, ConstructionParseRequest,
    ConstructionParseResponse, ConstructionPayloadsRequest, ConstructionPayloadsResponse,
    ConstructionPreprocessRequest, ConstructionPreprocessResponse, ConstructionSubmitRequest,
    Metadata, Operation, SigningPayload, SubAccountIdentifier, TransactionIdentifier,
    TransactionIdentifierResponse, CURVE_EDWARDS25519, SIGNATURE_ED25519,
};
use crate::{ApiError, ApiResult};
use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use num_bigint::{BigInt, Sign};
use num_traits::Zero;
use ont_core::constants::{DEFAULT_GAS_PRICE, MIN_GAS_LIMIT, V2_ACTIVATION_HEIGHT};
use ont_core::num::{bigint_from_be_bytes, bigint_to_be_bytes};
use ont_core::transaction::Sig;
use ont_core::{Address, Payload, Transaction as CoreTransaction, TxType};
use ont_node_client::{NodeClient, NodeError};
use ont_vm::{
    build_native_invoke_code, build_neovm_invoke_code, build_wasm_invoke_code, parse_payload,
    InvokeParam,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Metadata key carrying the hex-encoded options blob.
const OPTIONS_KEY: &str = "options";

/// The construction decisions carried between preprocess, metadata and
/// payloads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ConstructOptions {
    amount: Vec<u8>,
    contract: Vec<u8>,
    from: Vec<u8>,
    gas_limit: u64,
    gas_price: u64,
    nonce: u32,
    payer: Vec<u8>,
    to: Vec<u8>,
}

/// The canonical transfer intent extracted from an operation pair.
struct TransferIntent {
    amount: BigInt,
    contract: Address,
    from: Address,
    to: Address,
    native: bool,
}

fn invalid_ops(detail: impl std::fmt::Display) -> ApiError {
    ApiError::invalid_ops_intent().with_detail(detail)
}

fn invalid_construct(detail: impl std::fmt::Display) -> ApiError {
    ApiError::invalid_construct_options().with_detail(detail)
}

fn encode_options(opts: &ConstructOptions) -> ApiResult<Metadata> {
    let raw = bincode::serialize(opts)
        .map_err(|err| ApiError::serialization_format().with_detail(err))?;
    let mut metadata = Metadata::new();
    metadata.insert(OPTIONS_KEY.to_owned(), json!(hex::encode(raw)));
    Ok(metadata)
}

fn decode_options(metadata: Option<&Metadata>) -> ApiResult<ConstructOptions> {
    let metadata = metadata.ok_or_else(|| {
        ApiError::serialization_format().with_detail("options metadata field is missing")
    })?;
    let raw = metadata
        .get(OPTIONS_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ApiError::serialization_format().with_detail("options metadata field is not a string")
        })?;
    let raw = hex::decode(raw).map_err(|err| ApiError::serialization_format().with_detail(err))?;
    bincode::deserialize(&raw).map_err(|err| ApiError::serialization_format().with_detail(err))
}

fn metadata_u64(metadata: Option<&Metadata>, field: &str) -> Result<u64, String> {
    let Some(value) = metadata.and_then(|md| md.get(field)) else {
        return Ok(0);
    };
    value
        .as_u64()
        .ok_or_else(|| format!("unexpected datatype for metadata.{field}: {value}"))
}

impl Services {
    /// Implements `/construction/derive`.
    pub fn construction_derive(
        &self,
        request: &ConstructionDeriveRequest,
    ) -> ApiResult<ConstructionDeriveResponse> {
        if request.public_key.curve_type != CURVE_EDWARDS25519 {
            return Err(ApiError::invalid_public_key().with_detail(format!(
                "unsupported key type: {:?}",
                request.public_key.curve_type
            )));
        }
        let raw = hex::decode(&request.public_key.hex_bytes)
            .map_err(|err| ApiError::invalid_public_key().with_detail(err))?;
        let key: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
            ApiError::invalid_public_key()
                .with_detail(format!("invalid length for an ed25519 key: {}", raw.len()))
        })?;
        let address = Address::from_ed25519_pubkey(&key);
        let sub_account = match request.metadata.as_ref().and_then(|md| md.get("contract")) {
            None => None,
            Some(value) => {
                let raw = value.as_str().ok_or_else(|| {
                    ApiError::invalid_contract_address()
                        .with_detail("unexpected datatype for metadata.contract")
                })?;
                let contract = Address::from_hex_string(raw).map_err(|err| {
                    ApiError::invalid_contract_address()
                        .with_detail(format!("unable to parse metadata.contract: {err}"))
                })?;
                self.store.registry().require(&contract)?;
                Some(SubAccountIdentifier {
                    address: contract.to_hex_string(),
                })
            }
        };
        Ok(ConstructionDeriveResponse {
            account_identifier: AccountIdentifier {
                address: address.to_base58(),
                sub_account,
            },
        })
    }

    /// Implements `/construction/preprocess`.
    pub fn construction_preprocess(
        &self,
        request: &ConstructionPreprocessRequest,
    ) -> ApiResult<ConstructionPreprocessResponse> {
        if request.max_fee.as_ref().is_some_and(|fees| !fees.is_empty()) {
            return Err(ApiError::invalid_request_field().with_detail("unsupported field: max_fee"));
        }
        if request.suggested_fee_multiplier.is_some() {
            return Err(ApiError::invalid_request_field()
                .with_detail("unsupported field: suggested_fee_multiplier"));
        }
        let metadata = request.metadata.as_ref();
        let mut gas_limit = metadata_u64(metadata, "gas_limit")
            .map_err(|detail| ApiError::invalid_gas_limit().with_detail(detail))?;
        if gas_limit == 0 {
            gas_limit = MIN_GAS_LIMIT;
        }
        if gas_limit < MIN_GAS_LIMIT {
            return Err(ApiError::invalid_gas_limit().with_detail(format!(
                "gas limit of {gas_limit} is below the minimum value of {MIN_GAS_LIMIT}"
            )));
        }
        // The gas price is only type-checked here; the metadata endpoint
        // raises it to the network average.
        metadata_u64(metadata, "gas_price")
            .map_err(|detail| ApiError::invalid_gas_price().with_detail(detail))?;
        let nonce = metadata_u64(metadata, "nonce")
            .map_err(|detail| ApiError::invalid_nonce().with_detail(detail))?;
        if nonce > u32::MAX as u64 {
            return Err(ApiError::invalid_nonce()
                .with_detail(format!("nonce value {nonce} is outside the uint32 range")));
        }
        let payer = match metadata.and_then(|md| md.get("payer")) {
            None => None,
            Some(value) => {
                let raw = value.as_str().ok_or_else(|| {
                    ApiError::invalid_payer_address()
                        .with_detail("unexpected datatype for metadata.payer")
                })?;
                Some(Address::from_base58(raw).map_err(|err| {
                    ApiError::invalid_payer_address()
                        .with_detail(format!("unable to parse metadata.payer: {err}"))
                })?)
            }
        };
        let xfer = self.validate_ops(&request.operations)?;
        // An unspecified payer defaults to the sending account.
        let payer = payer.unwrap_or(xfer.from);
        let opts = ConstructOptions {
            amount: bigint_to_be_bytes(&xfer.amount),
            contract: xfer.contract.0.to_vec(),
            from: xfer.from.0.to_vec(),
            gas_limit,
            gas_price: DEFAULT_GAS_PRICE,
            nonce: nonce as u32,
            payer: payer.0.to_vec(),
            to: xfer.to.0.to_vec(),
        };
        debug!(?opts, "Preprocess options");
        Ok(ConstructionPreprocessResponse {
            options: encode_options(&opts)?,
        })
    }

    /// Implements `/construction/metadata`: raises the gas price to the
    /// recent network average and settles on a collision-free nonce.
    pub async fn construction_metadata(
        &self,
        request: &ConstructionMetadataRequest,
    ) -> ApiResult<ConstructionMetadataResponse> {
        let node = self.node()?.clone();
        let mut opts = decode_options(request.options.as_ref())?;
        if let Some(recent) = recent_gas_price(node.as_ref()).await {
            if recent > opts.gas_price {
                opts.gas_price = recent;
            }
        }
        if opts.gas_price < DEFAULT_GAS_PRICE {
            opts.gas_price = DEFAULT_GAS_PRICE;
        }
        if opts.gas_limit < MIN_GAS_LIMIT {
            opts.gas_limit = MIN_GAS_LIMIT;
        }
        if opts.nonce == 0 {
            for _ in 0..100 {
                let nonce: u32 = rand::random();
                if nonce == 0 {
                    continue;
                }
                opts.nonce = nonce;
                let tx = self.construct_transfer(&opts)?;
                if !self.store.contains_unsigned_tx_hash(&tx.hash())? {
                    break;
                }
                opts.nonce = 0;
            }
            if opts.nonce == 0 {
                return Err(ApiError::nonce_generation_failed());
            }
        } else {
            let tx = self.construct_transfer(&opts)?;
            if self.store.contains_unsigned_tx_hash(&tx.hash())? {
                return Err(ApiError::invalid_nonce().with_detail(format!(
                    "a conflicting transaction hash already exists for nonce {}",
                    opts.nonce
                )));
            }
        }
        debug!(?opts, "Metadata options");
        Ok(ConstructionMetadataResponse {
            metadata: encode_options(&opts)?,
        })
    }

    /// Implements `/construction/payloads`.
    pub fn construction_payloads(
        &self,
        request: &ConstructionPayloadsRequest,
    ) -> ApiResult<ConstructionPayloadsResponse> {
        let opts = decode_options(request.metadata.as_ref())?;
        let xfer = self.validate_ops(&request.operations)?;
        if opts.amount != bigint_to_be_bytes(&xfer.amount) {
            return Err(invalid_construct("amount does not match value from operations"));
        }
        if opts.contract != xfer.contract.0 {
            return Err(invalid_construct("contract does not match value from operations"));
        }
        if opts.from != xfer.from.0 {
            return Err(invalid_construct("from field does not match value from operations"));
        }
        if opts.to != xfer.to.0 {
            return Err(invalid_construct("to field does not match value from operations"));
        }
        let tx = self.construct_transfer(&opts)?;
        let hash = tx.hash();
        let sub_account = (!xfer.native).then(|| SubAccountIdentifier {
            address: xfer.contract.to_hex_string(),
        });
        let from_account = AccountIdentifier {
            address: xfer.from.to_base58(),
            sub_account: sub_account.clone(),
        };
        let mut payloads = vec![SigningPayload {
            account_identifier: Some(from_account),
            hex_bytes: hex::encode(hash.0),
            signature_type: Some(SIGNATURE_ED25519.to_owned()),
        }];
        if tx.payer != xfer.from {
            payloads.push(SigningPayload {
                account_identifier: Some(AccountIdentifier {
                    address: tx.payer.to_base58(),
                    sub_account,
                }),
                hex_bytes: hex::encode(hash.0),
                signature_type: Some(SIGNATURE_ED25519.to_owned()),
            });
        }
        Ok(ConstructionPayloadsResponse {
            unsigned_transaction: hex::encode(tx.to_bytes()),
            payloads,
        })
    }

    /// Implements `/construction/combine`.
    pub fn construction_combine(
        &self,
        request: &ConstructionCombineRequest,
    ) -> ApiResult<ConstructionCombineResponse> {
        let mut tx = decode_transaction(&request.unsigned_transaction)?;
        if !tx.sigs.is_empty() {
            return Err(ApiError::invalid_transaction_payload()
                .with_detail("unexpected signature found in unsigned transaction"));
        }
        if request.signatures.is_empty() {
            return Err(ApiError::invalid_signature());
        }
        let hash = tx.hash();
        for sig in &request.signatures {
            if sig.public_key.curve_type != CURVE_EDWARDS25519 {
                return Err(ApiError::invalid_public_key().with_detail(format!(
                    "unsupported key type: {:?}",
                    sig.public_key.curve_type
                )));
            }
            let raw = hex::decode(&sig.public_key.hex_bytes)
                .map_err(|err| ApiError::invalid_public_key().with_detail(err))?;
            let key: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
                ApiError::invalid_public_key().with_detail(format!(
                    "invalid length for ed25519 public key: {}",
                    raw.len()
                ))
            })?;
            if sig.signature_type != SIGNATURE_ED25519 {
                return Err(ApiError::invalid_signature().with_detail(format!(
                    "unsupported signature type: {:?}",
                    sig.signature_type
                )));
            }
            let payload = hex::decode(&sig.signing_payload.hex_bytes)
                .map_err(|err| ApiError::invalid_signature().with_detail(err))?;
            if payload != hash.0 {
                return Err(ApiError::invalid_signature()
                    .with_detail("mismatching signing_payload.hex_bytes and transaction hash"));
            }
            let raw_sig = hex::decode(&sig.hex_bytes)
                .map_err(|err| ApiError::invalid_signature().with_detail(err))?;
            let sig_bytes: [u8; 64] = raw_sig.as_slice().try_into().map_err(|_| {
                ApiError::invalid_signature().with_detail(format!(
                    "invalid length for ed25519 signature: {}",
                    raw_sig.len()
                ))
            })?;
            let verifying_key = VerifyingKey::from_bytes(&key)
                .map_err(|err| ApiError::invalid_public_key().with_detail(err))?;
            verifying_key
                .verify(&hash.0, &DalekSignature::from_bytes(&sig_bytes))
                .map_err(|_| ApiError::invalid_signature())?;
            tx.sigs.push(Sig::single_ed25519(&key, &sig_bytes));
        }
        Ok(ConstructionCombineResponse {
            signed_transaction: hex::encode(tx.to_bytes()),
        })
    }

    /// Implements `/construction/parse`.
    pub fn construction_parse(
        &self,
        request: &ConstructionParseRequest,
    ) -> ApiResult<ConstructionParseResponse> {
        let tx = decode_transaction(&request.transaction)?;
        let (operations, native, contract) = self.payload_operations(&tx)?;
        // Only two-operation transfers are ever constructed here.
        if operations.len() != 2 {
            return Err(ApiError::internal().with_detail(format!(
                "unexpected number of operations in transaction: {}",
                operations.len()
            )));
        }
        let negative_first = operations[0]
            .amount
            .as_ref()
            .map(|amount| amount.value.starts_with('-'))
            .unwrap_or_default();
        if !negative_first {
            return Err(ApiError::internal()
                .with_detail("unexpected \"transfer from\" operation in transaction"));
        }
        let signers = if request.signed {
            if tx.sigs.is_empty() {
                return Err(ApiError::invalid_transaction_payload()
                    .with_detail("signature(s) not present in signed transaction data"));
            }
            let mut signers = Vec::with_capacity(tx.sigs.len());
            for sig in &tx.sigs {
                let key = sig.public_key().map_err(|err| {
                    ApiError::invalid_transaction_payload()
                        .with_detail(format!("failed to get signature from transaction data: {err}"))
                })?;
                signers.push(AccountIdentifier {
                    address: Address::from_ed25519_pubkey(&key).to_base58(),
                    sub_account: (!native).then(|| SubAccountIdentifier {
                        address: contract.to_hex_string(),
                    }),
                });
            }
            Some(signers)
        } else {
            None
        };
        let mut metadata = Metadata::new();
        metadata.insert("gas_limit".to_owned(), json!(tx.gas_limit));
        metadata.insert("gas_price".to_owned(), json!(tx.gas_price));
        metadata.insert("nonce".to_owned(), json!(tx.nonce));
        metadata.insert("payer".to_owned(), json!(tx.payer.to_base58()));
        Ok(ConstructionParseResponse {
            operations,
            account_identifier_signers: signers,
            metadata,
        })
    }

    /// Implements `/construction/hash`.
    pub fn construction_hash(
        &self,
        request: &ConstructionHashRequest,
    ) -> ApiResult<TransactionIdentifierResponse> {
        let tx = decode_transaction(&request.signed_transaction)?;
        Ok(TransactionIdentifierResponse {
            transaction_identifier: TransactionIdentifier {
                hash: tx.hash().to_hex_string(),
            },
        })
    }

    /// Implements `/construction/submit`.
    pub async fn construction_submit(
        &self,
        request: &ConstructionSubmitRequest,
    ) -> ApiResult<TransactionIdentifierResponse> {
        let node = self.node()?.clone();
        let tx = decode_transaction(&request.signed_transaction)?;
        node.submit_tx(&tx.to_bytes()).await.map_err(|err| match err {
            NodeError::Rejected(detail) => ApiError::broadcast_failed().with_detail(detail),
            other => ApiError::internal().with_detail(other),
        })?;
        Ok(TransactionIdentifierResponse {
            transaction_identifier: TransactionIdentifier {
                hash: tx.hash().to_hex_string(),
            },
        })
    }

    /// Parses a transaction's invocation payload into operations,
    /// returning whether its currency is native and the contract.
    pub(crate) fn payload_operations(
        &self,
        tx: &CoreTransaction,
    ) -> ApiResult<(Vec<Operation>, bool, Address)> {
        let code = match &tx.payload {
            Payload::InvokeNeo(code) | Payload::InvokeWasm(code) => code,
            Payload::Deploy(_) | Payload::Opaque(_) => {
                return Err(ApiError::invalid_transaction_payload())
            }
        };
        let (transfers, contract) = parse_payload(code)?;
        let currency = self.store.registry().require(&contract)?;
        let native = currency.is_native();
        let rendered = self.rosetta_currency(currency);
        let mut operations = Vec::new();
        for transfer in transfers {
            append_operations(
                &mut operations,
                &TransferDetails {
                    amount: transfer.amount,
                    currency: rendered.clone(),
                    native,
                    contract,
                    from: transfer.from,
                    to: transfer.to,
                    is_gas: false,
                },
                false,
            );
        }
        Ok((operations, native, contract))
    }

    /// Rebuilds the transfer transaction described by the options blob.
    fn construct_transfer(&self, opts: &ConstructOptions) -> ApiResult<CoreTransaction> {
        let contract = Address::parse_from_bytes(&opts.contract).map_err(invalid_construct)?;
        let from = Address::parse_from_bytes(&opts.from).map_err(invalid_construct)?;
        let payer = Address::parse_from_bytes(&opts.payer).map_err(invalid_construct)?;
        let to = Address::parse_from_bytes(&opts.to).map_err(invalid_construct)?;
        let currency = self
            .store
            .registry()
            .require(&contract)
            .map_err(|_| invalid_construct(format!(
                "unable to find currency info for {}",
                contract.to_hex_string()
            )))?;
        let amount = bigint_from_be_bytes(&opts.amount);
        let (payload, tx_type) = if currency.is_native() {
            // The V2 transfer method is required once the precision
            // upgrade has activated on the indexed chain.
            let method = if self.store.indexed_height() >= V2_ACTIVATION_HEIGHT {
                "transferV2"
            } else {
                "transfer"
            };
            let code = build_native_invoke_code(
                &contract,
                0,
                method,
                vec![InvokeParam::Array(vec![InvokeParam::Struct(vec![
                    InvokeParam::Address(from),
                    InvokeParam::Address(to),
                    InvokeParam::Int(amount),
                ])])],
            );
            (Payload::InvokeNeo(code), TxType::InvokeNeo)
        } else if currency.wasm {
            let code = build_wasm_invoke_code(
                &contract,
                &[
                    InvokeParam::String("transfer".into()),
                    InvokeParam::Array(vec![
                        InvokeParam::Address(from),
                        InvokeParam::Address(to),
                        InvokeParam::Int(amount),
                    ]),
                ],
            )
            .map_err(invalid_construct)?;
            (Payload::InvokeWasm(code), TxType::InvokeWasm)
        } else {
            let code = build_neovm_invoke_code(
                &contract,
                vec![
                    InvokeParam::String("transfer".into()),
                    InvokeParam::Array(vec![
                        InvokeParam::Address(from),
                        InvokeParam::Address(to),
                        InvokeParam::Int(amount),
                    ]),
                ],
            );
            (Payload::InvokeNeo(code), TxType::InvokeNeo)
        };
        Ok(CoreTransaction {
            version: 0,
            tx_type,
            nonce: opts.nonce,
            gas_price: opts.gas_price,
            gas_limit: opts.gas_limit,
            payer,
            payload,
            sigs: Vec::new(),
        })
    }

    /// Validates the two-operation transfer intent.
    fn validate_ops(&self, ops: &[Operation]) -> ApiResult<TransferIntent> {
        if ops.len() != 2 {
            return Err(invalid_ops(format!(
                "unexpected number of operations: {}",
                ops.len()
            )));
        }
        let mut addrs = Vec::with_capacity(2);
        let mut amounts = Vec::with_capacity(2);
        let mut selected: Option<(Address, bool)> = None;
        for (i, op) in ops.iter().enumerate() {
            let account = op
                .account
                .as_ref()
                .ok_or_else(|| invalid_ops(format!("missing operations[{i}].account")))?;
            let addr = Address::from_base58(&account.address).map_err(|err| {
                invalid_ops(format!(
                    "unable to parse operations[{i}].account.address: {err}"
                ))
            })?;
            addrs.push(addr);
            let amount = op
                .amount
                .as_ref()
                .ok_or_else(|| invalid_ops(format!("missing operations[{i}].amount")))?;
            let value: BigInt = amount.value.parse().map_err(|_| {
                invalid_ops(format!(
                    "invalid operations[{i}].amount.value: {}",
                    amount.value
                ))
            })?;
            if value.is_zero() {
                return Err(invalid_ops(format!("operations[{i}].amount.value is zero")));
            }
            amounts.push(value);
            let token = self.validate_currency(&amount.currency)?;
            if token.is_native() {
                if account.sub_account.is_some() {
                    return Err(invalid_ops(format!(
                        "operations[{i}].account.sub_account specified for native token"
                    )));
                }
            } else {
                let sub = account.sub_account.as_ref().ok_or_else(|| {
                    invalid_ops(format!("missing operations[{i}].account.sub_account"))
                })?;
                let sub_contract = Address::from_hex_string(&sub.address).map_err(|err| {
                    invalid_ops(format!(
                        "unable to parse operations[{i}].account.sub_account.address: {err}"
                    ))
                })?;
                if token.contract != sub_contract {
                    return Err(invalid_ops(format!(
                        "operations[{i}].account.sub_account.address does not match currency"
                    )));
                }
            }
            match selected {
                None => selected = Some((token.contract, token.is_native())),
                Some((contract, _)) if contract != token.contract => {
                    return Err(invalid_ops("operations must be in the same currency"));
                }
                _ => {}
            }
            if op.op_type != OP_TRANSFER {
                return Err(invalid_ops(format!(
                    "unsupported operation type: {:?}",
                    op.op_type
                )));
            }
        }
        let related_on_first = ops[0]
            .related_operations
            .as_ref()
            .is_some_and(|rel| !rel.is_empty());
        let related_on_second = ops[1]
            .related_operations
            .as_ref()
            .is_some_and(|rel| !rel.is_empty());
        match (related_on_first, related_on_second) {
            (true, _) => validate_relation(ops, 0, 1)?,
            (_, true) => validate_relation(ops, 1, 0)?,
            _ => return Err(invalid_ops("invalid related_operations on operations")),
        }
        if !(&amounts[0] + &amounts[1]).is_zero() {
            return Err(invalid_ops("amount values in operations do not sum to zero"));
        }
        let (contract, native) = selected.expect("two operations validated");
        let (amount, from, to) = match amounts[0].sign() {
            Sign::Plus => (amounts[0].clone(), addrs[1], addrs[0]),
            Sign::Minus => (amounts[1].clone(), addrs[0], addrs[1]),
            Sign::NoSign => {
                return Err(invalid_ops("amount values in operations cannot be zero"));
            }
        };
        if from.is_null() {
            return Err(invalid_ops("transfers from null addresses are not supported"));
        }
        Ok(TransferIntent {
            amount,
            contract,
            from,
            to,
            native,
        })
    }
}

fn validate_relation(ops: &[Operation], ifrom: usize, ito: usize) -> ApiResult<()> {
    if ops[ito]
        .related_operations
        .as_ref()
        .is_some_and(|rel| !rel.is_empty())
    {
        return Err(invalid_ops(format!(
            "cannot have related_operations on both operations[{ifrom}] and operations[{ito}]"
        )));
    }
    let rel = &ops[ifrom]
        .related_operations
        .as_ref()
        .expect("checked by caller")[0];
    let src = ops[ito].operation_identifier.index;
    if rel.index != src {
        return Err(invalid_ops(format!(
            "operations[{ifrom}].related_operations does not match operations[{ito}].operation_identifier"
        )));
    }
    if ops[ifrom].operation_identifier.index - src != 1 {
        return Err(invalid_ops(format!(
            "operations[{ifrom}].related_operations does not follow from operations[{ito}]"
        )));
    }
    Ok(())
}

fn decode_transaction(data: &str) -> ApiResult<CoreTransaction> {
    if data.is_empty() {
        return Err(ApiError::invalid_transaction_payload());
    }
    let raw =
        hex::decode(data).map_err(|err| ApiError::invalid_transaction_payload().with_detail(err))?;
    CoreTransaction::from_bytes(&raw)
        .map_err(|err| ApiError::invalid_transaction_payload().with_detail(err))
}

/// The average gas price over the most recent non-empty block within the
/// last hundred heights.
async fn recent_gas_price(node: &dyn NodeClient) -> Option<u64> {
    let start = node.current_height().await.ok()?;
    let end = start.saturating_sub(100);
    let mut height = start;
    loop {
        if let Ok(block) = node.block_by_height(height).await {
            let prices: Vec<u64> = block
                .transactions
                .iter()
                .filter_map(|tx| tx.envelope.as_ref().map(|envelope| envelope.gas_price))
                .collect();
            if !prices.is_empty() {
                return Some(prices.iter().sum::<u64>() / prices.len() as u64);
            }
        }
        if height == end {
            return None;
        }
        height -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{self, FakeNode};
    use super::*;
    use crate::types::{
        Amount, NetworkIdentifier, OperationIdentifier, PublicKey, Signature,
    };
    use ed25519_dalek::{Signer, SigningKey};
    use ont_core::address;
    use ont_core::Hash256;
    use ont_store::{keys, lexnum::encode_height, BalanceChange, BlockState};
    use tempfile::TempDir;

    fn network() -> NetworkIdentifier {
        NetworkIdentifier {
            blockchain: "ontology".into(),
            network: "testnet".into(),
        }
    }

    fn ont_currency(svc: &Services) -> crate::types::Currency {
        svc.rosetta_currency(svc.store.registry().get(&address::ONT).expect("ont"))
    }

    fn transfer_ops(svc: &Services, from: &Address, to: &Address, amount: i64) -> Vec<Operation> {
        let currency = ont_currency(svc);
        vec![
            Operation {
                operation_identifier: OperationIdentifier {
                    index: 0,
                    network_index: None,
                },
                related_operations: None,
                op_type: OP_TRANSFER.to_owned(),
                status: None,
                account: Some(AccountIdentifier {
                    address: from.to_base58(),
                    sub_account: None,
                }),
                amount: Some(Amount {
                    value: (-amount).to_string(),
                    currency: currency.clone(),
                }),
            },
            Operation {
                operation_identifier: OperationIdentifier {
                    index: 1,
                    network_index: None,
                },
                related_operations: Some(vec![OperationIdentifier {
                    index: 0,
                    network_index: None,
                }]),
                op_type: OP_TRANSFER.to_owned(),
                status: None,
                account: Some(AccountIdentifier {
                    address: to.to_base58(),
                    sub_account: None,
                }),
                amount: Some(Amount {
                    value: amount.to_string(),
                    currency,
                }),
            },
        ]
    }

    fn run<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(future)
    }

    #[test]
    fn construction_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::online_services(&dir, FakeNode::default());
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let from = Address::from_ed25519_pubkey(signing_key.verifying_key().as_bytes());
        let to = Address([0x55; 20]);
        let ops = transfer_ops(&svc, &from, &to, 5);

        let preprocess = svc
            .construction_preprocess(&ConstructionPreprocessRequest {
                network_identifier: network(),
                operations: ops.clone(),
                metadata: None,
                max_fee: None,
                suggested_fee_multiplier: None,
            })
            .expect("preprocess");

        let metadata = run(svc.construction_metadata(&ConstructionMetadataRequest {
            network_identifier: network(),
            options: Some(preprocess.options),
        }))
        .expect("metadata");

        let payloads = svc
            .construction_payloads(&ConstructionPayloadsRequest {
                network_identifier: network(),
                operations: ops.clone(),
                metadata: Some(metadata.metadata),
            })
            .expect("payloads");
        // The payer defaults to the sender, so only one signer is needed.
        assert_eq!(payloads.payloads.len(), 1);
        assert_eq!(
            payloads.payloads[0]
                .account_identifier
                .as_ref()
                .expect("acct")
                .address,
            from.to_base58()
        );

        let digest = hex::decode(&payloads.payloads[0].hex_bytes).expect("hex");
        let signature = signing_key.sign(&digest);
        let combine = svc
            .construction_combine(&ConstructionCombineRequest {
                network_identifier: network(),
                unsigned_transaction: payloads.unsigned_transaction.clone(),
                signatures: vec![Signature {
                    signing_payload: payloads.payloads[0].clone(),
                    public_key: PublicKey {
                        hex_bytes: hex::encode(signing_key.verifying_key().as_bytes()),
                        curve_type: CURVE_EDWARDS25519.to_owned(),
                    },
                    signature_type: SIGNATURE_ED25519.to_owned(),
                    hex_bytes: hex::encode(signature.to_bytes()),
                }],
            })
            .expect("combine");

        // The signed hash equals the hash that was signed.
        let hash = svc
            .construction_hash(&ConstructionHashRequest {
                network_identifier: network(),
                signed_transaction: combine.signed_transaction.clone(),
            })
            .expect("hash");
        let signed = Hash256::from_hex_string(&hash.transaction_identifier.hash).expect("hash");
        assert_eq!(signed.0.to_vec(), digest);

        // Parsing the signed transaction recovers the intent and signer.
        let parsed = svc
            .construction_parse(&ConstructionParseRequest {
                network_identifier: network(),
                signed: true,
                transaction: combine.signed_transaction.clone(),
            })
            .expect("parse");
        assert_eq!(parsed.operations.len(), 2);
        assert_eq!(
            parsed.operations[0].amount.as_ref().expect("amount").value,
            "-5"
        );
        assert_eq!(
            parsed
                .account_identifier_signers
                .as_ref()
                .expect("signers")[0]
                .address,
            from.to_base58()
        );
        assert_eq!(parsed.metadata["payer"], json!(from.to_base58()));

        let submitted = run(svc.construction_submit(&ConstructionSubmitRequest {
            network_identifier: network(),
            signed_transaction: combine.signed_transaction,
        }))
        .expect("submit");
        assert_eq!(
            submitted.transaction_identifier.hash,
            hash.transaction_identifier.hash
        );
    }

    #[test]
    fn parse_of_payloads_is_idempotent() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::online_services(&dir, FakeNode::default());
        let from = Address([0x44; 20]);
        let to = Address([0x55; 20]);
        let ops = transfer_ops(&svc, &from, &to, 9);
        let preprocess = svc
            .construction_preprocess(&ConstructionPreprocessRequest {
                network_identifier: network(),
                operations: ops.clone(),
                metadata: None,
                max_fee: None,
                suggested_fee_multiplier: None,
            })
            .expect("preprocess");
        let metadata = run(svc.construction_metadata(&ConstructionMetadataRequest {
            network_identifier: network(),
            options: Some(preprocess.options),
        }))
        .expect("metadata");
        let payloads = svc
            .construction_payloads(&ConstructionPayloadsRequest {
                network_identifier: network(),
                operations: ops.clone(),
                metadata: Some(metadata.metadata),
            })
            .expect("payloads");
        let parsed = svc
            .construction_parse(&ConstructionParseRequest {
                network_identifier: network(),
                signed: false,
                transaction: payloads.unsigned_transaction,
            })
            .expect("parse");
        assert!(parsed.account_identifier_signers.is_none());
        for (original, recovered) in ops.iter().zip(parsed.operations.iter()) {
            assert_eq!(original.account, recovered.account);
            assert_eq!(
                original.amount.as_ref().expect("amount").value,
                recovered.amount.as_ref().expect("amount").value
            );
        }
    }

    #[test]
    fn fixed_nonce_collision_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::online_services(&dir, FakeNode::default());
        let from = Address([0x44; 20]);
        let to = Address([0x55; 20]);
        let ops = transfer_ops(&svc, &from, &to, 5);
        let preprocess = svc
            .construction_preprocess(&ConstructionPreprocessRequest {
                network_identifier: network(),
                operations: ops,
                metadata: Some(Metadata::from_iter([(
                    "nonce".to_owned(),
                    json!(1234),
                )])),
                max_fee: None,
                suggested_fee_multiplier: None,
            })
            .expect("preprocess");

        // Index the colliding unsigned hash first.
        let opts = decode_options(Some(&preprocess.options)).expect("options");
        let mut opts_with_gas = opts.clone();
        opts_with_gas.gas_price = DEFAULT_GAS_PRICE;
        let colliding = svc.construct_transfer(&opts_with_gas).expect("tx");
        let acct = Address([0x01; 20]);
        let prefix = keys::account_prefix(&acct, &address::ONT);
        svc.store
            .put_block(&BlockState {
                height: 0,
                hash: Hash256([1; 32]),
                block: Default::default(),
                changes: vec![BalanceChange {
                    diff: BigInt::from(1),
                    key: keys::account_key(&prefix, &encode_height(0)),
                    prefix,
                }],
                unsigned_hashes: vec![colliding.hash()],
                synced: 0,
            })
            .expect("commit");

        let err = run(svc.construction_metadata(&ConstructionMetadataRequest {
            network_identifier: network(),
            options: Some(preprocess.options),
        }))
        .expect_err("collision");
        assert_eq!(err.code, ApiError::invalid_nonce().code);
    }

    #[test]
    fn zero_nonce_generates_a_fresh_one() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::online_services(&dir, FakeNode::default());
        let from = Address([0x44; 20]);
        let to = Address([0x55; 20]);
        let ops = transfer_ops(&svc, &from, &to, 5);
        let preprocess = svc
            .construction_preprocess(&ConstructionPreprocessRequest {
                network_identifier: network(),
                operations: ops,
                metadata: None,
                max_fee: None,
                suggested_fee_multiplier: None,
            })
            .expect("preprocess");
        let metadata = run(svc.construction_metadata(&ConstructionMetadataRequest {
            network_identifier: network(),
            options: Some(preprocess.options),
        }))
        .expect("metadata");
        let opts = decode_options(Some(&metadata.metadata)).expect("options");
        assert_ne!(opts.nonce, 0);
        assert_eq!(opts.gas_price, DEFAULT_GAS_PRICE);
        assert_eq!(opts.gas_limit, MIN_GAS_LIMIT);
    }

    #[test]
    fn ops_intent_is_validated() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::online_services(&dir, FakeNode::default());
        let from = Address([0x44; 20]);
        let to = Address([0x55; 20]);

        let mut unbalanced = transfer_ops(&svc, &from, &to, 5);
        unbalanced[1].amount.as_mut().expect("amount").value = "6".to_owned();
        assert_eq!(
            svc.validate_ops(&unbalanced).expect_err("err").code,
            ApiError::invalid_ops_intent().code
        );

        let mut unrelated = transfer_ops(&svc, &from, &to, 5);
        unrelated[1].related_operations = None;
        assert_eq!(
            svc.validate_ops(&unrelated).expect_err("err").code,
            ApiError::invalid_ops_intent().code
        );

        let null_from = transfer_ops(&svc, &address::NULL, &to, 5);
        assert_eq!(
            svc.validate_ops(&null_from).expect_err("err").code,
            ApiError::invalid_ops_intent().code
        );

        let single = transfer_ops(&svc, &from, &to, 5)[..1].to_vec();
        assert_eq!(
            svc.validate_ops(&single).expect_err("err").code,
            ApiError::invalid_ops_intent().code
        );

        let valid = transfer_ops(&svc, &from, &to, 5);
        let intent = svc.validate_ops(&valid).expect("intent");
        assert_eq!(intent.from, from);
        assert_eq!(intent.to, to);
        assert_eq!(intent.amount, BigInt::from(5));
        assert!(intent.native);
    }

    #[test]
    fn preprocess_rejects_unsupported_fee_fields() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::online_services(&dir, FakeNode::default());
        let ops = transfer_ops(&svc, &Address([0x44; 20]), &Address([0x55; 20]), 5);
        let err = svc
            .construction_preprocess(&ConstructionPreprocessRequest {
                network_identifier: network(),
                operations: ops,
                metadata: None,
                max_fee: Some(vec![Amount {
                    value: "1".into(),
                    currency: ont_currency(&svc),
                }]),
                suggested_fee_multiplier: None,
            })
            .expect_err("err");
        assert_eq!(err.code, ApiError::invalid_request_field().code);
    }

    #[test]
    fn payer_differing_from_sender_needs_two_signers() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::online_services(&dir, FakeNode::default());
        let from = Address([0x44; 20]);
        let to = Address([0x55; 20]);
        let payer = Address([0x66; 20]);
        let ops = transfer_ops(&svc, &from, &to, 5);
        let preprocess = svc
            .construction_preprocess(&ConstructionPreprocessRequest {
                network_identifier: network(),
                operations: ops.clone(),
                metadata: Some(Metadata::from_iter([
                    ("payer".to_owned(), json!(payer.to_base58())),
                    ("nonce".to_owned(), json!(42)),
                ])),
                max_fee: None,
                suggested_fee_multiplier: None,
            })
            .expect("preprocess");
        let metadata = run(svc.construction_metadata(&ConstructionMetadataRequest {
            network_identifier: network(),
            options: Some(preprocess.options),
        }))
        .expect("metadata");
        let payloads = svc
            .construction_payloads(&ConstructionPayloadsRequest {
                network_identifier: network(),
                operations: ops,
                metadata: Some(metadata.metadata),
            })
            .expect("payloads");
        assert_eq!(payloads.payloads.len(), 2);
        assert_eq!(
            payloads.payloads[1]
                .account_identifier
                .as_ref()
                .expect("payer")
                .address,
            payer.to_base58()
        );
    }

    #[test]
    fn combine_rejects_bad_signatures() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::online_services(&dir, FakeNode::default());
        let signing_key = SigningKey::from_bytes(&[9u8; 32]);
        let from = Address::from_ed25519_pubkey(signing_key.verifying_key().as_bytes());
        let ops = transfer_ops(&svc, &from, &Address([0x55; 20]), 5);
        let preprocess = svc
            .construction_preprocess(&ConstructionPreprocessRequest {
                network_identifier: network(),
                operations: ops.clone(),
                metadata: Some(Metadata::from_iter([("nonce".to_owned(), json!(7))])),
                max_fee: None,
                suggested_fee_multiplier: None,
            })
            .expect("preprocess");
        let payloads = svc
            .construction_payloads(&ConstructionPayloadsRequest {
                network_identifier: network(),
                operations: ops,
                metadata: Some(preprocess.options),
            })
            .expect("payloads");
        // Sign the wrong bytes.
        let signature = signing_key.sign(b"something else entirely");
        let err = svc
            .construction_combine(&ConstructionCombineRequest {
                network_identifier: network(),
                unsigned_transaction: payloads.unsigned_transaction,
                signatures: vec![Signature {
                    signing_payload: payloads.payloads[0].clone(),
                    public_key: PublicKey {
                        hex_bytes: hex::encode(signing_key.verifying_key().as_bytes()),
                        curve_type: CURVE_EDWARDS25519.to_owned(),
                    },
                    signature_type: SIGNATURE_ED25519.to_owned(),
                    hex_bytes: hex::encode(signature.to_bytes()),
                }],
            })
            .expect_err("err");
        assert_eq!(err.code, ApiError::invalid_signature().code);
    }

    #[test]
    fn derive_maps_keys_to_base58_accounts() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::online_services(&dir, FakeNode::default());
        let signing_key = SigningKey::from_bytes(&[3u8; 32]);
        let response = svc
            .construction_derive(&ConstructionDeriveRequest {
                network_identifier: network(),
                public_key: PublicKey {
                    hex_bytes: hex::encode(signing_key.verifying_key().as_bytes()),
                    curve_type: CURVE_EDWARDS25519.to_owned(),
                },
                metadata: None,
            })
            .expect("derive");
        let expected = Address::from_ed25519_pubkey(signing_key.verifying_key().as_bytes());
        assert_eq!(response.account_identifier.address, expected.to_base58());
        assert!(response.account_identifier.sub_account.is_none());

        let with_token = svc
            .construction_derive(&ConstructionDeriveRequest {
                network_identifier: network(),
                public_key: PublicKey {
                    hex_bytes: hex::encode(signing_key.verifying_key().as_bytes()),
                    curve_type: CURVE_EDWARDS25519.to_owned(),
                },
                metadata: Some(Metadata::from_iter([(
                    "contract".to_owned(),
                    json!(testutil::TOKEN.to_hex_string()),
                )])),
            })
            .expect("derive");
        assert_eq!(
            with_token
                .account_identifier
                .sub_account
                .expect("sub")
                .address,
            testutil::TOKEN.to_hex_string()
        );

        let err = svc
            .construction_derive(&ConstructionDeriveRequest {
                network_identifier: network(),
                public_key: PublicKey {
                    hex_bytes: "abcd".into(),
                    curve_type: CURVE_EDWARDS25519.to_owned(),
                },
                metadata: None,
            })
            .expect_err("err");
        assert_eq!(err.code, ApiError::invalid_public_key().code);
    }

    #[test]
    fn metadata_requires_online_mode() {
        let dir = TempDir::new().expect("tempdir");
        let svc = testutil::offline_services(&dir);
        let err = run(svc.construction_metadata(&ConstructionMetadataRequest {
            network_identifier: network(),
            options: None,
        }))
        .expect_err("err");
        assert_eq!(err.code, ApiError::offline_mode().code);
    }
}
