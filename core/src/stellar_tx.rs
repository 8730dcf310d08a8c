//! Stellar transaction construction, hashing and signing on top of the
//! `soroban_sdk::xdr` types.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use soroban_sdk::xdr::{
    AccountFlags, AccountId, AlphaNum12, AlphaNum4, Asset, AssetCode12, AssetCode4,
    ContractExecutable, ContractIdPreimage, CreateContractArgs, DataValue, DecoratedSignature,
    Hash, HashIdPreimage, HashIdPreimageContractId, HostFunction, InvokeContractArgs,
    InvokeHostFunctionOp, Limits, ManageDataOp, Memo, MuxedAccount, Operation, OperationBody,
    PaymentOp, Preconditions, PublicKey, ReadXdr, ScAddress, ScSymbol, ScVal, SequenceNumber,
    SetOptionsOp, SetTrustLineFlagsOp, Signature, SignatureHint, SorobanAuthorizationEntry,
    SorobanTransactionData, String32, String64, StringM, TimeBounds, TimePoint, Transaction, TransactionEnvelope,
    TransactionExt, TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction,
    TransactionV1Envelope, TrustLineFlags, Uint256, VecM, WriteXdr,
};
use std::time::{SystemTime, UNIX_EPOCH};
use stellar_strkey::Strkey;
use thiserror::Error;

use crate::plan::STELLAR_AMOUNT_DECIMALS;

/// Seconds a built transaction stays valid.
const TX_VALIDITY_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum TxBuildError {
    #[error("invalid account `{0}`")]
    InvalidAccount(String),

    #[error("invalid contract id `{0}`")]
    InvalidContractId(String),

    #[error("invalid asset code `{0}`")]
    InvalidAssetCode(String),

    #[error("invalid amount `{0}`")]
    InvalidAmount(String),

    #[error("`{field}` exceeds {max} bytes")]
    TooLong { field: &'static str, max: usize },

    #[error("unsupported envelope type")]
    UnsupportedEnvelope,

    #[error("XDR error: {0}")]
    Xdr(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

fn xdr_err(e: impl std::fmt::Display) -> TxBuildError {
    TxBuildError::Xdr(e.to_string())
}

// ── Identifiers ───────────────────────────────────────────────────────────────

/// SHA-256 of the network passphrase.
pub fn network_id(passphrase: &str) -> Hash {
    Hash(Sha256::digest(passphrase.as_bytes()).into())
}

pub fn public_key_bytes(account: &str) -> Result<[u8; 32], TxBuildError> {
    match Strkey::from_string(account) {
        Ok(Strkey::PublicKeyEd25519(pk)) => Ok(pk.0),
        _ => Err(TxBuildError::InvalidAccount(account.to_string())),
    }
}

pub fn parse_account_id(account: &str) -> Result<AccountId, TxBuildError> {
    let bytes = public_key_bytes(account)?;
    Ok(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(bytes))))
}

pub fn muxed_account(account: &str) -> Result<MuxedAccount, TxBuildError> {
    Ok(MuxedAccount::Ed25519(Uint256(public_key_bytes(account)?)))
}

pub fn parse_contract_id(contract_id: &str) -> Result<[u8; 32], TxBuildError> {
    match Strkey::from_string(contract_id) {
        Ok(Strkey::Contract(contract)) => Ok(contract.0),
        _ => Err(TxBuildError::InvalidContractId(contract_id.to_string())),
    }
}

/// Address of a G… account or C… contract as an `ScAddress`.
pub fn sc_address(address: &str) -> Result<ScAddress, TxBuildError> {
    match Strkey::from_string(address) {
        Ok(Strkey::PublicKeyEd25519(pk)) => Ok(ScAddress::Account(AccountId(
            PublicKey::PublicKeyTypeEd25519(Uint256(pk.0)),
        ))),
        Ok(Strkey::Contract(c)) => Ok(ScAddress::Contract(Hash(c.0))),
        _ => Err(TxBuildError::InvalidAccount(address.to_string())),
    }
}

/// Credit asset issued by `issuer`: AlphaNum4 for codes up to four
/// characters, AlphaNum12 otherwise.
pub fn credit_asset(code: &str, issuer: &str) -> Result<Asset, TxBuildError> {
    if code.is_empty() || code.len() > 12 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TxBuildError::InvalidAssetCode(code.to_string()));
    }
    let issuer = parse_account_id(issuer)?;
    if code.len() <= 4 {
        let mut buf = [0u8; 4];
        buf[..code.len()].copy_from_slice(code.as_bytes());
        Ok(Asset::CreditAlphanum4(AlphaNum4 {
            asset_code: AssetCode4(buf),
            issuer,
        }))
    } else {
        let mut buf = [0u8; 12];
        buf[..code.len()].copy_from_slice(code.as_bytes());
        Ok(Asset::CreditAlphanum12(AlphaNum12 {
            asset_code: AssetCode12(buf),
            issuer,
        }))
    }
}

/// Convert a decimal string to stroops (7 fractional digits).
pub fn parse_amount(amount: &str) -> Result<i64, TxBuildError> {
    let invalid = || TxBuildError::InvalidAmount(amount.to_string());
    let trimmed = amount.trim();
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty()
        || fraction.len() > STELLAR_AMOUNT_DECIMALS as usize
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    let scale = 10i64.pow(STELLAR_AMOUNT_DECIMALS);
    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let fraction: i64 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{fraction:0<width$}", width = STELLAR_AMOUNT_DECIMALS as usize);
        padded.parse().map_err(|_| invalid())?
    };
    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .filter(|v| *v > 0)
        .ok_or_else(invalid)
}

/// Contract id of the Stellar Asset Contract wrapping `asset` on a network.
pub fn asset_contract_id(asset: &Asset, passphrase: &str) -> Result<String, TxBuildError> {
    let preimage = HashIdPreimage::ContractId(HashIdPreimageContractId {
        network_id: network_id(passphrase),
        contract_id_preimage: ContractIdPreimage::Asset(asset.clone()),
    });
    let bytes = preimage.to_xdr(Limits::none()).map_err(xdr_err)?;
    let digest: [u8; 32] = Sha256::digest(&bytes).into();
    Ok(Strkey::Contract(stellar_strkey::Contract(digest)).to_string())
}

// ── Operations ────────────────────────────────────────────────────────────────

fn op(body: OperationBody) -> Operation {
    Operation {
        source_account: None,
        body,
    }
}

fn empty_set_options() -> SetOptionsOp {
    SetOptionsOp {
        inflation_dest: None,
        clear_flags: None,
        set_flags: None,
        master_weight: None,
        low_threshold: None,
        med_threshold: None,
        high_threshold: None,
        home_domain: None,
        signer: None,
    }
}

pub fn set_home_domain(domain: &str) -> Result<Operation, TxBuildError> {
    let home_domain: String32 = StringM::<32>::try_from(domain)
        .map_err(|_| TxBuildError::TooLong {
            field: "homeDomain",
            max: 32,
        })?
        .into();
    Ok(op(OperationBody::SetOptions(SetOptionsOp {
        home_domain: Some(home_domain),
        ..empty_set_options()
    })))
}

/// SetOptions raising AUTH_REQUIRED and/or AUTH_REVOCABLE on the source account.
pub fn set_auth_flags(auth_required: bool, auth_revocable: bool) -> Operation {
    let mut flags = 0u32;
    if auth_required {
        flags |= AccountFlags::RequiredFlag as u32;
    }
    if auth_revocable {
        flags |= AccountFlags::RevocableFlag as u32;
    }
    op(OperationBody::SetOptions(SetOptionsOp {
        set_flags: Some(flags),
        ..empty_set_options()
    }))
}

pub fn manage_data(name: &str, value: &str) -> Result<Operation, TxBuildError> {
    let data_name: String64 = StringM::<64>::try_from(name)
        .map_err(|_| TxBuildError::TooLong {
            field: "data name",
            max: 64,
        })?
        .into();
    let data_value = value
        .as_bytes()
        .to_vec()
        .try_into()
        .map(DataValue)
        .map_err(|_| TxBuildError::TooLong {
            field: "data value",
            max: 64,
        })?;
    Ok(op(OperationBody::ManageData(ManageDataOp {
        data_name,
        data_value: Some(data_value),
    })))
}

pub fn payment(destination: &str, asset: Asset, amount: i64) -> Result<Operation, TxBuildError> {
    Ok(op(OperationBody::Payment(PaymentOp {
        destination: muxed_account(destination)?,
        asset,
        amount,
    })))
}

/// Mark `trustor`'s trustline to `asset` as authorized.
pub fn authorize_trustline(trustor: &str, asset: Asset) -> Result<Operation, TxBuildError> {
    Ok(op(OperationBody::SetTrustLineFlags(SetTrustLineFlagsOp {
        trustor: parse_account_id(trustor)?,
        asset,
        clear_flags: 0,
        set_flags: TrustLineFlags::AuthorizedFlag as u32,
    })))
}

pub fn deploy_asset_contract(asset: Asset) -> Operation {
    op(OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
        host_function: HostFunction::CreateContract(CreateContractArgs {
            contract_id_preimage: ContractIdPreimage::Asset(asset),
            executable: ContractExecutable::StellarAsset,
        }),
        auth: VecM::default(),
    }))
}

pub fn invoke_contract(
    contract_id: &str,
    method: &str,
    args: Vec<ScVal>,
) -> Result<Operation, TxBuildError> {
    let contract_address = ScAddress::Contract(Hash(parse_contract_id(contract_id)?));
    let function_name: ScSymbol = method
        .try_into()
        .map_err(|_| TxBuildError::Xdr(format!("invalid function name `{method}`")))?;
    let args = args
        .try_into()
        .map_err(|_| TxBuildError::Xdr("too many arguments".to_string()))?;
    Ok(op(OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
        host_function: HostFunction::InvokeContract(InvokeContractArgs {
            contract_address,
            function_name,
            args,
        }),
        auth: VecM::default(),
    })))
}

// ── Transactions ──────────────────────────────────────────────────────────────

/// Build a transaction for `source` using sequence `sequence` (the account's
/// next sequence number). The fee is `base_fee` per operation.
pub fn build_transaction(
    source: &str,
    sequence: i64,
    base_fee: u32,
    operations: Vec<Operation>,
) -> Result<Transaction, TxBuildError> {
    let fee = base_fee.saturating_mul(operations.len() as u32);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok(Transaction {
        source_account: muxed_account(source)?,
        fee,
        seq_num: SequenceNumber(sequence),
        cond: Preconditions::Time(TimeBounds {
            min_time: TimePoint(0),
            max_time: TimePoint(now + TX_VALIDITY_SECS),
        }),
        memo: Memo::None,
        operations: operations
            .try_into()
            .map_err(|_| TxBuildError::Xdr("too many operations".to_string()))?,
        ext: TransactionExt::V0,
    })
}

/// Attach simulation output to a Soroban transaction: resource data, the
/// resource fee on top of the inclusion fee, and authorization entries.
pub fn assemble_soroban(
    mut tx: Transaction,
    transaction_data: SorobanTransactionData,
    min_resource_fee: u64,
    auth: Vec<SorobanAuthorizationEntry>,
) -> Result<Transaction, TxBuildError> {
    let mut operations = tx.operations.to_vec();
    if let Some(Operation {
        body: OperationBody::InvokeHostFunction(invoke),
        ..
    }) = operations.first_mut()
    {
        if invoke.auth.is_empty() && !auth.is_empty() {
            invoke.auth = auth
                .try_into()
                .map_err(|_| TxBuildError::Xdr("too many auth entries".to_string()))?;
        }
    }
    tx.operations = operations
        .try_into()
        .map_err(|_| TxBuildError::Xdr("too many operations".to_string()))?;
    let resource_fee = u32::try_from(min_resource_fee).unwrap_or(u32::MAX);
    tx.fee = tx.fee.saturating_add(resource_fee);
    tx.ext = TransactionExt::V1(transaction_data);
    Ok(tx)
}

pub fn unsigned_envelope_xdr(tx: Transaction) -> Result<String, TxBuildError> {
    let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: VecM::default(),
    });
    let bytes = envelope.to_xdr(Limits::none()).map_err(xdr_err)?;
    Ok(BASE64.encode(bytes))
}

pub fn decode_envelope(envelope_xdr: &str) -> Result<TransactionV1Envelope, TxBuildError> {
    let bytes = BASE64.decode(envelope_xdr.trim())?;
    match TransactionEnvelope::from_xdr(&bytes, Limits::none()).map_err(xdr_err)? {
        TransactionEnvelope::Tx(envelope) => Ok(envelope),
        _ => Err(TxBuildError::UnsupportedEnvelope),
    }
}

/// Hash signed by every signer: SHA-256 of the signature payload
/// (network id, envelope type, transaction).
pub fn transaction_hash(tx: &Transaction, passphrase: &str) -> Result<[u8; 32], TxBuildError> {
    let payload = TransactionSignaturePayload {
        network_id: network_id(passphrase),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };
    let bytes = payload.to_xdr(Limits::none()).map_err(xdr_err)?;
    Ok(Sha256::digest(&bytes).into())
}

/// Sign a base64 envelope and return it with the decorated signature appended.
pub fn sign_envelope(
    envelope_xdr: &str,
    passphrase: &str,
    key: &SigningKey,
) -> Result<String, TxBuildError> {
    let mut envelope = decode_envelope(envelope_xdr)?;
    let hash = transaction_hash(&envelope.tx, passphrase)?;
    let signature = key.sign(&hash);

    let public = key.verifying_key().to_bytes();
    let mut hint = [0u8; 4];
    hint.copy_from_slice(&public[28..]);

    let decorated = DecoratedSignature {
        hint: SignatureHint(hint),
        signature: Signature(
            signature
                .to_bytes()
                .to_vec()
                .try_into()
                .map_err(|_| TxBuildError::Xdr("signature too long".to_string()))?,
        ),
    };
    let mut signatures = envelope.signatures.to_vec();
    signatures.push(decorated);
    envelope.signatures = signatures
        .try_into()
        .map_err(|_| TxBuildError::Xdr("too many signatures".to_string()))?;

    let bytes = TransactionEnvelope::Tx(envelope)
        .to_xdr(Limits::none())
        .map_err(xdr_err)?;
    Ok(BASE64.encode(bytes))
}

// ── stellar.toml ──────────────────────────────────────────────────────────────

pub struct TomlInfo<'a> {
    pub asset_code: &'a str,
    pub issuer: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub property_uri: Option<&'a str>,
}

/// `https://<domain>/.well-known/stellar.toml`
pub fn toml_url(home_domain: &str) -> String {
    format!("https://{home_domain}/.well-known/stellar.toml")
}

/// SEP-1 document describing the issued asset.
pub fn stellar_toml(info: &TomlInfo<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Stellar TOML for {}\n", info.asset_code));
    out.push_str("VERSION=\"2.0.0\"\n");
    out.push_str(&format!("ACCOUNTS=[\"{}\"]\n\n", info.issuer));
    out.push_str("[[CURRENCIES]]\n");
    out.push_str(&format!("code=\"{}\"\n", info.asset_code));
    out.push_str(&format!("issuer=\"{}\"\n", info.issuer));
    out.push_str(&format!("display_decimals={STELLAR_AMOUNT_DECIMALS}\n"));
    out.push_str(&format!("name=\"{}\"\n", toml_escape(info.name)));
    if let Some(desc) = info.description {
        out.push_str(&format!("desc=\"{}\"\n", toml_escape(desc)));
    }
    if let Some(uri) = info.property_uri {
        out.push_str(&format!("attestation_of_reserve=\"{}\"\n", toml_escape(uri)));
    }
    out.push_str("is_asset_anchored=true\n");
    out.push_str("anchor_asset_type=\"realestate\"\n");
    out
}

fn toml_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Verifier, VerifyingKey};

    const TESTNET: &str = "Test SDF Network ; September 2015";
    const CONTRACT: &str = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC";

    fn key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn address(key: &SigningKey) -> String {
        Strkey::PublicKeyEd25519(stellar_strkey::ed25519::PublicKey(
            key.verifying_key().to_bytes(),
        ))
        .to_string()
    }

    #[test]
    fn test_network_id_is_sha256_of_passphrase() {
        let id = network_id(TESTNET);
        assert_eq!(
            hex::encode(id.0),
            "cee0302d59844d32bdca915c8203dd44b33fbb7edc19051ea37abedf28ecd472"
        );
    }

    #[test]
    fn test_credit_asset_width() {
        let issuer = address(&key());
        assert!(matches!(
            credit_asset("ABC", &issuer).unwrap(),
            Asset::CreditAlphanum4(_)
        ));
        assert!(matches!(
            credit_asset("PROPERTY01", &issuer).unwrap(),
            Asset::CreditAlphanum12(_)
        ));
        assert!(credit_asset("TOO-LONG", &issuer).is_err());
        assert!(credit_asset("ABC", "GBAD").is_err());
    }

    #[test]
    fn test_parse_amount_scales_to_stroops() {
        assert_eq!(parse_amount("1").unwrap(), 10_000_000);
        assert_eq!(parse_amount("1000000").unwrap(), 10_000_000_000_000);
        assert_eq!(parse_amount("0.5").unwrap(), 5_000_000);
        assert_eq!(parse_amount("0.0000001").unwrap(), 1);
        assert!(parse_amount("0.00000001").is_err());
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_build_transaction_fee_per_operation() {
        let source = address(&key());
        let tx = build_transaction(
            &source,
            42,
            100,
            vec![set_auth_flags(true, true), manage_data("asset_code", "ABC").unwrap()],
        )
        .unwrap();
        assert_eq!(tx.fee, 200);
        assert_eq!(tx.seq_num, SequenceNumber(42));
        assert_eq!(tx.operations.len(), 2);
    }

    #[test]
    fn test_set_auth_flags_combines_bits() {
        match set_auth_flags(true, true).body {
            OperationBody::SetOptions(opts) => assert_eq!(opts.set_flags, Some(3)),
            other => panic!("unexpected body {other:?}"),
        }
        match set_auth_flags(false, true).body {
            OperationBody::SetOptions(opts) => assert_eq!(opts.set_flags, Some(2)),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_manage_data_rejects_long_values() {
        assert!(manage_data("property_uri", &"x".repeat(65)).is_err());
        assert!(manage_data("property_uri", &"x".repeat(64)).is_ok());
    }

    #[test]
    fn test_home_domain_limit() {
        assert!(set_home_domain("example.com").is_ok());
        assert!(set_home_domain(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_sign_envelope_appends_verifiable_signature() {
        let key = key();
        let source = address(&key);
        let tx = build_transaction(&source, 1, 100, vec![set_auth_flags(true, false)]).unwrap();
        let unsigned = unsigned_envelope_xdr(tx.clone()).unwrap();

        let signed = sign_envelope(&unsigned, TESTNET, &key).unwrap();
        let envelope = decode_envelope(&signed).unwrap();
        assert_eq!(envelope.signatures.len(), 1);

        let decorated = &envelope.signatures[0];
        let public = key.verifying_key().to_bytes();
        assert_eq!(&decorated.hint.0[..], &public[28..32]);

        let hash = transaction_hash(&tx, TESTNET).unwrap();
        let sig_bytes: [u8; 64] = decorated.signature.0.to_vec().try_into().unwrap();
        let verifying = VerifyingKey::from_bytes(&public).unwrap();
        assert!(verifying
            .verify(&hash, &ed25519_dalek::Signature::from_bytes(&sig_bytes))
            .is_ok());
    }

    #[test]
    fn test_hash_depends_on_network() {
        let source = address(&key());
        let tx = build_transaction(&source, 1, 100, vec![set_auth_flags(true, false)]).unwrap();
        assert_ne!(
            transaction_hash(&tx, TESTNET).unwrap(),
            transaction_hash(&tx, "Public Global Stellar Network ; September 2015").unwrap()
        );
    }

    #[test]
    fn test_decode_envelope_rejects_garbage() {
        assert!(matches!(
            decode_envelope("not-base64!!"),
            Err(TxBuildError::Base64(_))
        ));
        assert!(matches!(
            decode_envelope("SGVsbG8gV29ybGQ="),
            Err(TxBuildError::Xdr(_))
        ));
    }

    #[test]
    fn test_asset_contract_id_is_contract_strkey() {
        let asset = credit_asset("ABC", &address(&key())).unwrap();
        let id = asset_contract_id(&asset, TESTNET).unwrap();
        assert!(id.starts_with('C'));
        assert!(parse_contract_id(&id).is_ok());
        assert_ne!(
            id,
            asset_contract_id(&asset, "Public Global Stellar Network ; September 2015").unwrap()
        );
    }

    #[test]
    fn test_invoke_contract_operation() {
        let op = invoke_contract(CONTRACT, "hello", vec![ScVal::Bool(true)]).unwrap();
        match op.body {
            OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                host_function: HostFunction::InvokeContract(args),
                ..
            }) => {
                assert_eq!(args.function_name, ScSymbol::try_from("hello").unwrap());
                assert_eq!(args.args.len(), 1);
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert!(invoke_contract("GBAD", "hello", vec![]).is_err());
    }

    #[test]
    fn test_stellar_toml_contents() {
        let toml = stellar_toml(&TomlInfo {
            asset_code: "ABC",
            issuer: "GISSUER",
            name: "Main \"Street\"",
            description: Some("Fractional ownership"),
            property_uri: None,
        });
        assert!(toml.contains("[[CURRENCIES]]"));
        assert!(toml.contains("code=\"ABC\""));
        assert!(toml.contains("issuer=\"GISSUER\""));
        assert!(toml.contains("display_decimals=7"));
        assert!(toml.contains("name=\"Main \\\"Street\\\"\""));
        assert!(toml.contains("desc=\"Fractional ownership\""));
        assert_eq!(
            toml_url("example.com"),
            "https://example.com/.well-known/stellar.toml"
        );
    }
}
