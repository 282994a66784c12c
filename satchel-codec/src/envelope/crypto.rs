//! Envelopes for the cryptographic method set: encrypt/decrypt, HMAC,
//! signatures, public-key queries and key-linkage disclosure.

use super::{Counterparty, ProtocolId};
use crate::{Error, FromWire, Reader, ToWire, Writer};
use serde::{Deserialize, Serialize};

/// Derivation context shared by every keyed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyContext {
    #[serde(rename = "protocolID")]
    pub protocol_id: ProtocolId,
    #[serde(rename = "keyID")]
    pub key_id: String,
    pub counterparty: Counterparty,
}

impl ToWire for KeyContext {
    fn to_wire(&self, w: &mut Writer) {
        self.protocol_id.to_wire(w);
        w.put_string(&self.key_id);
        self.counterparty.to_wire(w);
    }
}

impl FromWire for KeyContext {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(KeyContext {
            protocol_id: ProtocolId::from_wire(r)?,
            key_id: r.get_string()?,
            counterparty: Counterparty::from_wire(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptArgs {
    pub plaintext: Vec<u8>,
    #[serde(flatten)]
    pub context: KeyContext,
}

impl ToWire for EncryptArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_var_bytes(&self.plaintext);
        self.context.to_wire(w);
    }
}

impl FromWire for EncryptArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(EncryptArgs {
            plaintext: r.get_var_bytes()?,
            context: KeyContext::from_wire(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptResult {
    pub ciphertext: Vec<u8>,
}

impl ToWire for EncryptResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_var_bytes(&self.ciphertext);
    }
}

impl FromWire for EncryptResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(EncryptResult {
            ciphertext: r.get_var_bytes()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptArgs {
    pub ciphertext: Vec<u8>,
    #[serde(flatten)]
    pub context: KeyContext,
}

impl ToWire for DecryptArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_var_bytes(&self.ciphertext);
        self.context.to_wire(w);
    }
}

impl FromWire for DecryptArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(DecryptArgs {
            ciphertext: r.get_var_bytes()?,
            context: KeyContext::from_wire(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptResult {
    pub plaintext: Vec<u8>,
}

impl ToWire for DecryptResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_var_bytes(&self.plaintext);
    }
}

impl FromWire for DecryptResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(DecryptResult {
            plaintext: r.get_var_bytes()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHmacArgs {
    pub data: Vec<u8>,
    #[serde(flatten)]
    pub context: KeyContext,
}

impl ToWire for CreateHmacArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_var_bytes(&self.data);
        self.context.to_wire(w);
    }
}

impl FromWire for CreateHmacArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(CreateHmacArgs {
            data: r.get_var_bytes()?,
            context: KeyContext::from_wire(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHmacResult {
    pub hmac: Vec<u8>,
}

impl ToWire for CreateHmacResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_var_bytes(&self.hmac);
    }
}

impl FromWire for CreateHmacResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(CreateHmacResult {
            hmac: r.get_var_bytes()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyHmacArgs {
    pub data: Vec<u8>,
    pub hmac: Vec<u8>,
    #[serde(flatten)]
    pub context: KeyContext,
}

impl ToWire for VerifyHmacArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_var_bytes(&self.data);
        w.put_var_bytes(&self.hmac);
        self.context.to_wire(w);
    }
}

impl FromWire for VerifyHmacArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(VerifyHmacArgs {
            data: r.get_var_bytes()?,
            hmac: r.get_var_bytes()?,
            context: KeyContext::from_wire(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub valid: bool,
}

impl ToWire for VerifyResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_bool(self.valid);
    }
}

impl FromWire for VerifyResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(VerifyResult {
            valid: r.get_bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSignatureArgs {
    /// Data to hash (SHA-256) and sign. Exactly one of `data` and
    /// `hash_to_directly_sign` must be present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_to_directly_sign: Option<Vec<u8>>,
    #[serde(flatten)]
    pub context: KeyContext,
}

impl ToWire for CreateSignatureArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_option(&self.data);
        w.put_option(&self.hash_to_directly_sign);
        self.context.to_wire(w);
    }
}

impl FromWire for CreateSignatureArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(CreateSignatureArgs {
            data: r.get_option()?,
            hash_to_directly_sign: r.get_option()?,
            context: KeyContext::from_wire(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSignatureResult {
    /// DER-encoded ECDSA signature.
    pub signature: Vec<u8>,
}

impl ToWire for CreateSignatureResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_var_bytes(&self.signature);
    }
}

impl FromWire for CreateSignatureResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(CreateSignatureResult {
            signature: r.get_var_bytes()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySignatureArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_to_directly_verify: Option<Vec<u8>>,
    pub signature: Vec<u8>,
    /// Verify against a key derived for the wallet itself rather than
    /// the counterparty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_self: Option<bool>,
    #[serde(flatten)]
    pub context: KeyContext,
}

impl ToWire for VerifySignatureArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_option(&self.data);
        w.put_option(&self.hash_to_directly_verify);
        w.put_var_bytes(&self.signature);
        w.put_option(&self.for_self);
        self.context.to_wire(w);
    }
}

impl FromWire for VerifySignatureArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(VerifySignatureArgs {
            data: r.get_option()?,
            hash_to_directly_verify: r.get_option()?,
            signature: r.get_var_bytes()?,
            for_self: r.get_option()?,
            context: KeyContext::from_wire(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPublicKeyArgs {
    /// When true, return the wallet's identity key and ignore the rest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_key: Option<bool>,
    #[serde(rename = "protocolID", skip_serializing_if = "Option::is_none")]
    pub protocol_id: Option<ProtocolId>,
    #[serde(rename = "keyID", skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Counterparty>,
    /// Derive the wallet's own child key instead of the counterparty's.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_self: Option<bool>,
}

impl ToWire for GetPublicKeyArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_option(&self.identity_key);
        w.put_option(&self.protocol_id);
        w.put_option(&self.key_id);
        w.put_option(&self.counterparty);
        w.put_option(&self.for_self);
    }
}

impl FromWire for GetPublicKeyArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(GetPublicKeyArgs {
            identity_key: r.get_option()?,
            protocol_id: r.get_option()?,
            key_id: r.get_option()?,
            counterparty: r.get_option()?,
            for_self: r.get_option()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPublicKeyResult {
    /// Compressed hex public key.
    pub public_key: String,
}

impl ToWire for GetPublicKeyResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.public_key);
    }
}

impl FromWire for GetPublicKeyResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(GetPublicKeyResult {
            public_key: r.get_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealCounterpartyKeyLinkageArgs {
    /// Compressed hex public key whose relationship is disclosed.
    pub counterparty: String,
    /// Compressed hex public key of the party receiving the revelation.
    pub verifier: String,
}

impl ToWire for RevealCounterpartyKeyLinkageArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.counterparty);
        w.put_string(&self.verifier);
    }
}

impl FromWire for RevealCounterpartyKeyLinkageArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(RevealCounterpartyKeyLinkageArgs {
            counterparty: r.get_string()?,
            verifier: r.get_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealSpecificKeyLinkageArgs {
    pub counterparty: Counterparty,
    pub verifier: String,
    #[serde(rename = "protocolID")]
    pub protocol_id: ProtocolId,
    #[serde(rename = "keyID")]
    pub key_id: String,
}

impl ToWire for RevealSpecificKeyLinkageArgs {
    fn to_wire(&self, w: &mut Writer) {
        self.counterparty.to_wire(w);
        w.put_string(&self.verifier);
        self.protocol_id.to_wire(w);
        w.put_string(&self.key_id);
    }
}

impl FromWire for RevealSpecificKeyLinkageArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(RevealSpecificKeyLinkageArgs {
            counterparty: Counterparty::from_wire(r)?,
            verifier: r.get_string()?,
            protocol_id: ProtocolId::from_wire(r)?,
            key_id: r.get_string()?,
        })
    }
}

/// Linkage disclosure, encrypted so only the named verifier can read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyLinkageResult {
    pub prover: String,
    pub verifier: String,
    pub counterparty: String,
    /// ISO-8601 timestamp the disclosure was produced at.
    pub revelation_time: String,
    pub encrypted_linkage: Vec<u8>,
    pub encrypted_linkage_proof: Vec<u8>,
    /// Present only for specific-key revelations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_type: Option<u32>,
}

impl ToWire for KeyLinkageResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.prover);
        w.put_string(&self.verifier);
        w.put_string(&self.counterparty);
        w.put_string(&self.revelation_time);
        w.put_var_bytes(&self.encrypted_linkage);
        w.put_var_bytes(&self.encrypted_linkage_proof);
        w.put_option(&self.proof_type);
    }
}

impl FromWire for KeyLinkageResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(KeyLinkageResult {
            prover: r.get_string()?,
            verifier: r.get_string()?,
            counterparty: r.get_string()?,
            revelation_time: r.get_string()?,
            encrypted_linkage: r.get_var_bytes()?,
            encrypted_linkage_proof: r.get_var_bytes()?,
            proof_type: r.get_option()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::SecurityLevel;
    use crate::{from_bytes, to_bytes};

    fn context() -> KeyContext {
        KeyContext {
            protocol_id: ProtocolId::new(SecurityLevel::Counterparty, "ctx"),
            key_id: "default".into(),
            counterparty: Counterparty::Myself,
        }
    }

    #[test]
    fn encrypt_args_round_trip() {
        let args = EncryptArgs {
            plaintext: b"secret message".to_vec(),
            context: context(),
        };
        assert_eq!(from_bytes::<EncryptArgs>(&to_bytes(&args)).unwrap(), args);
    }

    #[test]
    fn encrypt_args_json_shape() {
        let args = EncryptArgs {
            plaintext: vec![1, 2],
            context: context(),
        };
        let v = serde_json::to_value(&args).unwrap();
        assert_eq!(v["protocolID"], serde_json::json!([2, "ctx"]));
        assert_eq!(v["keyID"], "default");
        assert_eq!(v["counterparty"], "self");
        assert_eq!(v["plaintext"], serde_json::json!([1, 2]));
    }

    #[test]
    fn signature_args_round_trip() {
        let args = CreateSignatureArgs {
            data: Some(b"payload".to_vec()),
            hash_to_directly_sign: None,
            context: context(),
        };
        assert_eq!(
            from_bytes::<CreateSignatureArgs>(&to_bytes(&args)).unwrap(),
            args
        );
    }
}
