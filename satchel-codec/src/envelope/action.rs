//! Envelopes for the action lifecycle: create, sign, abort,
//! internalize, relinquish.

use super::SendWithResult;
use crate::{Error, FromWire, Reader, ToWire, Writer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An input the caller wants spent by the new action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInput {
    /// `"txid.vout"` reference to the output being spent.
    pub outpoint: String,
    pub input_description: String,
    /// Hex unlocking script, when the caller signs out of band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocking_script: Option<String>,
    /// Expected unlocking script length, for fee estimation when the
    /// script itself arrives later via `signAction`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocking_script_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u32>,
}

impl ToWire for ActionInput {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.outpoint);
        w.put_string(&self.input_description);
        w.put_option(&self.unlocking_script);
        w.put_option(&self.unlocking_script_length);
        w.put_option(&self.sequence_number);
    }
}

impl FromWire for ActionInput {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(ActionInput {
            outpoint: r.get_string()?,
            input_description: r.get_string()?,
            unlocking_script: r.get_option()?,
            unlocking_script_length: r.get_option()?,
            sequence_number: r.get_option()?,
        })
    }
}

/// An output the new action must create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutput {
    /// Hex locking script.
    pub locking_script: String,
    pub satoshis: u64,
    pub output_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ToWire for ActionOutput {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.locking_script);
        w.put_u64(self.satoshis);
        w.put_string(&self.output_description);
        w.put_option(&self.basket);
        w.put_option(&self.custom_instructions);
        w.put_option_with(self.tags.is_some(), |w| {
            w.put_seq(self.tags.as_deref().unwrap_or_default())
        });
    }
}

impl FromWire for ActionOutput {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(ActionOutput {
            locking_script: r.get_string()?,
            satoshis: r.get_u64()?,
            output_description: r.get_string()?,
            basket: r.get_option()?,
            custom_instructions: r.get_option()?,
            tags: r.get_option_with(|r| r.get_seq())?,
        })
    }
}

/// Flags modifying how the action is processed after signing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_and_process: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_delayed_broadcast: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_send: Option<bool>,
    /// References of previously created `nosend` actions to broadcast
    /// together with this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_with: Option<Vec<String>>,
}

impl ToWire for CreateActionOptions {
    fn to_wire(&self, w: &mut Writer) {
        w.put_option(&self.sign_and_process);
        w.put_option(&self.accept_delayed_broadcast);
        w.put_option(&self.no_send);
        w.put_option_with(self.send_with.is_some(), |w| {
            w.put_seq(self.send_with.as_deref().unwrap_or_default())
        });
    }
}

impl FromWire for CreateActionOptions {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(CreateActionOptions {
            sign_and_process: r.get_option()?,
            accept_delayed_broadcast: r.get_option()?,
            no_send: r.get_option()?,
            send_with: r.get_option_with(|r| r.get_seq())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionArgs {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ActionInput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<ActionOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<CreateActionOptions>,
}

impl ToWire for CreateActionArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.description);
        w.put_seq(&self.inputs);
        w.put_seq(&self.outputs);
        w.put_option(&self.version);
        w.put_option(&self.lock_time);
        w.put_seq(&self.labels);
        w.put_option(&self.options);
    }
}

impl FromWire for CreateActionArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(CreateActionArgs {
            description: r.get_string()?,
            inputs: r.get_seq()?,
            outputs: r.get_seq()?,
            version: r.get_option()?,
            lock_time: r.get_option()?,
            labels: r.get_seq()?,
            options: r.get_option()?,
        })
    }
}

/// Partial signing material handed back when the caller must provide
/// unlocking scripts through `signAction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignableTransaction {
    /// AtomicBEEF of the draft transaction.
    pub tx: Vec<u8>,
    pub reference: String,
}

impl ToWire for SignableTransaction {
    fn to_wire(&self, w: &mut Writer) {
        w.put_var_bytes(&self.tx);
        w.put_string(&self.reference);
    }
}

impl FromWire for SignableTransaction {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(SignableTransaction {
            tx: r.get_var_bytes()?,
            reference: r.get_string()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    /// AtomicBEEF of the final transaction, when signed internally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<Vec<u8>>,
    /// Outpoints of change withheld from broadcast on `noSend` actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_send_change: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_with_results: Option<Vec<SendWithResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signable_transaction: Option<SignableTransaction>,
}

impl ToWire for CreateActionResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_option(&self.txid);
        w.put_option(&self.tx);
        w.put_option_with(self.no_send_change.is_some(), |w| {
            w.put_seq(self.no_send_change.as_deref().unwrap_or_default())
        });
        w.put_option_with(self.send_with_results.is_some(), |w| {
            w.put_seq(self.send_with_results.as_deref().unwrap_or_default())
        });
        w.put_option(&self.signable_transaction);
    }
}

impl FromWire for CreateActionResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(CreateActionResult {
            txid: r.get_option()?,
            tx: r.get_option()?,
            no_send_change: r.get_option_with(|r| r.get_seq())?,
            send_with_results: r.get_option_with(|r| r.get_seq())?,
            signable_transaction: r.get_option()?,
        })
    }
}

/// Unlocking script supplied for one input of a signable transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignActionSpend {
    /// Hex unlocking script.
    pub unlocking_script: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u32>,
}

impl ToWire for SignActionSpend {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.unlocking_script);
        w.put_option(&self.sequence_number);
    }
}

impl FromWire for SignActionSpend {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(SignActionSpend {
            unlocking_script: r.get_string()?,
            sequence_number: r.get_option()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignActionArgs {
    /// Input index → spend, ordered for deterministic encoding.
    pub spends: BTreeMap<u32, SignActionSpend>,
    pub reference: String,
}

impl ToWire for SignActionArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_varint(self.spends.len() as u64);
        for (vin, spend) in &self.spends {
            w.put_u32(*vin);
            spend.to_wire(w);
        }
        w.put_string(&self.reference);
    }
}

impl FromWire for SignActionArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        let n = r.get_varint()?;
        let mut spends = BTreeMap::new();
        for _ in 0..n {
            let vin = r.get_u32()?;
            spends.insert(vin, SignActionSpend::from_wire(r)?);
        }
        Ok(SignActionArgs {
            spends,
            reference: r.get_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignActionResult {
    pub txid: String,
    /// AtomicBEEF of the signed transaction.
    pub tx: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_with_results: Option<Vec<SendWithResult>>,
}

impl ToWire for SignActionResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.txid);
        w.put_var_bytes(&self.tx);
        w.put_option_with(self.send_with_results.is_some(), |w| {
            w.put_seq(self.send_with_results.as_deref().unwrap_or_default())
        });
    }
}

impl FromWire for SignActionResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(SignActionResult {
            txid: r.get_string()?,
            tx: r.get_var_bytes()?,
            send_with_results: r.get_option_with(|r| r.get_seq())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortActionArgs {
    pub reference: String,
}

impl ToWire for AbortActionArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.reference);
    }
}

impl FromWire for AbortActionArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(AbortActionArgs {
            reference: r.get_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortActionResult {
    pub aborted: bool,
}

impl ToWire for AbortActionResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_bool(self.aborted);
    }
}

impl FromWire for AbortActionResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(AbortActionResult {
            aborted: r.get_bool()?,
        })
    }
}

/// How an internalized output becomes wallet property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InternalizeProtocol {
    #[serde(rename = "wallet payment")]
    WalletPayment,
    #[serde(rename = "basket insertion")]
    BasketInsertion,
}

impl ToWire for InternalizeProtocol {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u8(match self {
            InternalizeProtocol::WalletPayment => 0,
            InternalizeProtocol::BasketInsertion => 1,
        });
    }
}

impl FromWire for InternalizeProtocol {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        match r.get_u8()? {
            0 => Ok(InternalizeProtocol::WalletPayment),
            1 => Ok(InternalizeProtocol::BasketInsertion),
            value => Err(Error::InvalidDiscriminant {
                what: "internalize protocol",
                value,
            }),
        }
    }
}

/// BRC-29 derivation context for a `wallet payment` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRemittance {
    pub derivation_prefix: String,
    pub derivation_suffix: String,
    /// Compressed hex public key of the sender.
    pub sender_identity_key: String,
}

impl ToWire for PaymentRemittance {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.derivation_prefix);
        w.put_string(&self.derivation_suffix);
        w.put_string(&self.sender_identity_key);
    }
}

impl FromWire for PaymentRemittance {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(PaymentRemittance {
            derivation_prefix: r.get_string()?,
            derivation_suffix: r.get_string()?,
            sender_identity_key: r.get_string()?,
        })
    }
}

/// Basket placement for a `basket insertion` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertionRemittance {
    pub basket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ToWire for InsertionRemittance {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.basket);
        w.put_option(&self.custom_instructions);
        w.put_seq(&self.tags);
    }
}

impl FromWire for InsertionRemittance {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(InsertionRemittance {
            basket: r.get_string()?,
            custom_instructions: r.get_option()?,
            tags: r.get_seq()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalizeOutput {
    pub output_index: u32,
    pub protocol: InternalizeProtocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_remittance: Option<PaymentRemittance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insertion_remittance: Option<InsertionRemittance>,
}

impl ToWire for InternalizeOutput {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u32(self.output_index);
        self.protocol.to_wire(w);
        w.put_option(&self.payment_remittance);
        w.put_option(&self.insertion_remittance);
    }
}

impl FromWire for InternalizeOutput {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(InternalizeOutput {
            output_index: r.get_u32()?,
            protocol: InternalizeProtocol::from_wire(r)?,
            payment_remittance: r.get_option()?,
            insertion_remittance: r.get_option()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalizeActionArgs {
    /// AtomicBEEF of the externally produced transaction.
    pub tx: Vec<u8>,
    pub outputs: Vec<InternalizeOutput>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl ToWire for InternalizeActionArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_var_bytes(&self.tx);
        w.put_seq(&self.outputs);
        w.put_string(&self.description);
        w.put_seq(&self.labels);
    }
}

impl FromWire for InternalizeActionArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(InternalizeActionArgs {
            tx: r.get_var_bytes()?,
            outputs: r.get_seq()?,
            description: r.get_string()?,
            labels: r.get_seq()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalizeActionResult {
    pub accepted: bool,
}

impl ToWire for InternalizeActionResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_bool(self.accepted);
    }
}

impl FromWire for InternalizeActionResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(InternalizeActionResult {
            accepted: r.get_bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelinquishOutputArgs {
    pub basket: String,
    /// `"txid.vout"` reference.
    pub output: String,
}

impl ToWire for RelinquishOutputArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.basket);
        w.put_string(&self.output);
    }
}

impl FromWire for RelinquishOutputArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(RelinquishOutputArgs {
            basket: r.get_string()?,
            output: r.get_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelinquishOutputResult {
    pub relinquished: bool,
}

impl ToWire for RelinquishOutputResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_bool(self.relinquished);
    }
}

impl FromWire for RelinquishOutputResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(RelinquishOutputResult {
            relinquished: r.get_bool()?,
        })
    }
}
