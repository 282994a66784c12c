//! Envelopes for certificate custody and identity discovery.
//!
//! The detailed upstream contracts for these methods remain in flux;
//! the shapes here cover storage-backed custody: prove, relinquish and
//! the two discovery filters.

use crate::{Error, FromWire, Reader, ToWire, Writer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A certificate held by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEntry {
    #[serde(rename = "type")]
    pub certificate_type: String,
    pub serial_number: String,
    /// Compressed hex public key of the subject.
    pub subject: String,
    /// Compressed hex public key of the certifier.
    pub certifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation_outpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub fields: BTreeMap<String, String>,
}

fn put_string_map(w: &mut Writer, map: &BTreeMap<String, String>) {
    w.put_varint(map.len() as u64);
    for (k, v) in map {
        w.put_string(k);
        w.put_string(v);
    }
}

fn get_string_map(r: &mut Reader) -> Result<BTreeMap<String, String>, Error> {
    let n = r.get_varint()?;
    let mut map = BTreeMap::new();
    for _ in 0..n {
        let k = r.get_string()?;
        let v = r.get_string()?;
        map.insert(k, v);
    }
    Ok(map)
}

impl ToWire for CertificateEntry {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.certificate_type);
        w.put_string(&self.serial_number);
        w.put_string(&self.subject);
        w.put_string(&self.certifier);
        w.put_option(&self.revocation_outpoint);
        w.put_option(&self.signature);
        put_string_map(w, &self.fields);
    }
}

impl FromWire for CertificateEntry {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(CertificateEntry {
            certificate_type: r.get_string()?,
            serial_number: r.get_string()?,
            subject: r.get_string()?,
            certifier: r.get_string()?,
            revocation_outpoint: r.get_option()?,
            signature: r.get_option()?,
            fields: get_string_map(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveCertificateArgs {
    #[serde(rename = "type")]
    pub certificate_type: String,
    pub serial_number: String,
    pub certifier: String,
    pub fields_to_reveal: Vec<String>,
    /// Compressed hex public key the keyring is encrypted to.
    pub verifier: String,
}

impl ToWire for ProveCertificateArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.certificate_type);
        w.put_string(&self.serial_number);
        w.put_string(&self.certifier);
        w.put_seq(&self.fields_to_reveal);
        w.put_string(&self.verifier);
    }
}

impl FromWire for ProveCertificateArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(ProveCertificateArgs {
            certificate_type: r.get_string()?,
            serial_number: r.get_string()?,
            certifier: r.get_string()?,
            fields_to_reveal: r.get_seq()?,
            verifier: r.get_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveCertificateResult {
    /// Field name → hex ciphertext of the field value, readable only by
    /// the verifier.
    pub keyring_for_verifier: BTreeMap<String, String>,
}

impl ToWire for ProveCertificateResult {
    fn to_wire(&self, w: &mut Writer) {
        put_string_map(w, &self.keyring_for_verifier);
    }
}

impl FromWire for ProveCertificateResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(ProveCertificateResult {
            keyring_for_verifier: get_string_map(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelinquishCertificateArgs {
    #[serde(rename = "type")]
    pub certificate_type: String,
    pub serial_number: String,
    pub certifier: String,
}

impl ToWire for RelinquishCertificateArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.certificate_type);
        w.put_string(&self.serial_number);
        w.put_string(&self.certifier);
    }
}

impl FromWire for RelinquishCertificateArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(RelinquishCertificateArgs {
            certificate_type: r.get_string()?,
            serial_number: r.get_string()?,
            certifier: r.get_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelinquishCertificateResult {
    pub relinquished: bool,
}

impl ToWire for RelinquishCertificateResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_bool(self.relinquished);
    }
}

impl FromWire for RelinquishCertificateResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(RelinquishCertificateResult {
            relinquished: r.get_bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverByIdentityKeyArgs {
    pub identity_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ToWire for DiscoverByIdentityKeyArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.identity_key);
        w.put_option(&self.limit);
        w.put_option(&self.offset);
    }
}

impl FromWire for DiscoverByIdentityKeyArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(DiscoverByIdentityKeyArgs {
            identity_key: r.get_string()?,
            limit: r.get_option()?,
            offset: r.get_option()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverByAttributesArgs {
    pub attributes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ToWire for DiscoverByAttributesArgs {
    fn to_wire(&self, w: &mut Writer) {
        put_string_map(w, &self.attributes);
        w.put_option(&self.limit);
        w.put_option(&self.offset);
    }
}

impl FromWire for DiscoverByAttributesArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(DiscoverByAttributesArgs {
            attributes: get_string_map(r)?,
            limit: r.get_option()?,
            offset: r.get_option()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverCertificatesResult {
    pub total_certificates: u32,
    pub certificates: Vec<CertificateEntry>,
}

impl ToWire for DiscoverCertificatesResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u32(self.total_certificates);
        w.put_seq(&self.certificates);
    }
}

impl FromWire for DiscoverCertificatesResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(DiscoverCertificatesResult {
            total_certificates: r.get_u32()?,
            certificates: r.get_seq()?,
        })
    }
}
