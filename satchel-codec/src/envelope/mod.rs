//! Typed request/response envelopes for every BRC-100 method.
//!
//! The structs here are the canonical form the wallet operates on: the
//! JSON surface is derived through serde (camelCase field names) and the
//! binary surface through [`ToWire`]/[`FromWire`]. Round-tripping an
//! envelope through either surface yields an equal value.

mod action;
mod certs;
mod crypto;
mod info;
mod list;

pub use action::*;
pub use certs::*;
pub use crypto::*;
pub use info::*;
pub use list::*;

use crate::{Error, FromWire, Reader, ToWire, Writer};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// BRC-43 protocol security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SecurityLevel {
    /// No counterparty binding; anyone can derive.
    Silent = 0,
    /// Bound to the protocol only.
    App = 1,
    /// Bound to protocol and counterparty.
    Counterparty = 2,
}

impl TryFrom<u8> for SecurityLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(SecurityLevel::Silent),
            1 => Ok(SecurityLevel::App),
            2 => Ok(SecurityLevel::Counterparty),
            value => Err(Error::InvalidDiscriminant {
                what: "security level",
                value,
            }),
        }
    }
}

/// `(securityLevel, protocolName)` pair identifying a derivation protocol.
///
/// Rendered in JSON as the two-element array the interface uses, e.g.
/// `[2, "ctx"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolId {
    pub security_level: SecurityLevel,
    pub name: String,
}

impl ProtocolId {
    pub fn new(security_level: SecurityLevel, name: impl Into<String>) -> Self {
        Self {
            security_level,
            name: name.into(),
        }
    }
}

impl Serialize for ProtocolId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.security_level as u8, &self.name).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ProtocolId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (level, name): (u8, String) = Deserialize::deserialize(deserializer)?;
        let security_level = SecurityLevel::try_from(level)
            .map_err(|_| D::Error::custom("security level must be 0, 1 or 2"))?;
        Ok(ProtocolId {
            security_level,
            name,
        })
    }
}

impl ToWire for ProtocolId {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u8(self.security_level as u8);
        w.put_string(&self.name);
    }
}

impl FromWire for ProtocolId {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        let security_level = SecurityLevel::try_from(r.get_u8()?)?;
        let name = r.get_string()?;
        Ok(ProtocolId {
            security_level,
            name,
        })
    }
}

/// The other party to a derivation: the wallet itself, the shared
/// "anyone" key, or an explicit compressed public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Counterparty {
    Myself,
    Anyone,
    Other([u8; 33]),
}

impl Counterparty {
    pub fn from_hex(s: &str) -> Option<Self> {
        match s {
            "self" => Some(Counterparty::Myself),
            "anyone" => Some(Counterparty::Anyone),
            _ => {
                let bytes = hex::decode(s).ok()?;
                let key: [u8; 33] = bytes.try_into().ok()?;
                Some(Counterparty::Other(key))
            }
        }
    }
}

impl fmt::Display for Counterparty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counterparty::Myself => f.write_str("self"),
            Counterparty::Anyone => f.write_str("anyone"),
            Counterparty::Other(key) => f.write_str(&hex::encode(key)),
        }
    }
}

impl Serialize for Counterparty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Counterparty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Counterparty::from_hex(&s)
            .ok_or_else(|| D::Error::custom("expected \"self\", \"anyone\" or a 33-byte hex key"))
    }
}

impl ToWire for Counterparty {
    fn to_wire(&self, w: &mut Writer) {
        match self {
            Counterparty::Myself => w.put_u8(0),
            Counterparty::Anyone => w.put_u8(1),
            Counterparty::Other(key) => {
                w.put_u8(2);
                w.put_bytes(key);
            }
        }
    }
}

impl FromWire for Counterparty {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        match r.get_u8()? {
            0 => Ok(Counterparty::Myself),
            1 => Ok(Counterparty::Anyone),
            2 => {
                let key: [u8; 33] = r.take(33)?.try_into().unwrap();
                Ok(Counterparty::Other(key))
            }
            value => Err(Error::InvalidDiscriminant {
                what: "counterparty",
                value,
            }),
        }
    }
}

/// Which chain the wallet follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    #[serde(rename = "mainnet")]
    Mainnet,
    #[serde(rename = "testnet")]
    Testnet,
}

impl ToWire for Network {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u8(match self {
            Network::Mainnet => 0,
            Network::Testnet => 1,
        });
    }
}

impl FromWire for Network {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        match r.get_u8()? {
            0 => Ok(Network::Mainnet),
            1 => Ok(Network::Testnet),
            value => Err(Error::InvalidDiscriminant {
                what: "network",
                value,
            }),
        }
    }
}

/// Lifecycle state of an action as reported by `listActions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Unsigned,
    Unprocessed,
    Signed,
    Sending,
    Unproven,
    Completed,
    Failed,
    Nosend,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Unsigned => "unsigned",
            ActionStatus::Unprocessed => "unprocessed",
            ActionStatus::Signed => "signed",
            ActionStatus::Sending => "sending",
            ActionStatus::Unproven => "unproven",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
            ActionStatus::Nosend => "nosend",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unsigned" => Some(ActionStatus::Unsigned),
            "unprocessed" => Some(ActionStatus::Unprocessed),
            "signed" => Some(ActionStatus::Signed),
            "sending" => Some(ActionStatus::Sending),
            "unproven" => Some(ActionStatus::Unproven),
            "completed" => Some(ActionStatus::Completed),
            "failed" => Some(ActionStatus::Failed),
            "nosend" => Some(ActionStatus::Nosend),
            _ => None,
        }
    }

    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Completed | ActionStatus::Failed | ActionStatus::Nosend
        )
    }
}

impl ToWire for ActionStatus {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u8(match self {
            ActionStatus::Unsigned => 1,
            ActionStatus::Unprocessed => 2,
            ActionStatus::Signed => 3,
            ActionStatus::Sending => 4,
            ActionStatus::Unproven => 5,
            ActionStatus::Completed => 6,
            ActionStatus::Failed => 7,
            ActionStatus::Nosend => 8,
        });
    }
}

impl FromWire for ActionStatus {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        match r.get_u8()? {
            1 => Ok(ActionStatus::Unsigned),
            2 => Ok(ActionStatus::Unprocessed),
            3 => Ok(ActionStatus::Signed),
            4 => Ok(ActionStatus::Sending),
            5 => Ok(ActionStatus::Unproven),
            6 => Ok(ActionStatus::Completed),
            7 => Ok(ActionStatus::Failed),
            8 => Ok(ActionStatus::Nosend),
            value => Err(Error::InvalidDiscriminant {
                what: "action status",
                value,
            }),
        }
    }
}

/// Per-element outcome of a batched broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendWithResult {
    pub txid: String,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToWire for SendWithResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.txid);
        w.put_bool(self.accepted);
        w.put_option(&self.message);
    }
}

impl FromWire for SendWithResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(SendWithResult {
            txid: r.get_string()?,
            accepted: r.get_bool()?,
            message: r.get_option()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{from_bytes, to_bytes};

    #[test]
    fn protocol_id_json_is_a_tuple() {
        let p = ProtocolId::new(SecurityLevel::Counterparty, "ctx");
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"[2,"ctx"]"#);
        let back: ProtocolId = serde_json::from_str(r#"[2,"ctx"]"#).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn counterparty_forms() {
        assert_eq!(Counterparty::from_hex("self"), Some(Counterparty::Myself));
        assert_eq!(Counterparty::from_hex("anyone"), Some(Counterparty::Anyone));
        let key = [2u8; 33];
        let parsed = Counterparty::from_hex(&hex::encode(key)).unwrap();
        assert_eq!(parsed, Counterparty::Other(key));
        assert_eq!(Counterparty::from_hex("02abc"), None);
    }

    #[test]
    fn counterparty_wire_round_trip() {
        for c in [
            Counterparty::Myself,
            Counterparty::Anyone,
            Counterparty::Other([3u8; 33]),
        ] {
            assert_eq!(from_bytes::<Counterparty>(&to_bytes(&c)).unwrap(), c);
        }
    }

    #[test]
    fn mainnet_encodes_as_zero() {
        assert_eq!(to_bytes(&Network::Mainnet), vec![0x00]);
        assert_eq!(to_bytes(&Network::Testnet), vec![0x01]);
    }
}
