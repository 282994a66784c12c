//! Envelopes for the stateless query methods.

use super::Network;
use crate::{Error, FromWire, Reader, ToWire, Writer};
use serde::{Deserialize, Serialize};

/// Empty argument set shared by `getHeight`, `getNetwork`,
/// `getVersion` and the authentication queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoArgs {}

impl ToWire for NoArgs {
    fn to_wire(&self, _w: &mut Writer) {}
}

impl FromWire for NoArgs {
    fn from_wire(_r: &mut Reader) -> Result<Self, Error> {
        Ok(NoArgs {})
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetHeightResult {
    pub height: u32,
}

impl ToWire for GetHeightResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u32(self.height);
    }
}

impl FromWire for GetHeightResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(GetHeightResult {
            height: r.get_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNetworkResult {
    pub network: Network,
}

impl ToWire for GetNetworkResult {
    fn to_wire(&self, w: &mut Writer) {
        self.network.to_wire(w);
    }
}

impl FromWire for GetNetworkResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(GetNetworkResult {
            network: Network::from_wire(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetVersionResult {
    pub version: String,
}

impl ToWire for GetVersionResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.version);
    }
}

impl FromWire for GetVersionResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(GetVersionResult {
            version: r.get_string()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedResult {
    pub authenticated: bool,
}

impl ToWire for AuthenticatedResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_bool(self.authenticated);
    }
}

impl FromWire for AuthenticatedResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(AuthenticatedResult {
            authenticated: r.get_bool()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{to_bytes, ResponseFrame};

    #[test]
    fn mainnet_response_frame_bytes() {
        let result = GetNetworkResult {
            network: Network::Mainnet,
        };
        let frame = ResponseFrame::Success(to_bytes(&result));
        assert_eq!(frame.encode(), vec![0x00, 0x00]);
    }

    #[test]
    fn height_result_json() {
        let result = GetHeightResult { height: 850_000 };
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"height":850000}"#
        );
    }
}
