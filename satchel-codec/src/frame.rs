//! Request/response framing for the wire surface.
//!
//! A request frame is `method byte || argument payload`. A response
//! frame carries no method byte: the first byte is a status code, zero
//! for success followed by the result payload, nonzero for an error
//! followed by a length-prefixed description.

use crate::{Error, Reader, Writer};

/// Wire identifiers for the BRC-100 call table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MethodId {
    CreateAction = 1,
    SignAction = 2,
    AbortAction = 3,
    ListActions = 4,
    InternalizeAction = 5,
    ListOutputs = 6,
    RelinquishOutput = 7,
    GetPublicKey = 8,
    RevealCounterpartyKeyLinkage = 9,
    RevealSpecificKeyLinkage = 10,
    Encrypt = 11,
    Decrypt = 12,
    CreateHmac = 13,
    VerifyHmac = 14,
    CreateSignature = 15,
    VerifySignature = 16,
    AcquireCertificate = 17,
    ListCertificates = 18,
    ProveCertificate = 19,
    RelinquishCertificate = 20,
    DiscoverByIdentityKey = 21,
    DiscoverByAttributes = 22,
    IsAuthenticated = 23,
    WaitForAuthentication = 24,
    GetHeight = 25,
    GetHeaderForHeight = 26,
    GetNetwork = 27,
    GetVersion = 28,
}

impl TryFrom<u8> for MethodId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        use MethodId::*;
        let id = match value {
            1 => CreateAction,
            2 => SignAction,
            3 => AbortAction,
            4 => ListActions,
            5 => InternalizeAction,
            6 => ListOutputs,
            7 => RelinquishOutput,
            8 => GetPublicKey,
            9 => RevealCounterpartyKeyLinkage,
            10 => RevealSpecificKeyLinkage,
            11 => Encrypt,
            12 => Decrypt,
            13 => CreateHmac,
            14 => VerifyHmac,
            15 => CreateSignature,
            16 => VerifySignature,
            17 => AcquireCertificate,
            18 => ListCertificates,
            19 => ProveCertificate,
            20 => RelinquishCertificate,
            21 => DiscoverByIdentityKey,
            22 => DiscoverByAttributes,
            23 => IsAuthenticated,
            24 => WaitForAuthentication,
            25 => GetHeight,
            26 => GetHeaderForHeight,
            27 => GetNetwork,
            28 => GetVersion,
            other => return Err(Error::UnknownMethod(other)),
        };
        Ok(id)
    }
}

/// An inbound call: method selector plus its undecoded argument bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub method: MethodId,
    pub payload: Vec<u8>,
}

impl RequestFrame {
    pub fn new(method: MethodId, payload: Vec<u8>) -> Self {
        Self { method, payload }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.payload.len());
        out.push(self.method as u8);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let (first, rest) = bytes.split_first().ok_or(Error::UnexpectedEof)?;
        Ok(Self {
            method: MethodId::try_from(*first)?,
            payload: rest.to_vec(),
        })
    }
}

/// An outbound result: success payload or coded error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFrame {
    Success(Vec<u8>),
    Error { code: u8, description: String },
}

impl ResponseFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            ResponseFrame::Success(payload) => {
                w.put_u8(0);
                w.put_bytes(payload);
            }
            ResponseFrame::Error { code, description } => {
                debug_assert_ne!(*code, 0);
                w.put_u8(*code);
                w.put_string(description);
            }
        }
        w.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(bytes);
        match r.get_u8()? {
            0 => Ok(ResponseFrame::Success(r.take(r.remaining())?.to_vec())),
            code => {
                let description = r.get_string()?;
                if r.remaining() != 0 {
                    return Err(Error::TrailingBytes(r.remaining()));
                }
                Ok(ResponseFrame::Error { code, description })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_frame_round_trip() {
        let frame = RequestFrame::new(MethodId::GetNetwork, vec![]);
        let bytes = frame.encode();
        assert_eq!(bytes, vec![0x1B]);
        assert_eq!(RequestFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn unknown_method_rejected() {
        assert_eq!(
            RequestFrame::decode(&[0xEE]),
            Err(Error::UnknownMethod(0xEE))
        );
    }

    #[test]
    fn empty_request_rejected() {
        assert_eq!(RequestFrame::decode(&[]), Err(Error::UnexpectedEof));
    }

    #[test]
    fn error_response_round_trip() {
        let frame = ResponseFrame::Error {
            code: 7,
            description: "insufficient funds".into(),
        };
        assert_eq!(ResponseFrame::decode(&frame.encode()).unwrap(), frame);
    }
}
