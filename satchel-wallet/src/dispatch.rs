//! Wire dispatch: one inbound frame in, one response frame out.
//!
//! The frame's method byte selects the envelope decoder and the
//! wallet method; the result (or structured error) is re-encoded as a
//! response frame. The mapping to the JSON surface is 1:1.

use crate::{Wallet, WalletError};
use satchel_codec::envelope::*;
use satchel_codec::{from_bytes, to_bytes, FromWire, MethodId, RequestFrame, ResponseFrame, ToWire};
use satchel_services::Interrupt;
use tracing::debug;

impl Wallet {
    /// Handle one wire call end to end. Never fails: every error
    /// becomes an error response frame.
    pub async fn handle_wire(&self, frame: &[u8], interrupt: &Interrupt) -> Vec<u8> {
        let response = match self.dispatch(frame, interrupt).await {
            Ok(payload) => ResponseFrame::Success(payload),
            Err(err) => {
                debug!(code = err.code as u8, %err, "wire call failed");
                ResponseFrame::Error {
                    code: err.code as u8,
                    description: err.description,
                }
            }
        };
        response.encode()
    }

    async fn dispatch(&self, frame: &[u8], interrupt: &Interrupt) -> Result<Vec<u8>, WalletError> {
        let request = RequestFrame::decode(frame)?;
        let payload = &request.payload;
        match request.method {
            MethodId::CreateAction => {
                let args: CreateActionArgs = decode(payload)?;
                encode(&self.create_action(args, interrupt).await?)
            }
            MethodId::SignAction => {
                let args: SignActionArgs = decode(payload)?;
                encode(&self.sign_action(args, interrupt).await?)
            }
            MethodId::AbortAction => {
                let args: AbortActionArgs = decode(payload)?;
                encode(&self.abort_action(args, interrupt).await?)
            }
            MethodId::ListActions => {
                let args: ListActionsArgs = decode(payload)?;
                encode(&self.list_actions(args).await?)
            }
            MethodId::InternalizeAction => {
                let args: InternalizeActionArgs = decode(payload)?;
                encode(&self.internalize_action(args, interrupt).await?)
            }
            MethodId::ListOutputs => {
                let args: ListOutputsArgs = decode(payload)?;
                encode(&self.list_outputs(args).await?)
            }
            MethodId::RelinquishOutput => {
                let args: RelinquishOutputArgs = decode(payload)?;
                encode(&self.relinquish_output(args).await?)
            }
            MethodId::GetPublicKey => {
                let args: GetPublicKeyArgs = decode(payload)?;
                encode(&self.get_public_key(args).await?)
            }
            MethodId::RevealCounterpartyKeyLinkage => {
                let args: RevealCounterpartyKeyLinkageArgs = decode(payload)?;
                encode(&self.reveal_counterparty_key_linkage(args).await?)
            }
            MethodId::RevealSpecificKeyLinkage => {
                let args: RevealSpecificKeyLinkageArgs = decode(payload)?;
                encode(&self.reveal_specific_key_linkage(args).await?)
            }
            MethodId::Encrypt => {
                let args: EncryptArgs = decode(payload)?;
                encode(&self.encrypt(args).await?)
            }
            MethodId::Decrypt => {
                let args: DecryptArgs = decode(payload)?;
                encode(&self.decrypt(args).await?)
            }
            MethodId::CreateHmac => {
                let args: CreateHmacArgs = decode(payload)?;
                encode(&self.create_hmac(args).await?)
            }
            MethodId::VerifyHmac => {
                let args: VerifyHmacArgs = decode(payload)?;
                encode(&self.verify_hmac(args).await?)
            }
            MethodId::CreateSignature => {
                let args: CreateSignatureArgs = decode(payload)?;
                encode(&self.create_signature(args).await?)
            }
            MethodId::VerifySignature => {
                let args: VerifySignatureArgs = decode(payload)?;
                encode(&self.verify_signature(args).await?)
            }
            MethodId::ProveCertificate => {
                let args: ProveCertificateArgs = decode(payload)?;
                encode(&self.prove_certificate(args).await?)
            }
            MethodId::RelinquishCertificate => {
                let args: RelinquishCertificateArgs = decode(payload)?;
                encode(&self.relinquish_certificate(args).await?)
            }
            MethodId::DiscoverByIdentityKey => {
                let args: DiscoverByIdentityKeyArgs = decode(payload)?;
                encode(&self.discover_by_identity_key(args).await?)
            }
            MethodId::DiscoverByAttributes => {
                let args: DiscoverByAttributesArgs = decode(payload)?;
                encode(&self.discover_by_attributes(args).await?)
            }
            MethodId::IsAuthenticated => {
                decode::<NoArgs>(payload)?;
                encode(&self.is_authenticated().await?)
            }
            MethodId::WaitForAuthentication => {
                decode::<NoArgs>(payload)?;
                encode(&self.wait_for_authentication().await?)
            }
            MethodId::GetHeight => {
                decode::<NoArgs>(payload)?;
                encode(&self.get_height().await?)
            }
            MethodId::GetNetwork => {
                decode::<NoArgs>(payload)?;
                encode(&self.get_network().await?)
            }
            MethodId::GetVersion => {
                decode::<NoArgs>(payload)?;
                encode(&self.get_version().await?)
            }
            MethodId::AcquireCertificate
            | MethodId::ListCertificates
            | MethodId::GetHeaderForHeight => Err(WalletError::invalid(format!(
                "method {:?} is not available in this wallet",
                request.method
            ))),
        }
    }
}

fn decode<T: FromWire>(payload: &[u8]) -> Result<T, WalletError> {
    Ok(from_bytes(payload)?)
}

fn encode<T: ToWire>(value: &T) -> Result<Vec<u8>, WalletError> {
    Ok(to_bytes(value))
}
