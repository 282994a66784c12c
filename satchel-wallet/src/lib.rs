//! The BRC-100 wallet orchestrator.
//!
//! [`Wallet`] implements the full method surface over the lower
//! layers: key derivation and authenticated crypto from
//! `satchel-crypto`, drafting and signing from `satchel-storage` and
//! `satchel-txbuilder`, chain access through the `ChainServices`
//! seam. It is the only component aware of both the wire codec and
//! storage.

mod dispatch;
mod error;

pub use error::{ErrorCode, ErrorShape, WalletError};

use chrono::Utc;
use satchel_codec::envelope::*;
use satchel_crypto::ecdsa::SignInput;
use satchel_crypto::{KeyDeriver, RootKey};
use satchel_primitives::beef::build_atomic_beef;
use satchel_primitives::OutPoint;
use satchel_services::{Chain, ChainServices, ChainTracker, Interrupt};
use satchel_storage::methods::{self, PurgeParams, ReviewParams};
use satchel_storage::provider::rows;
use satchel_storage::{CertificateRecord, StorageProvider};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{instrument, warn};

pub const WALLET_VERSION: &str = concat!("satchel-", env!("CARGO_PKG_VERSION"));

/// Protocols used for linkage disclosure and certificate field
/// encryption.
const COUNTERPARTY_LINKAGE_PROTOCOL: &str = "counterparty linkage revelation";
const SPECIFIC_LINKAGE_PROTOCOL: &str = "specific linkage revelation";
const CERT_FIELD_PROTOCOL: &str = "certificate field encryption";

/// Outstanding broadcast submissions are bounded; the queue drains on
/// the next tick when saturated.
const BROADCAST_PERMITS: usize = 8;

pub struct Wallet {
    chain: Chain,
    deriver: KeyDeriver,
    storage: Arc<StorageProvider>,
    services: Arc<dyn ChainServices>,
    user_id: i64,
    broadcast_permits: Arc<Semaphore>,
}

impl Wallet {
    /// Build a wallet for `root_key`, resolving (or creating) the user
    /// row, default basket and default label.
    pub fn new(
        chain: Chain,
        root_key: RootKey,
        storage: StorageProvider,
        services: Arc<dyn ChainServices>,
    ) -> Result<Self, WalletError> {
        let deriver = KeyDeriver::new(root_key)?;
        let user = storage.find_or_create_user(&deriver.identity_hex())?;
        Ok(Self {
            chain,
            deriver,
            storage: Arc::new(storage),
            services,
            user_id: user.user_id,
            broadcast_permits: Arc::new(Semaphore::new(BROADCAST_PERMITS)),
        })
    }

    pub fn identity_key(&self) -> String {
        self.deriver.identity_hex()
    }

    pub fn network(&self) -> Network {
        match self.chain {
            Chain::Main => Network::Mainnet,
            Chain::Test => Network::Testnet,
        }
    }

    pub fn chain_tracker(&self) -> ChainTracker {
        ChainTracker::new(self.services.clone())
    }

    // -- action lifecycle ---------------------------------------------

    #[instrument(skip_all, fields(description = %args.description))]
    pub async fn create_action(
        &self,
        args: CreateActionArgs,
        interrupt: &Interrupt,
    ) -> Result<CreateActionResult, WalletError> {
        interrupt.check()?;
        let outcome = methods::create_action(&self.storage, &self.deriver, self.user_id, &args)?;
        let mut result = outcome.result;

        // Anything owed beyond the commit happens post-commit: an
        // immediate broadcast, then any sendWith batch.
        if let Some(processed) = &outcome.processed {
            if processed.wants_immediate_post {
                interrupt.check()?;
                let _permit = self.broadcast_permits.acquire().await.map_err(|_| {
                    WalletError::new(ErrorCode::Internal, "broadcast pool closed")
                })?;
                methods::attempt_to_post_reqs_to_network(
                    &self.storage,
                    self.services.as_ref(),
                    interrupt,
                )
                .await?;
            }
        }
        if !outcome.send_with.is_empty() {
            interrupt.check()?;
            let batch = self.send_with(&outcome.send_with).await?;
            result.send_with_results = Some(batch);
        }
        Ok(result)
    }

    #[instrument(skip_all, fields(reference = %args.reference))]
    pub async fn sign_action(
        &self,
        args: SignActionArgs,
        interrupt: &Interrupt,
    ) -> Result<SignActionResult, WalletError> {
        interrupt.check()?;
        let processed =
            methods::sign_action(&self.storage, &self.deriver, self.user_id, &args)?;

        let action = self
            .storage
            .find_action_by_reference(self.user_id, &args.reference)?
            .ok_or_else(|| WalletError::invalid("action vanished during signing"))?;
        let raw = action
            .raw_tx
            .ok_or_else(|| WalletError::invalid("signed action has no transaction"))?;
        let atomic = build_atomic_beef(&raw, None);

        // Signing schedules the broadcast; drive one queue pass so the
        // common create → sign → broadcast flow completes in-line.
        interrupt.check()?;
        methods::attempt_to_post_reqs_to_network(&self.storage, self.services.as_ref(), interrupt)
            .await?;

        Ok(SignActionResult {
            txid: processed.txid,
            tx: atomic.to_bytes(),
            send_with_results: None,
        })
    }

    pub async fn abort_action(
        &self,
        args: AbortActionArgs,
        interrupt: &Interrupt,
    ) -> Result<AbortActionResult, WalletError> {
        interrupt.check()?;
        let aborted = methods::abort_action(&self.storage, self.user_id, &args.reference)?;
        Ok(AbortActionResult { aborted })
    }

    pub async fn list_actions(
        &self,
        args: ListActionsArgs,
    ) -> Result<ListActionsResult, WalletError> {
        Ok(methods::list_actions(&self.storage, self.user_id, &args)?)
    }

    pub async fn list_outputs(
        &self,
        args: ListOutputsArgs,
    ) -> Result<ListOutputsResult, WalletError> {
        Ok(methods::list_outputs(&self.storage, self.user_id, &args)?)
    }

    pub async fn internalize_action(
        &self,
        args: InternalizeActionArgs,
        interrupt: &Interrupt,
    ) -> Result<InternalizeActionResult, WalletError> {
        interrupt.check()?;
        let accepted =
            methods::internalize_action(&self.storage, &self.deriver, self.user_id, &args)?;
        Ok(InternalizeActionResult { accepted })
    }

    pub async fn relinquish_output(
        &self,
        args: RelinquishOutputArgs,
    ) -> Result<RelinquishOutputResult, WalletError> {
        let outpoint = OutPoint::parse(&args.output)?;
        let user_id = self.user_id;
        let relinquished = self.storage.with_tx(|c| {
            let basket = rows::find_basket(c, user_id, &args.basket)?
                .ok_or(satchel_storage::StorageError::NotFound("basket"))?;
            rows::relinquish_output(
                c,
                user_id,
                basket.basket_id,
                &outpoint.txid.to_string(),
                outpoint.vout,
            )
        })?;
        if !relinquished {
            return Err(WalletError::invalid(format!(
                "output {} is not in basket {}",
                args.output, args.basket
            )));
        }
        Ok(RelinquishOutputResult { relinquished })
    }

    /// Batch-submit previously created `noSend` actions by reference.
    async fn send_with(&self, references: &[String]) -> Result<Vec<SendWithResult>, WalletError> {
        let mut beefs = Vec::with_capacity(references.len());
        let mut actions = Vec::with_capacity(references.len());
        for reference in references {
            let action = self
                .storage
                .find_action_by_reference(self.user_id, reference)?
                .ok_or_else(|| {
                    WalletError::invalid(format!("unknown sendWith reference {reference}"))
                })?;
            let raw = action.raw_tx.clone().ok_or_else(|| {
                WalletError::invalid(format!("reference {reference} has no transaction"))
            })?;
            beefs.push(build_atomic_beef(&raw, None).to_bytes());
            actions.push(action);
        }

        let _permit = self
            .broadcast_permits
            .acquire()
            .await
            .map_err(|_| WalletError::new(ErrorCode::Internal, "broadcast pool closed"))?;
        let results = self.services.post_beef_array(&beefs).await?;

        for (action, result) in actions.iter().zip(&results) {
            let txid = action.txid.clone().unwrap_or_default();
            if result.accepted {
                self.storage.with_tx(|c| {
                    rows::update_action_status(c, action.action_id, ActionStatus::Unproven)?;
                    let req_id = rows::insert_req(
                        c,
                        self.user_id,
                        action.action_id,
                        &txid,
                        action.raw_tx.as_deref().unwrap_or_default(),
                    )?;
                    rows::update_req(c, req_id, ActionStatus::Unproven, 1, Some("accepted"), None)
                })?;
            } else {
                warn!(txid, message = ?result.message, "sendWith element rejected");
            }
        }

        Ok(results
            .into_iter()
            .map(|r| SendWithResult {
                txid: r.txid,
                accepted: r.accepted,
                message: r.message,
            })
            .collect())
    }

    // -- background ticks ---------------------------------------------

    /// Drive one pass of the broadcast queue.
    pub async fn process_broadcast_queue(
        &self,
        interrupt: &Interrupt,
    ) -> Result<usize, WalletError> {
        let _permit = self
            .broadcast_permits
            .acquire()
            .await
            .map_err(|_| WalletError::new(ErrorCode::Internal, "broadcast pool closed"))?;
        let results = methods::attempt_to_post_reqs_to_network(
            &self.storage,
            self.services.as_ref(),
            interrupt,
        )
        .await?;
        Ok(results.len())
    }

    /// Drive one review pass over unproven actions.
    pub async fn review_status(
        &self,
        params: &ReviewParams,
        interrupt: &Interrupt,
    ) -> Result<methods::ReviewSummary, WalletError> {
        Ok(methods::review_status(&self.storage, self.services.as_ref(), interrupt, params).await?)
    }

    /// Apply the retention policy.
    pub fn purge_data(&self, params: &PurgeParams) -> Result<methods::PurgeSummary, WalletError> {
        Ok(methods::purge_data(&self.storage, params)?)
    }

    // -- keyed cryptography -------------------------------------------

    pub async fn encrypt(&self, args: EncryptArgs) -> Result<EncryptResult, WalletError> {
        let ctx = &args.context;
        let ciphertext = self.deriver.encrypt(
            &ctx.protocol_id,
            &ctx.key_id,
            &ctx.counterparty,
            &args.plaintext,
        )?;
        Ok(EncryptResult { ciphertext })
    }

    pub async fn decrypt(&self, args: DecryptArgs) -> Result<DecryptResult, WalletError> {
        let ctx = &args.context;
        let plaintext = self.deriver.decrypt(
            &ctx.protocol_id,
            &ctx.key_id,
            &ctx.counterparty,
            &args.ciphertext,
        )?;
        Ok(DecryptResult { plaintext })
    }

    pub async fn create_hmac(&self, args: CreateHmacArgs) -> Result<CreateHmacResult, WalletError> {
        let ctx = &args.context;
        let key =
            self.deriver
                .derive_symmetric_key(&ctx.protocol_id, &ctx.key_id, &ctx.counterparty)?;
        let tag = satchel_crypto::hash::hmac_sha256(&*key, &args.data);
        Ok(CreateHmacResult {
            hmac: tag.as_ref().to_vec(),
        })
    }

    pub async fn verify_hmac(&self, args: VerifyHmacArgs) -> Result<VerifyResult, WalletError> {
        let ctx = &args.context;
        let key =
            self.deriver
                .derive_symmetric_key(&ctx.protocol_id, &ctx.key_id, &ctx.counterparty)?;
        let expected = satchel_crypto::hash::hmac_sha256(&*key, &args.data);
        // Constant-time comparison over the full tag length.
        let provided = &args.hmac;
        let valid = provided.len() == expected.as_ref().len()
            && provided
                .iter()
                .zip(expected.as_ref())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0;
        Ok(VerifyResult { valid })
    }

    pub async fn create_signature(
        &self,
        args: CreateSignatureArgs,
    ) -> Result<CreateSignatureResult, WalletError> {
        let input = sign_input(&args.data, &args.hash_to_directly_sign)?;
        let ctx = &args.context;
        let signature =
            self.deriver
                .sign(&ctx.protocol_id, &ctx.key_id, &ctx.counterparty, input)?;
        Ok(CreateSignatureResult { signature })
    }

    pub async fn verify_signature(
        &self,
        args: VerifySignatureArgs,
    ) -> Result<VerifyResult, WalletError> {
        let input = sign_input(&args.data, &args.hash_to_directly_verify)?;
        let ctx = &args.context;
        let valid = self.deriver.verify(
            &ctx.protocol_id,
            &ctx.key_id,
            &ctx.counterparty,
            args.for_self.unwrap_or(false),
            input,
            &args.signature,
        )?;
        Ok(VerifyResult { valid })
    }

    pub async fn get_public_key(
        &self,
        args: GetPublicKeyArgs,
    ) -> Result<GetPublicKeyResult, WalletError> {
        if args.identity_key.unwrap_or(false) {
            return Ok(GetPublicKeyResult {
                public_key: self.deriver.identity_hex(),
            });
        }
        let protocol_id = args
            .protocol_id
            .ok_or_else(|| WalletError::invalid("protocolID is required"))?;
        let key_id = args
            .key_id
            .ok_or_else(|| WalletError::invalid("keyID is required"))?;
        let counterparty = args.counterparty.unwrap_or(Counterparty::Myself);
        let key = self.deriver.derive_public(
            &protocol_id,
            &key_id,
            &counterparty,
            args.for_self.unwrap_or(false),
        )?;
        Ok(GetPublicKeyResult {
            public_key: hex::encode(key.serialize()),
        })
    }

    // -- key linkage --------------------------------------------------

    pub async fn reveal_counterparty_key_linkage(
        &self,
        args: RevealCounterpartyKeyLinkageArgs,
    ) -> Result<KeyLinkageResult, WalletError> {
        let counterparty = Counterparty::from_hex(&args.counterparty)
            .filter(|c| matches!(c, Counterparty::Other(_)))
            .ok_or_else(|| WalletError::invalid("counterparty must be an explicit key"))?;
        let verifier = Counterparty::from_hex(&args.verifier)
            .filter(|c| matches!(c, Counterparty::Other(_)))
            .ok_or_else(|| WalletError::invalid("verifier must be an explicit key"))?;

        let resolved = self.deriver.resolve_counterparty(&counterparty)?;
        let linkage = self.deriver.counterparty_linkage(&resolved)?;
        let revelation_time = Utc::now().to_rfc3339();

        let protocol = ProtocolId::new(SecurityLevel::Counterparty, COUNTERPARTY_LINKAGE_PROTOCOL);
        let encrypted_linkage =
            self.deriver
                .encrypt(&protocol, &revelation_time, &verifier, &*linkage)?;

        Ok(KeyLinkageResult {
            prover: self.deriver.identity_hex(),
            verifier: args.verifier,
            counterparty: args.counterparty,
            revelation_time,
            encrypted_linkage,
            encrypted_linkage_proof: Vec::new(),
            proof_type: None,
        })
    }

    pub async fn reveal_specific_key_linkage(
        &self,
        args: RevealSpecificKeyLinkageArgs,
    ) -> Result<KeyLinkageResult, WalletError> {
        let verifier = Counterparty::from_hex(&args.verifier)
            .filter(|c| matches!(c, Counterparty::Other(_)))
            .ok_or_else(|| WalletError::invalid("verifier must be an explicit key"))?;

        let linkage =
            self.deriver
                .specific_linkage(&args.protocol_id, &args.key_id, &args.counterparty)?;
        let revelation_time = Utc::now().to_rfc3339();

        let wrapping = ProtocolId::new(
            SecurityLevel::Counterparty,
            format!(
                "{SPECIFIC_LINKAGE_PROTOCOL} {} {}",
                args.protocol_id.security_level as u8, args.protocol_id.name
            ),
        );
        let encrypted_linkage =
            self.deriver
                .encrypt(&wrapping, &args.key_id, &verifier, &*linkage)?;

        Ok(KeyLinkageResult {
            prover: self.deriver.identity_hex(),
            verifier: args.verifier,
            counterparty: args.counterparty.to_string(),
            revelation_time,
            encrypted_linkage,
            encrypted_linkage_proof: Vec::new(),
            proof_type: Some(0),
        })
    }

    // -- certificates -------------------------------------------------

    pub async fn prove_certificate(
        &self,
        args: ProveCertificateArgs,
    ) -> Result<ProveCertificateResult, WalletError> {
        let verifier = Counterparty::from_hex(&args.verifier)
            .filter(|c| matches!(c, Counterparty::Other(_)))
            .ok_or_else(|| WalletError::invalid("verifier must be an explicit key"))?;
        let user_id = self.user_id;
        let cert = self
            .storage
            .with_tx(|c| {
                rows::find_certificate(
                    c,
                    user_id,
                    &args.certificate_type,
                    &args.serial_number,
                    &args.certifier,
                )
            })?
            .ok_or_else(|| WalletError::invalid("certificate not held"))?;

        let protocol = ProtocolId::new(SecurityLevel::Counterparty, CERT_FIELD_PROTOCOL);
        let mut keyring = std::collections::BTreeMap::new();
        for field in &args.fields_to_reveal {
            let value = cert
                .fields
                .get(field)
                .ok_or_else(|| WalletError::invalid(format!("no field {field:?}")))?;
            let key_id = format!("{} {}", args.serial_number, field);
            let sealed =
                self.deriver
                    .encrypt(&protocol, &key_id, &verifier, value.as_bytes())?;
            keyring.insert(field.clone(), hex::encode(sealed));
        }
        Ok(ProveCertificateResult {
            keyring_for_verifier: keyring,
        })
    }

    pub async fn relinquish_certificate(
        &self,
        args: RelinquishCertificateArgs,
    ) -> Result<RelinquishCertificateResult, WalletError> {
        let user_id = self.user_id;
        let relinquished = self.storage.with_tx(|c| {
            match rows::find_certificate(
                c,
                user_id,
                &args.certificate_type,
                &args.serial_number,
                &args.certifier,
            )? {
                Some(cert) => rows::delete_certificate(c, cert.certificate_id),
                None => Ok(false),
            }
        })?;
        if !relinquished {
            return Err(WalletError::invalid("certificate not held"));
        }
        Ok(RelinquishCertificateResult { relinquished })
    }

    /// Store a certificate so discovery and proving can find it. Not a
    /// BRC-100 method; issuance flows live outside the core.
    pub fn hold_certificate(&self, mut cert: CertificateRecord) -> Result<(), WalletError> {
        cert.user_id = self.user_id;
        self.storage
            .with_tx(|c| rows::insert_certificate(c, &cert))?;
        Ok(())
    }

    pub async fn discover_by_identity_key(
        &self,
        args: DiscoverByIdentityKeyArgs,
    ) -> Result<DiscoverCertificatesResult, WalletError> {
        let user_id = self.user_id;
        let (total, certs) = self.storage.with_tx(|c| {
            rows::certificates_by_subject(
                c,
                user_id,
                &args.identity_key,
                args.limit.unwrap_or(DEFAULT_LIST_LIMIT),
                args.offset.unwrap_or(0),
            )
        })?;
        Ok(DiscoverCertificatesResult {
            total_certificates: total,
            certificates: certs.into_iter().map(entry_of).collect(),
        })
    }

    pub async fn discover_by_attributes(
        &self,
        args: DiscoverByAttributesArgs,
    ) -> Result<DiscoverCertificatesResult, WalletError> {
        let user_id = self.user_id;
        let (total, certs) = self.storage.with_tx(|c| {
            rows::certificates_by_attributes(
                c,
                user_id,
                &args.attributes,
                args.limit.unwrap_or(DEFAULT_LIST_LIMIT),
                args.offset.unwrap_or(0),
            )
        })?;
        Ok(DiscoverCertificatesResult {
            total_certificates: total,
            certificates: certs.into_iter().map(entry_of).collect(),
        })
    }

    // -- stateless queries --------------------------------------------

    pub async fn get_height(&self) -> Result<GetHeightResult, WalletError> {
        let height = self.services.get_height().await?;
        Ok(GetHeightResult { height })
    }

    pub async fn get_network(&self) -> Result<GetNetworkResult, WalletError> {
        Ok(GetNetworkResult {
            network: self.network(),
        })
    }

    pub async fn get_version(&self) -> Result<GetVersionResult, WalletError> {
        Ok(GetVersionResult {
            version: WALLET_VERSION.into(),
        })
    }

    pub async fn is_authenticated(&self) -> Result<AuthenticatedResult, WalletError> {
        Ok(AuthenticatedResult {
            authenticated: true,
        })
    }

    /// The base wallet is always authenticated; managers layered above
    /// override this behavior.
    pub async fn wait_for_authentication(&self) -> Result<AuthenticatedResult, WalletError> {
        Ok(AuthenticatedResult {
            authenticated: true,
        })
    }

    /// Spendable satoshis in the default basket.
    pub fn balance(&self) -> Result<i64, WalletError> {
        Ok(self
            .storage
            .balance(self.user_id, satchel_storage::DEFAULT_BASKET_NAME)?)
    }
}

fn entry_of(cert: CertificateRecord) -> CertificateEntry {
    CertificateEntry {
        certificate_type: cert.certificate_type,
        serial_number: cert.serial_number,
        subject: cert.subject,
        certifier: cert.certifier,
        revocation_outpoint: cert.revocation_outpoint,
        signature: cert.signature,
        fields: cert.fields,
    }
}

fn sign_input<'a>(
    data: &'a Option<Vec<u8>>,
    digest: &'a Option<Vec<u8>>,
) -> Result<SignInput<'a>, WalletError> {
    match (data, digest) {
        (Some(data), None) => Ok(SignInput::Data(data)),
        (None, Some(digest)) => Ok(SignInput::Digest(digest)),
        _ => Err(WalletError::invalid(
            "exactly one of data and hash must be present",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_names_the_crate() {
        assert!(WALLET_VERSION.starts_with("satchel-"));
    }

    #[test]
    fn sign_input_requires_exactly_one() {
        assert!(sign_input(&None, &None).is_err());
        assert!(sign_input(&Some(vec![1]), &Some(vec![2; 32])).is_err());
        assert!(sign_input(&Some(vec![1]), &None).is_ok());
    }
}
