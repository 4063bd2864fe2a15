//! Signature requests and per-signer signature slots
//!
//! A request is created with one PENDING signature slot per eligible signer
//! and a payload integrity hash. Each slot transitions exactly once:
//! `PENDING -> SIGNED` or `PENDING -> REJECTED`. Both targets are terminal;
//! any further transition attempt is a state-conflict error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{SignatureError, SignatureResult};

/// Status of one signature slot
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SignatureStatus {
    Pending,
    Signed,
    Rejected,
}

impl SignatureStatus {
    /// Whether the status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, SignatureStatus::Signed | SignatureStatus::Rejected)
    }
}

/// Status of a whole request
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting signatures
    Pending,
    /// The rule definition is satisfied by collected signatures
    Satisfied,
    /// Expired before satisfaction
    Expired,
}

/// One signer's signature slot on a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// The signer this slot belongs to
    pub signer_id: String,

    /// Current status
    pub status: SignatureStatus,

    /// When the terminal transition happened
    pub decided_at: Option<DateTime<Utc>>,

    /// When the slot was created
    pub created_at: DateTime<Utc>,
}

impl Signature {
    /// Create a fresh PENDING slot
    pub fn new(signer_id: impl Into<String>) -> Self {
        Self {
            signer_id: signer_id.into(),
            status: SignatureStatus::Pending,
            decided_at: None,
            created_at: Utc::now(),
        }
    }

    fn transition(&mut self, to: SignatureStatus) -> SignatureResult<()> {
        if self.status.is_terminal() {
            return Err(SignatureError::StateConflict(format!(
                "signature of {} is already {}",
                self.signer_id, self.status
            )));
        }
        self.status = to;
        self.decided_at = Some(Utc::now());
        Ok(())
    }

    /// Transition to SIGNED (terminal)
    pub fn sign(&mut self) -> SignatureResult<()> {
        self.transition(SignatureStatus::Signed)
    }

    /// Transition to REJECTED (terminal)
    pub fn reject(&mut self) -> SignatureResult<()> {
        self.transition(SignatureStatus::Rejected)
    }
}

/// A signature request collecting signatures against one rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRequest {
    /// Unique request ID
    pub id: String,

    /// Owning organization
    pub org_id: String,

    /// Rule the request is evaluated against
    pub rule_id: String,

    /// JSON payload being authorized
    pub payload_json: String,

    /// SHA256 hash of the payload for integrity verification
    pub payload_hash: String,

    /// Per-signer signature slots
    pub signatures: Vec<Signature>,

    /// Current status
    pub status: RequestStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
}

impl SignatureRequest {
    /// Create a new pending request with one slot per eligible signer.
    pub fn new(
        org_id: impl Into<String>,
        rule_id: impl Into<String>,
        payload_json: String,
        signer_ids: &[String],
        expiry_hours: i64,
    ) -> Self {
        let id = format!("SREQ-{}", &uuid::Uuid::new_v4().to_string()[..8].to_uppercase());
        let payload_hash = compute_hash(&payload_json);
        let now = Utc::now();

        Self {
            id,
            org_id: org_id.into(),
            rule_id: rule_id.into(),
            payload_json,
            payload_hash,
            signatures: signer_ids.iter().map(Signature::new).collect(),
            status: RequestStatus::Pending,
            created_at: now,
            expires_at: now + chrono::Duration::hours(expiry_hours),
        }
    }

    /// Whether the request has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// The slot of one signer
    pub fn signature_mut(&mut self, signer_id: &str) -> SignatureResult<&mut Signature> {
        self.signatures
            .iter_mut()
            .find(|s| s.signer_id == signer_id)
            .ok_or_else(|| SignatureError::NotFound(format!("signer {} on request", signer_id)))
    }

    /// Ids of signers whose slots are SIGNED
    pub fn signed_signer_ids(&self) -> Vec<&str> {
        self.signatures
            .iter()
            .filter(|s| s.status == SignatureStatus::Signed)
            .map(|s| s.signer_id.as_str())
            .collect()
    }
}

/// SHA256 hash of a string, hex encoded
fn compute_hash(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}
