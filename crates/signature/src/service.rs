//! Signature service - store-backed facade
//!
//! Owns the request lifecycle: creation, signing, rejection, satisfaction
//! evaluation and combination guidance.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::combinations::{possible_combinations, Combination};
use crate::engine::{is_satisfied, signed_counts};
use crate::error::{SignatureError, SignatureResult};
use crate::request::{RequestStatus, SignatureRequest};
use crate::rule::SignatureRule;
use crate::store::SignatureStore;

/// Configuration for the signature workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureConfig {
    /// Hours before a request expires
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: i64,
}

fn default_expiry_hours() -> i64 {
    24
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            expiry_hours: default_expiry_hours(),
        }
    }
}

/// Store-backed signature authorization service.
pub struct SignatureService {
    store: SignatureStore,
    config: SignatureConfig,
}

impl SignatureService {
    /// Create a service with the given store and config
    pub fn new(store: SignatureStore, config: SignatureConfig) -> Self {
        Self { store, config }
    }

    /// Create a service with default config
    pub fn with_store(store: SignatureStore) -> Self {
        Self::new(store, SignatureConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// Persist a rule. The definition is re-validated so rules constructed
    /// without the builder cannot smuggle in an invalid tree.
    pub fn create_rule(&self, rule: &SignatureRule) -> SignatureResult<()> {
        rule.definition.validate()?;
        self.store.save_rule(rule)?;
        info!(org_id = %rule.org_id, rule_id = %rule.id, "signature rule created");
        Ok(())
    }

    /// Add a signer to a group
    pub fn register_signer(
        &self,
        org_id: &str,
        group_code: &str,
        signer_id: &str,
    ) -> SignatureResult<()> {
        self.store.add_signer(org_id, group_code, signer_id)
    }

    /// Create a pending request against an active rule, with one signature
    /// slot per eligible signer.
    pub fn create_request(
        &self,
        org_id: &str,
        rule_id: &str,
        payload_json: String,
        signer_ids: &[String],
    ) -> SignatureResult<SignatureRequest> {
        let rule = self.store.get_rule(org_id, rule_id)?;
        if !rule.active {
            return Err(SignatureError::StateConflict(format!(
                "rule {} is not active",
                rule_id
            )));
        }

        let request = SignatureRequest::new(
            org_id,
            rule_id,
            payload_json,
            signer_ids,
            self.config.expiry_hours,
        );
        self.store.save_request(&request)?;
        info!(org_id, request_id = %request.id, rule_id, "signature request created");
        Ok(request)
    }

    /// Load a request, rolling it to `Expired` when past its deadline.
    pub fn get_request(&self, org_id: &str, request_id: &str) -> SignatureResult<SignatureRequest> {
        let mut request = self.store.get_request(org_id, request_id)?;
        if request.status == RequestStatus::Pending && request.is_expired() {
            request.status = RequestStatus::Expired;
            self.store.save_request(&request)?;
        }
        Ok(request)
    }

    /// Record one signer's signature. Returns the updated request and
    /// whether it is now satisfied.
    pub fn sign(
        &self,
        org_id: &str,
        request_id: &str,
        signer_id: &str,
    ) -> SignatureResult<(SignatureRequest, bool)> {
        let mut request = self.guarded_request(org_id, request_id)?;

        request.signature_mut(signer_id)?.sign()?;

        let satisfied = self.satisfied(&request)?;
        if satisfied {
            request.status = RequestStatus::Satisfied;
        }
        self.store.save_request(&request)?;

        info!(org_id, request_id, signer_id, satisfied, "signature recorded");
        Ok((request, satisfied))
    }

    /// Record one signer's rejection. The request stays pending; other
    /// signers may still satisfy the rule.
    pub fn reject(
        &self,
        org_id: &str,
        request_id: &str,
        signer_id: &str,
    ) -> SignatureResult<SignatureRequest> {
        let mut request = self.guarded_request(org_id, request_id)?;

        request.signature_mut(signer_id)?.reject()?;
        self.store.save_request(&request)?;

        info!(org_id, request_id, signer_id, "signature rejected");
        Ok(request)
    }

    /// Whether the request's collected signatures satisfy its rule.
    /// Pure read: no state transition happens here.
    pub fn evaluate_request(&self, org_id: &str, request_id: &str) -> SignatureResult<bool> {
        let request = self.store.get_request(org_id, request_id)?;
        self.satisfied(&request)
    }

    /// Minimal `{group: count}` combinations that would satisfy the rule.
    pub fn possible_combinations(
        &self,
        org_id: &str,
        rule_id: &str,
    ) -> SignatureResult<Vec<Combination>> {
        let rule = self.store.get_rule(org_id, rule_id)?;
        Ok(possible_combinations(&rule.definition))
    }

    fn guarded_request(&self, org_id: &str, request_id: &str) -> SignatureResult<SignatureRequest> {
        let request = self.get_request(org_id, request_id)?;
        match request.status {
            RequestStatus::Pending => Ok(request),
            RequestStatus::Satisfied => Err(SignatureError::StateConflict(
                "request is already satisfied".to_string(),
            )),
            RequestStatus::Expired => Err(SignatureError::Expired),
        }
    }

    fn satisfied(&self, request: &SignatureRequest) -> SignatureResult<bool> {
        let rule = self.store.get_rule(&request.org_id, &request.rule_id)?;
        let signed = request.signed_signer_ids();
        let memberships = self.store.memberships(&request.org_id, &signed)?;
        let counts = signed_counts(&signed, &memberships);
        Ok(is_satisfied(&rule.definition, &counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::SignatureNode;

    fn service() -> SignatureService {
        SignatureService::with_store(SignatureStore::in_memory().unwrap())
    }

    /// any[{directors,1},{officers,2}] with alice a director, bob and carol
    /// officers.
    fn seeded(service: &SignatureService) -> SignatureRule {
        let rule = SignatureRule::builder("ORG-1")
            .schema("payments")
            .faculty("release")
            .definition(SignatureNode::any(vec![
                SignatureNode::group("directors", 1),
                SignatureNode::group("officers", 2),
            ]))
            .build()
            .unwrap();
        service.create_rule(&rule).unwrap();
        service.register_signer("ORG-1", "directors", "alice").unwrap();
        service.register_signer("ORG-1", "officers", "bob").unwrap();
        service.register_signer("ORG-1", "officers", "carol").unwrap();
        rule
    }

    fn signers() -> Vec<String> {
        vec!["alice".into(), "bob".into(), "carol".into()]
    }

    #[test]
    fn test_single_director_satisfies() {
        let service = service();
        let rule = seeded(&service);
        let request = service
            .create_request("ORG-1", &rule.id, "{}".into(), &signers())
            .unwrap();

        let (request, satisfied) = service.sign("ORG-1", &request.id, "alice").unwrap();
        assert!(satisfied);
        assert_eq!(request.status, RequestStatus::Satisfied);
    }

    #[test]
    fn test_one_officer_is_not_enough() {
        let service = service();
        let rule = seeded(&service);
        let request = service
            .create_request("ORG-1", &rule.id, "{}".into(), &signers())
            .unwrap();

        let (request, satisfied) = service.sign("ORG-1", &request.id, "bob").unwrap();
        assert!(!satisfied);
        assert_eq!(request.status, RequestStatus::Pending);

        let (request, satisfied) = service.sign("ORG-1", &request.id, "carol").unwrap();
        assert!(satisfied);
        assert_eq!(request.status, RequestStatus::Satisfied);
    }

    #[test]
    fn test_double_sign_is_state_conflict() {
        let service = service();
        let rule = seeded(&service);
        let request = service
            .create_request("ORG-1", &rule.id, "{}".into(), &signers())
            .unwrap();

        service.sign("ORG-1", &request.id, "bob").unwrap();
        let err = service.sign("ORG-1", &request.id, "bob").unwrap_err();
        assert!(matches!(err, SignatureError::StateConflict(_)));
    }

    #[test]
    fn test_reject_then_sign_is_state_conflict() {
        let service = service();
        let rule = seeded(&service);
        let request = service
            .create_request("ORG-1", &rule.id, "{}".into(), &signers())
            .unwrap();

        service.reject("ORG-1", &request.id, "carol").unwrap();
        let err = service.sign("ORG-1", &request.id, "carol").unwrap_err();
        assert!(matches!(err, SignatureError::StateConflict(_)));
    }

    #[test]
    fn test_rejection_does_not_block_other_signers() {
        let service = service();
        let rule = seeded(&service);
        let request = service
            .create_request("ORG-1", &rule.id, "{}".into(), &signers())
            .unwrap();

        service.reject("ORG-1", &request.id, "bob").unwrap();
        let (_, satisfied) = service.sign("ORG-1", &request.id, "alice").unwrap();
        assert!(satisfied);
    }

    #[test]
    fn test_signing_satisfied_request_conflicts() {
        let service = service();
        let rule = seeded(&service);
        let request = service
            .create_request("ORG-1", &rule.id, "{}".into(), &signers())
            .unwrap();

        service.sign("ORG-1", &request.id, "alice").unwrap();
        let err = service.sign("ORG-1", &request.id, "bob").unwrap_err();
        assert!(matches!(err, SignatureError::StateConflict(_)));
    }

    #[test]
    fn test_evaluate_request_is_pure() {
        let service = service();
        let rule = seeded(&service);
        let request = service
            .create_request("ORG-1", &rule.id, "{}".into(), &signers())
            .unwrap();

        assert!(!service.evaluate_request("ORG-1", &request.id).unwrap());
        service.sign("ORG-1", &request.id, "alice").unwrap();
        assert!(service.evaluate_request("ORG-1", &request.id).unwrap());
        // evaluation twice in a row does not change anything
        assert!(service.evaluate_request("ORG-1", &request.id).unwrap());
    }

    #[test]
    fn test_possible_combinations_exposed() {
        let service = service();
        let rule = seeded(&service);

        let combos = service.possible_combinations("ORG-1", &rule.id).unwrap();
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[0].get("directors").copied(), Some(1));
        assert_eq!(combos[1].get("officers").copied(), Some(2));
    }

    #[test]
    fn test_inactive_rule_rejects_requests() {
        let service = service();
        let rule = SignatureRule::builder("ORG-1")
            .definition(SignatureNode::group("directors", 1))
            .active(false)
            .build()
            .unwrap();
        service.create_rule(&rule).unwrap();

        let err = service
            .create_request("ORG-1", &rule.id, "{}".into(), &signers())
            .unwrap_err();
        assert!(matches!(err, SignatureError::StateConflict(_)));
    }

    #[test]
    fn test_unknown_rule_not_found() {
        let service = service();
        let err = service
            .create_request("ORG-1", "SRULE-NONE", "{}".into(), &signers())
            .unwrap_err();
        assert!(matches!(err, SignatureError::NotFound(_)));
    }
}
