//! The External Service Set: a small, open-ended interface family —
//! candidate search, person enrichment, email verification, and whatever
//! future plug-replaceable integrations agents need. The orchestration core
//! requires none of these directly; only concrete agents call them.

use crate::error::OrchestratorError;
use async_trait::async_trait;

/// A single candidate surfaced by `find_candidates`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct CandidateRecord {
    pub name: String,
    pub headline: String,
    pub profile_url: String,
    pub platform: String,
}

/// Result of an enrichment lookup; fields are best-effort and may be empty.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Default)]
pub struct EnrichmentRecord {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
}

/// Plug-replaceable external integrations used by concrete agents. Each
/// operation has a nominal contract (documented per-method) but is
/// otherwise opaque to the orchestration core, mirroring the Transport
/// trait's role as an injected external collaborator.
#[async_trait]
pub trait ExternalServices: Send + Sync {
    /// Idempotent. Returns at most `limit` candidates matching `query`
    /// filtered by `criteria`.
    async fn find_candidates(
        &self,
        query: &str,
        criteria: serde_json::Value,
        limit: usize,
    ) -> Result<Vec<CandidateRecord>, OrchestratorError>;

    /// Idempotent. Best-effort; missing fields are `None`, not an error.
    async fn enrich_person(
        &self,
        name: &str,
        company: &str,
        domain: &str,
    ) -> Result<EnrichmentRecord, OrchestratorError>;

    /// Idempotent. Returns whether `addr` is deliverable per the backing
    /// verification provider.
    async fn verify_email(&self, addr: &str) -> Result<bool, OrchestratorError>;
}
