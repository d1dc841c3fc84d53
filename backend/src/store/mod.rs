use async_trait::async_trait;
use rand::Rng;

use crate::models::{
    NewProperty, NewUserVote, NewValuationReport, NewVotingProposal, Property, UserVote,
    ValuationReport, VoteType, VotingProposal, VotingProposalUpdate,
};

mod memory;
#[cfg(feature = "postgres")]
mod pg;
pub mod seed;

pub use memory::MemStorage;
#[cfg(feature = "postgres")]
pub use pg::PgStorage;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("User has already voted on this proposal")]
    AlreadyVoted,
    #[error("Voting has closed for this proposal")]
    VotingClosed,
    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The only mutation path for properties, proposals, reports and votes.
///
/// Reads return records in insertion order. Lookups that can miss return
/// `Ok(None)` rather than an error.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_properties(&self) -> StoreResult<Vec<Property>>;
    async fn get_property(&self, id: &str) -> StoreResult<Option<Property>>;
    async fn create_property(&self, property: NewProperty) -> StoreResult<Property>;

    async fn get_voting_proposals(&self) -> StoreResult<Vec<VotingProposal>>;
    async fn get_voting_proposal(&self, id: &str) -> StoreResult<Option<VotingProposal>>;
    async fn create_voting_proposal(
        &self,
        proposal: NewVotingProposal,
    ) -> StoreResult<VotingProposal>;
    async fn update_voting_proposal(
        &self,
        id: &str,
        update: VotingProposalUpdate,
    ) -> StoreResult<Option<VotingProposal>>;

    async fn get_valuation_reports(&self) -> StoreResult<Vec<ValuationReport>>;
    async fn get_valuation_reports_by_property(
        &self,
        property_id: &str,
    ) -> StoreResult<Vec<ValuationReport>>;
    async fn create_valuation_report(
        &self,
        report: NewValuationReport,
    ) -> StoreResult<ValuationReport>;

    async fn get_user_vote(
        &self,
        proposal_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<UserVote>>;
    async fn create_user_vote(&self, vote: NewUserVote) -> StoreResult<UserVote>;

    /// Records a ballot and bumps the proposal counters as one step.
    ///
    /// Fails with `AlreadyVoted` if `user_id` has a vote on the proposal,
    /// `NotFound` if the proposal is missing and `VotingClosed` once its end
    /// date has passed. Nothing is written on failure.
    async fn cast_vote(
        &self,
        proposal_id: &str,
        user_id: &str,
        vote_type: VoteType,
    ) -> StoreResult<VotingProposal>;
}

/// Draws a fresh 128-bit identifier from `rng`, rendered as a UUID string.
pub fn generate_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}

/// Placeholder token and income figures for a freshly listed property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAllocation {
    pub nft_tokens: i64,
    pub cw20_tokens: i64,
    pub monthly_income: i64,
    pub valuation: i64,
}

impl TokenAllocation {
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            nft_tokens: rng.gen_range(25..75),
            cw20_tokens: rng.gen_range(2500..7500),
            monthly_income: rng.gen_range(1000..3000),
            valuation: rng.gen_range(300_000..800_000),
        }
    }
}
