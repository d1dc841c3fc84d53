use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::RwLock;

use super::{generate_id, seed, Storage, StoreError, StoreResult, TokenAllocation};
use crate::models::{
    NewProperty, NewUserVote, NewValuationReport, NewVotingProposal, Property, UserVote,
    ValuationReport, VoteType, VotingProposal, VotingProposalUpdate, DEMO_USER_ID,
};

/// Rows in insertion order with an id index on the side. Rows are never removed.
struct Table<T> {
    rows: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, id: String, row: T) {
        match self.index.get(&id) {
            Some(&pos) => self.rows[pos] = row,
            None => {
                self.index.insert(id, self.rows.len());
                self.rows.push(row);
            }
        }
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.rows[pos])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.index.get(id).map(|&pos| &mut self.rows[pos])
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter()
    }

    fn to_vec(&self) -> Vec<T> {
        self.rows.clone()
    }
}

struct Inner {
    rng: StdRng,
    properties: Table<Property>,
    proposals: Table<VotingProposal>,
    reports: Table<ValuationReport>,
    votes: Table<UserVote>,
}

impl Inner {
    fn find_vote(&self, proposal_id: &str, user_id: &str) -> Option<&UserVote> {
        self.votes
            .iter()
            .find(|v| v.proposal_id == proposal_id && v.user_id == user_id)
    }
}

/// Process-lifetime store. Every mutation holds the write lock for its whole
/// duration, so multi-step operations such as `cast_vote` cannot interleave.
pub struct MemStorage {
    inner: RwLock<Inner>,
}

impl MemStorage {
    /// An empty store drawing ids and placeholder figures from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// An empty store driven by the given random source.
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            inner: RwLock::new(Inner {
                rng,
                properties: Table::new(),
                proposals: Table::new(),
                reports: Table::new(),
                votes: Table::new(),
            }),
        }
    }

    /// A store pre-loaded with the demo properties and proposals.
    pub fn seeded() -> Self {
        Self::new().with_sample_data()
    }

    pub fn with_sample_data(self) -> Self {
        let mut inner = self.inner.into_inner();
        let now = Utc::now();
        for property in seed::sample_properties(now) {
            inner.properties.insert(property.id.clone(), property);
        }
        for proposal in seed::sample_proposals(now) {
            inner.proposals.insert(proposal.id.clone(), proposal);
        }
        info!(
            "Loaded {} sample properties and {} sample proposals",
            inner.properties.rows.len(),
            inner.proposals.rows.len()
        );
        Self {
            inner: RwLock::new(inner),
        }
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn get_properties(&self) -> StoreResult<Vec<Property>> {
        Ok(self.inner.read().await.properties.to_vec())
    }

    async fn get_property(&self, id: &str) -> StoreResult<Option<Property>> {
        Ok(self.inner.read().await.properties.get(id).cloned())
    }

    async fn create_property(&self, property: NewProperty) -> StoreResult<Property> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let id = generate_id(&mut inner.rng);
        let tokens = TokenAllocation::draw(&mut inner.rng);
        let property = Property {
            id: id.clone(),
            name: property.name,
            description: property.description,
            image: property.image,
            nft_tokens: tokens.nft_tokens,
            cw20_tokens: tokens.cw20_tokens,
            monthly_income: tokens.monthly_income,
            valuation: tokens.valuation,
            created_at: Utc::now(),
        };
        inner.properties.insert(id, property.clone());
        debug!("Stored property {}", property.id);
        Ok(property)
    }

    async fn get_voting_proposals(&self) -> StoreResult<Vec<VotingProposal>> {
        Ok(self.inner.read().await.proposals.to_vec())
    }

    async fn get_voting_proposal(&self, id: &str) -> StoreResult<Option<VotingProposal>> {
        Ok(self.inner.read().await.proposals.get(id).cloned())
    }

    async fn create_voting_proposal(
        &self,
        proposal: NewVotingProposal,
    ) -> StoreResult<VotingProposal> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let id = generate_id(&mut inner.rng);
        let proposal = VotingProposal {
            id: id.clone(),
            title: proposal.title,
            description: proposal.description,
            property_id: proposal.property_id,
            yes_votes: 0,
            no_votes: 0,
            total_votes: 0,
            end_date: proposal.end_date,
            created_at: Utc::now(),
        };
        inner.proposals.insert(id, proposal.clone());
        debug!("Stored voting proposal {}", proposal.id);
        Ok(proposal)
    }

    async fn update_voting_proposal(
        &self,
        id: &str,
        update: VotingProposalUpdate,
    ) -> StoreResult<Option<VotingProposal>> {
        let mut inner = self.inner.write().await;
        Ok(inner.proposals.get_mut(id).map(|proposal| {
            update.apply_to(proposal);
            proposal.clone()
        }))
    }

    async fn get_valuation_reports(&self) -> StoreResult<Vec<ValuationReport>> {
        Ok(self.inner.read().await.reports.to_vec())
    }

    async fn get_valuation_reports_by_property(
        &self,
        property_id: &str,
    ) -> StoreResult<Vec<ValuationReport>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reports
            .iter()
            .filter(|r| r.property_id == property_id)
            .cloned()
            .collect())
    }

    async fn create_valuation_report(
        &self,
        report: NewValuationReport,
    ) -> StoreResult<ValuationReport> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let id = generate_id(&mut inner.rng);
        let report = ValuationReport {
            id: id.clone(),
            property_id: report.property_id,
            valuation: report.valuation,
            confidence: report.confidence,
            trend: report.trend,
            insights: report.insights,
            created_at: Utc::now(),
        };
        inner.reports.insert(id, report.clone());
        debug!("Stored valuation report {}", report.id);
        Ok(report)
    }

    async fn get_user_vote(
        &self,
        proposal_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<UserVote>> {
        Ok(self
            .inner
            .read()
            .await
            .find_vote(proposal_id, user_id)
            .cloned())
    }

    async fn create_user_vote(&self, vote: NewUserVote) -> StoreResult<UserVote> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let id = generate_id(&mut inner.rng);
        let vote = UserVote {
            id: id.clone(),
            proposal_id: vote.proposal_id,
            user_id: DEMO_USER_ID.to_string(),
            vote_type: vote.vote_type,
            created_at: Utc::now(),
        };
        inner.votes.insert(id, vote.clone());
        Ok(vote)
    }

    async fn cast_vote(
        &self,
        proposal_id: &str,
        user_id: &str,
        vote_type: VoteType,
    ) -> StoreResult<VotingProposal> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        if inner.find_vote(proposal_id, user_id).is_some() {
            return Err(StoreError::AlreadyVoted);
        }

        let now = Utc::now();
        let proposal = inner
            .proposals
            .get_mut(proposal_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "Proposal",
                id: proposal_id.to_string(),
            })?;
        if !proposal.is_open_at(now) {
            return Err(StoreError::VotingClosed);
        }

        let vote_id = generate_id(&mut inner.rng);
        proposal.record(vote_type);
        let updated = proposal.clone();
        inner.votes.insert(
            vote_id.clone(),
            UserVote {
                id: vote_id,
                proposal_id: proposal_id.to_string(),
                user_id: user_id.to_string(),
                vote_type,
                created_at: now,
            },
        );
        debug!("Recorded {} vote by {} on proposal {}", vote_type, user_id, proposal_id);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn listing(name: &str) -> NewProperty {
        NewProperty {
            name: name.to_string(),
            description: "Two bedroom flat".to_string(),
            image: "https://example.com/flat.jpg".to_string(),
        }
    }

    fn new_proposal(property_id: &str, end_in: Duration) -> NewVotingProposal {
        NewVotingProposal {
            title: "Repaint facade".to_string(),
            description: "Fresh coat before winter".to_string(),
            property_id: property_id.to_string(),
            end_date: Utc::now() + end_in,
        }
    }

    #[tokio::test]
    async fn seeded_store_has_demo_content() {
        let store = MemStorage::seeded();
        let properties = store.get_properties().await.unwrap();
        let ids: Vec<_> = properties.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        let tokens: i64 = properties.iter().map(|p| p.cw20_tokens).sum();
        assert_eq!(tokens, 15_000);
        assert_eq!(store.get_voting_proposals().await.unwrap().len(), 3);
        assert!(store.get_valuation_reports().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn created_property_gets_placeholder_figures() {
        let store = MemStorage::with_rng(StdRng::seed_from_u64(3));
        let created = store.create_property(listing("Harbor House")).await.unwrap();
        assert!((25..=74).contains(&created.nft_tokens));
        assert!((2500..=7499).contains(&created.cw20_tokens));
        assert!((1000..=2999).contains(&created.monthly_income));
        assert!((300_000..=799_999).contains(&created.valuation));

        let fetched = store.get_property(&created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn reads_keep_insertion_order() {
        let store = MemStorage::new();
        for name in ["a", "b", "c", "d"] {
            store.create_property(listing(name)).await.unwrap();
        }
        let names: Vec<_> = store
            .get_properties()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn missing_ids_are_none() {
        let store = MemStorage::seeded();
        assert!(store.get_property("nope").await.unwrap().is_none());
        assert!(store.get_voting_proposal("nope").await.unwrap().is_none());
        let update = VotingProposalUpdate {
            yes_votes: Some(1),
            ..Default::default()
        };
        assert!(store
            .update_voting_proposal("nope", update)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn new_proposal_starts_with_zero_votes() {
        let store = MemStorage::new();
        let p = store
            .create_voting_proposal(new_proposal("1", Duration::days(1)))
            .await
            .unwrap();
        assert_eq!((p.yes_votes, p.no_votes, p.total_votes), (0, 0, 0));

        let updated = store
            .update_voting_proposal(
                &p.id,
                VotingProposalUpdate {
                    title: Some("Repaint facade in blue".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Repaint facade in blue");
        assert_eq!(updated.description, p.description);
        assert_eq!(store.get_voting_proposal(&p.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn reports_filter_by_property() {
        let store = MemStorage::seeded();
        for property_id in ["1", "2", "1"] {
            store
                .create_valuation_report(NewValuationReport {
                    property_id: property_id.to_string(),
                    valuation: 1,
                    confidence: 90,
                    trend: "1.0".to_string(),
                    insights: "steady".to_string(),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.get_valuation_reports().await.unwrap().len(), 3);
        assert_eq!(
            store
                .get_valuation_reports_by_property("1")
                .await
                .unwrap()
                .len(),
            2
        );
        assert!(store
            .get_valuation_reports_by_property("9")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn created_vote_is_attributed_to_demo_user() {
        let store = MemStorage::seeded();
        let vote = store
            .create_user_vote(NewUserVote {
                proposal_id: "1".to_string(),
                vote_type: VoteType::No,
            })
            .await
            .unwrap();
        assert_eq!(vote.user_id, DEMO_USER_ID);
        let found = store.get_user_vote("1", DEMO_USER_ID).await.unwrap();
        assert_eq!(found, Some(vote));
        assert!(store.get_user_vote("1", "someone-else").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cast_vote_counts_once_per_user() {
        let store = MemStorage::seeded();
        let updated = store.cast_vote("2", DEMO_USER_ID, VoteType::Yes).await.unwrap();
        assert_eq!((updated.yes_votes, updated.no_votes, updated.total_votes), (29, 15, 44));

        let err = store
            .cast_vote("2", DEMO_USER_ID, VoteType::No)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyVoted));
        let after = store.get_voting_proposal("2").await.unwrap().unwrap();
        assert_eq!(after, updated);
    }

    #[tokio::test]
    async fn cast_vote_on_missing_proposal_writes_nothing() {
        let store = MemStorage::seeded();
        let err = store
            .cast_vote("404", DEMO_USER_ID, VoteType::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.get_user_vote("404", DEMO_USER_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cast_vote_rejects_closed_proposal() {
        let store = MemStorage::new();
        let p = store
            .create_voting_proposal(new_proposal("1", -Duration::hours(1)))
            .await
            .unwrap();
        let err = store
            .cast_vote(&p.id, DEMO_USER_ID, VoteType::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VotingClosed));
        assert!(store.get_user_vote(&p.id, DEMO_USER_ID).await.unwrap().is_none());
        assert_eq!(store.get_voting_proposal(&p.id).await.unwrap(), Some(p));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_votes_by_one_user_count_once() {
        let store = Arc::new(MemStorage::seeded());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let vote_type = if i % 2 == 0 { VoteType::Yes } else { VoteType::No };
                tokio::spawn(async move { store.cast_vote("1", DEMO_USER_ID, vote_type).await })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);

        let p = store.get_voting_proposal("1").await.unwrap().unwrap();
        assert_eq!(p.total_votes, 51);
        assert_eq!(p.total_votes, p.yes_votes + p.no_votes);
    }
}
