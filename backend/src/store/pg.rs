use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{generate_id, seed, Storage, StoreError, StoreResult, TokenAllocation};
use crate::models::{
    NewProperty, NewUserVote, NewValuationReport, NewVotingProposal, Property, UserVote,
    ValuationReport, VoteType, VotingProposal, VotingProposalUpdate, DEMO_USER_ID,
};
use crate::schema::{properties, user_votes, valuation_reports, voting_proposals};

type PgPool = Pool<ConnectionManager<PgConnection>>;

const CREATE_TABLES: &str =
    include_str!("../../migrations/2024-01-01-000000_create_dao_tables/up.sql");

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = properties)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct PropertyRow {
    id: String,
    name: String,
    description: String,
    image: String,
    nft_tokens: i64,
    cw20_tokens: i64,
    monthly_income: i64,
    valuation: i64,
    created_at: DateTime<Utc>,
}

impl From<PropertyRow> for Property {
    fn from(row: PropertyRow) -> Self {
        Property {
            id: row.id,
            name: row.name,
            description: row.description,
            image: row.image,
            nft_tokens: row.nft_tokens,
            cw20_tokens: row.cw20_tokens,
            monthly_income: row.monthly_income,
            valuation: row.valuation,
            created_at: row.created_at,
        }
    }
}

impl From<Property> for PropertyRow {
    fn from(p: Property) -> Self {
        PropertyRow {
            id: p.id,
            name: p.name,
            description: p.description,
            image: p.image,
            nft_tokens: p.nft_tokens,
            cw20_tokens: p.cw20_tokens,
            monthly_income: p.monthly_income,
            valuation: p.valuation,
            created_at: p.created_at,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = voting_proposals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ProposalRow {
    id: String,
    title: String,
    description: String,
    property_id: String,
    yes_votes: i64,
    no_votes: i64,
    total_votes: i64,
    end_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<ProposalRow> for VotingProposal {
    fn from(row: ProposalRow) -> Self {
        VotingProposal {
            id: row.id,
            title: row.title,
            description: row.description,
            property_id: row.property_id,
            yes_votes: row.yes_votes,
            no_votes: row.no_votes,
            total_votes: row.total_votes,
            end_date: row.end_date,
            created_at: row.created_at,
        }
    }
}

impl From<VotingProposal> for ProposalRow {
    fn from(p: VotingProposal) -> Self {
        ProposalRow {
            id: p.id,
            title: p.title,
            description: p.description,
            property_id: p.property_id,
            yes_votes: p.yes_votes,
            no_votes: p.no_votes,
            total_votes: p.total_votes,
            end_date: p.end_date,
            created_at: p.created_at,
        }
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = voting_proposals)]
struct ProposalChangeset {
    title: Option<String>,
    description: Option<String>,
    property_id: Option<String>,
    yes_votes: Option<i64>,
    no_votes: Option<i64>,
    total_votes: Option<i64>,
    end_date: Option<DateTime<Utc>>,
}

impl From<VotingProposalUpdate> for ProposalChangeset {
    fn from(u: VotingProposalUpdate) -> Self {
        ProposalChangeset {
            title: u.title,
            description: u.description,
            property_id: u.property_id,
            yes_votes: u.yes_votes,
            no_votes: u.no_votes,
            total_votes: u.total_votes,
            end_date: u.end_date,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = valuation_reports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ReportRow {
    id: String,
    property_id: String,
    valuation: i64,
    confidence: i64,
    trend: String,
    insights: String,
    created_at: DateTime<Utc>,
}

impl From<ReportRow> for ValuationReport {
    fn from(row: ReportRow) -> Self {
        ValuationReport {
            id: row.id,
            property_id: row.property_id,
            valuation: row.valuation,
            confidence: row.confidence,
            trend: row.trend,
            insights: row.insights,
            created_at: row.created_at,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = user_votes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct VoteRow {
    id: String,
    proposal_id: String,
    user_id: String,
    vote_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<VoteRow> for UserVote {
    type Error = StoreError;

    fn try_from(row: VoteRow) -> Result<Self, Self::Error> {
        Ok(UserVote {
            vote_type: row.vote_type.parse().map_err(StoreError::Backend)?,
            id: row.id,
            proposal_id: row.proposal_id,
            user_id: row.user_id,
            created_at: row.created_at,
        })
    }
}

/// Postgres-backed store. Diesel is synchronous, so every call is moved onto
/// the blocking pool with its own pooled connection.
pub struct PgStorage {
    pool: PgPool,
    rng: Mutex<StdRng>,
}

impl PgStorage {
    pub fn connect(database_url: &str) -> StoreResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .build(manager)
            .map_err(|e| StoreError::Backend(format!("Failed to create pool: {}", e)))?;
        let mut conn = pool
            .get()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        conn.batch_execute(CREATE_TABLES)?;
        info!("Connected to Postgres and ensured schema");
        Ok(Self {
            pool,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Inserts the demo rows unless rows with the same ids already exist.
    pub fn load_sample_data(&self) -> StoreResult<()> {
        let now = Utc::now();
        let properties: Vec<PropertyRow> = seed::sample_properties(now)
            .into_iter()
            .map(PropertyRow::from)
            .collect();
        let proposals: Vec<ProposalRow> = seed::sample_proposals(now)
            .into_iter()
            .map(ProposalRow::from)
            .collect();

        let mut conn = self
            .pool
            .get()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let inserted = diesel::insert_into(properties::table)
            .values(&properties)
            .on_conflict_do_nothing()
            .execute(&mut conn)?
            + diesel::insert_into(voting_proposals::table)
                .values(&proposals)
                .on_conflict_do_nothing()
                .execute(&mut conn)?;
        info!("Seeded {} sample rows", inserted);
        Ok(())
    }

    fn next_id(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        generate_id(&mut *rng)
    }

    async fn run<F, T>(&self, job: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            job(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_properties(&self) -> StoreResult<Vec<Property>> {
        self.run(|conn| {
            let rows = properties::table
                .order((properties::created_at.asc(), properties::id.asc()))
                .select(PropertyRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(Property::from).collect())
        })
        .await
    }

    async fn get_property(&self, id: &str) -> StoreResult<Option<Property>> {
        let id = id.to_string();
        self.run(move |conn| {
            let row = properties::table
                .find(id)
                .select(PropertyRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(Property::from))
        })
        .await
    }

    async fn create_property(&self, property: NewProperty) -> StoreResult<Property> {
        let tokens = {
            let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
            TokenAllocation::draw(&mut *rng)
        };
        let row = PropertyRow {
            id: self.next_id(),
            name: property.name,
            description: property.description,
            image: property.image,
            nft_tokens: tokens.nft_tokens,
            cw20_tokens: tokens.cw20_tokens,
            monthly_income: tokens.monthly_income,
            valuation: tokens.valuation,
            created_at: Utc::now(),
        };
        self.run(move |conn| {
            let stored = diesel::insert_into(properties::table)
                .values(&row)
                .returning(PropertyRow::as_returning())
                .get_result(conn)?;
            Ok(Property::from(stored))
        })
        .await
    }

    async fn get_voting_proposals(&self) -> StoreResult<Vec<VotingProposal>> {
        self.run(|conn| {
            let rows = voting_proposals::table
                .order((voting_proposals::created_at.asc(), voting_proposals::id.asc()))
                .select(ProposalRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(VotingProposal::from).collect())
        })
        .await
    }

    async fn get_voting_proposal(&self, id: &str) -> StoreResult<Option<VotingProposal>> {
        let id = id.to_string();
        self.run(move |conn| {
            let row = voting_proposals::table
                .find(id)
                .select(ProposalRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(VotingProposal::from))
        })
        .await
    }

    async fn create_voting_proposal(
        &self,
        proposal: NewVotingProposal,
    ) -> StoreResult<VotingProposal> {
        let row = ProposalRow {
            id: self.next_id(),
            title: proposal.title,
            description: proposal.description,
            property_id: proposal.property_id,
            yes_votes: 0,
            no_votes: 0,
            total_votes: 0,
            end_date: proposal.end_date,
            created_at: Utc::now(),
        };
        self.run(move |conn| {
            let stored = diesel::insert_into(voting_proposals::table)
                .values(&row)
                .returning(ProposalRow::as_returning())
                .get_result(conn)?;
            Ok(VotingProposal::from(stored))
        })
        .await
    }

    async fn update_voting_proposal(
        &self,
        id: &str,
        update: VotingProposalUpdate,
    ) -> StoreResult<Option<VotingProposal>> {
        if update == VotingProposalUpdate::default() {
            return self.get_voting_proposal(id).await;
        }
        let id = id.to_string();
        let changes = ProposalChangeset::from(update);
        self.run(move |conn| {
            let row = diesel::update(voting_proposals::table.find(id))
                .set(&changes)
                .returning(ProposalRow::as_returning())
                .get_result(conn)
                .optional()?;
            Ok(row.map(VotingProposal::from))
        })
        .await
    }

    async fn get_valuation_reports(&self) -> StoreResult<Vec<ValuationReport>> {
        self.run(|conn| {
            let rows = valuation_reports::table
                .order(valuation_reports::created_at.asc())
                .select(ReportRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(ValuationReport::from).collect())
        })
        .await
    }

    async fn get_valuation_reports_by_property(
        &self,
        property_id: &str,
    ) -> StoreResult<Vec<ValuationReport>> {
        let property_id = property_id.to_string();
        self.run(move |conn| {
            let rows = valuation_reports::table
                .filter(valuation_reports::property_id.eq(property_id))
                .order(valuation_reports::created_at.asc())
                .select(ReportRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(ValuationReport::from).collect())
        })
        .await
    }

    async fn create_valuation_report(
        &self,
        report: NewValuationReport,
    ) -> StoreResult<ValuationReport> {
        let row = ReportRow {
            id: self.next_id(),
            property_id: report.property_id,
            valuation: report.valuation,
            confidence: report.confidence,
            trend: report.trend,
            insights: report.insights,
            created_at: Utc::now(),
        };
        self.run(move |conn| {
            let stored = diesel::insert_into(valuation_reports::table)
                .values(&row)
                .returning(ReportRow::as_returning())
                .get_result(conn)?;
            Ok(ValuationReport::from(stored))
        })
        .await
    }

    async fn get_user_vote(
        &self,
        proposal_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<UserVote>> {
        let proposal_id = proposal_id.to_string();
        let user_id = user_id.to_string();
        self.run(move |conn| {
            user_votes::table
                .filter(user_votes::proposal_id.eq(proposal_id))
                .filter(user_votes::user_id.eq(user_id))
                .select(VoteRow::as_select())
                .first(conn)
                .optional()?
                .map(UserVote::try_from)
                .transpose()
        })
        .await
    }

    async fn create_user_vote(&self, vote: NewUserVote) -> StoreResult<UserVote> {
        let row = VoteRow {
            id: self.next_id(),
            proposal_id: vote.proposal_id,
            user_id: DEMO_USER_ID.to_string(),
            vote_type: vote.vote_type.as_str().to_string(),
            created_at: Utc::now(),
        };
        self.run(move |conn| {
            let stored = diesel::insert_into(user_votes::table)
                .values(&row)
                .returning(VoteRow::as_returning())
                .get_result(conn)?;
            UserVote::try_from(stored)
        })
        .await
    }

    async fn cast_vote(
        &self,
        proposal_id: &str,
        user_id: &str,
        vote_type: VoteType,
    ) -> StoreResult<VotingProposal> {
        let vote = VoteRow {
            id: self.next_id(),
            proposal_id: proposal_id.to_string(),
            user_id: user_id.to_string(),
            vote_type: vote_type.as_str().to_string(),
            created_at: Utc::now(),
        };
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                // The row lock serializes ballots on this proposal until commit.
                let locked = voting_proposals::table
                    .find(&vote.proposal_id)
                    .select(ProposalRow::as_select())
                    .for_update()
                    .first(conn)
                    .optional()?;

                let existing = user_votes::table
                    .filter(user_votes::proposal_id.eq(&vote.proposal_id))
                    .filter(user_votes::user_id.eq(&vote.user_id))
                    .select(user_votes::id)
                    .first::<String>(conn)
                    .optional()?;
                if existing.is_some() {
                    return Err(StoreError::AlreadyVoted);
                }

                let mut proposal = VotingProposal::from(locked.ok_or_else(|| {
                    StoreError::NotFound {
                        entity: "Proposal",
                        id: vote.proposal_id.clone(),
                    }
                })?);
                if !proposal.is_open_at(vote.created_at) {
                    return Err(StoreError::VotingClosed);
                }

                diesel::insert_into(user_votes::table)
                    .values(&vote)
                    .execute(conn)
                    .map_err(|err| match err {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            StoreError::AlreadyVoted
                        }
                        other => StoreError::from(other),
                    })?;

                proposal.record(vote_type);
                diesel::update(voting_proposals::table.find(&proposal.id))
                    .set((
                        voting_proposals::yes_votes.eq(proposal.yes_votes),
                        voting_proposals::no_votes.eq(proposal.no_votes),
                        voting_proposals::total_votes.eq(proposal.total_votes),
                    ))
                    .execute(conn)?;
                Ok(proposal)
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row_for(vote_type: &str) -> VoteRow {
        VoteRow {
            id: "v1".to_string(),
            proposal_id: "1".to_string(),
            user_id: DEMO_USER_ID.to_string(),
            vote_type: vote_type.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn property_and_proposal_rows_convert_both_ways() {
        let now = Utc::now();
        for property in seed::sample_properties(now) {
            assert_eq!(Property::from(PropertyRow::from(property.clone())), property);
        }
        for proposal in seed::sample_proposals(now) {
            let row = ProposalRow::from(proposal.clone());
            assert_eq!(row.total_votes, row.yes_votes + row.no_votes);
            assert_eq!(VotingProposal::from(row), proposal);
        }
    }

    #[test]
    fn vote_rows_parse_stored_vote_type() {
        for vote_type in [VoteType::Yes, VoteType::No] {
            let vote = UserVote::try_from(row_for(vote_type.as_str())).unwrap();
            assert_eq!(vote.vote_type, vote_type);
            assert_eq!(vote.user_id, DEMO_USER_ID);
        }
        let err = UserVote::try_from(row_for("maybe")).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn changeset_carries_only_supplied_fields() {
        let changes = ProposalChangeset::from(VotingProposalUpdate {
            yes_votes: Some(7),
            ..Default::default()
        });
        assert_eq!(changes.yes_votes, Some(7));
        assert!(changes.no_votes.is_none());
        assert!(changes.total_votes.is_none());
        assert!(changes.title.is_none());
        assert!(changes.end_date.is_none());
    }

    /// Connects to `DATABASE_URL`; tests that need a live server skip without it.
    fn live_storage() -> Option<PgStorage> {
        let url = std::env::var("DATABASE_URL").ok()?;
        Some(PgStorage::connect(&url).unwrap())
    }

    async fn open_proposal(storage: &PgStorage) -> VotingProposal {
        let property = storage
            .create_property(NewProperty {
                name: "Harbor Flat".to_string(),
                description: "Two bedrooms by the marina".to_string(),
                image: "https://example.com/flat.jpg".to_string(),
            })
            .await
            .unwrap();
        storage
            .create_voting_proposal(NewVotingProposal {
                title: "Repaint the facade".to_string(),
                description: "Refresh the exterior".to_string(),
                property_id: property.id,
                end_date: Utc::now() + Duration::days(3),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn partial_tally_update_is_stored_as_given() {
        let Some(storage) = live_storage() else {
            return;
        };
        let proposal = open_proposal(&storage).await;

        let updated = storage
            .update_voting_proposal(
                &proposal.id,
                VotingProposalUpdate {
                    yes_votes: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.yes_votes, 5);
        assert_eq!(updated.no_votes, 0);
        assert_eq!(updated.total_votes, 0);

        let missing = storage
            .update_voting_proposal("missing", VotingProposalUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn second_ballot_is_rejected() {
        let Some(storage) = live_storage() else {
            return;
        };
        let proposal = open_proposal(&storage).await;

        let tallied = storage
            .cast_vote(&proposal.id, DEMO_USER_ID, VoteType::No)
            .await
            .unwrap();
        assert_eq!((tallied.yes_votes, tallied.no_votes, tallied.total_votes), (0, 1, 1));

        let err = storage
            .cast_vote(&proposal.id, DEMO_USER_ID, VoteType::Yes)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyVoted));

        let vote = storage
            .get_user_vote(&proposal.id, DEMO_USER_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vote.vote_type, VoteType::No);
    }
}
