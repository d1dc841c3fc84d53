use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only user the demo models. Every vote is cast on its behalf.
pub const DEMO_USER_ID: &str = "user1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image: String,
    pub nft_tokens: i64,
    pub cw20_tokens: i64,
    pub monthly_income: i64,
    pub valuation: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields a client supplies when listing a property. Token counts, income
/// and valuation are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    pub name: String,
    pub description: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingProposal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub property_id: String,
    pub yes_votes: i64,
    pub no_votes: i64,
    pub total_votes: i64,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VotingProposal {
    /// A proposal accepts votes until its end date passes.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.end_date > now
    }

    /// Counts one more ballot, keeping `total_votes == yes_votes + no_votes`.
    pub fn record(&mut self, vote_type: VoteType) {
        match vote_type {
            VoteType::Yes => self.yes_votes += 1,
            VoteType::No => self.no_votes += 1,
        }
        self.total_votes += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVotingProposal {
    pub title: String,
    pub description: String,
    pub property_id: String,
    pub end_date: DateTime<Utc>,
}

/// Shallow overwrite of a proposal: every `Some` field replaces the stored one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingProposalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub property_id: Option<String>,
    pub yes_votes: Option<i64>,
    pub no_votes: Option<i64>,
    pub total_votes: Option<i64>,
    pub end_date: Option<DateTime<Utc>>,
}

impl VotingProposalUpdate {
    pub fn apply_to(self, proposal: &mut VotingProposal) {
        if let Some(title) = self.title {
            proposal.title = title;
        }
        if let Some(description) = self.description {
            proposal.description = description;
        }
        if let Some(property_id) = self.property_id {
            proposal.property_id = property_id;
        }
        if let Some(yes_votes) = self.yes_votes {
            proposal.yes_votes = yes_votes;
        }
        if let Some(no_votes) = self.no_votes {
            proposal.no_votes = no_votes;
        }
        if let Some(total_votes) = self.total_votes {
            proposal.total_votes = total_votes;
        }
        if let Some(end_date) = self.end_date {
            proposal.end_date = end_date;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationReport {
    pub id: String,
    pub property_id: String,
    pub valuation: i64,
    pub confidence: i64,
    pub trend: String,
    pub insights: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewValuationReport {
    pub property_id: String,
    pub valuation: i64,
    pub confidence: i64,
    pub trend: String,
    pub insights: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Yes,
    No,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Yes => "yes",
            VoteType::No => "no",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(VoteType::Yes),
            "no" => Ok(VoteType::No),
            other => Err(format!("unknown vote type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVote {
    pub id: String,
    pub proposal_id: String,
    pub user_id: String,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserVote {
    pub proposal_id: String,
    pub vote_type: VoteType,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub vote_type: VoteType,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub property_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    pub property_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVoteStatus {
    pub has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vote: Option<UserVote>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_properties: i64,
    pub total_tokens: i64,
    pub monthly_income: i64,
    pub active_votes: i64,
}

impl DashboardStats {
    pub fn compute(
        properties: &[Property],
        proposals: &[VotingProposal],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            total_properties: properties.len() as i64,
            total_tokens: properties.iter().map(|p| p.cw20_tokens).sum(),
            monthly_income: properties.iter().map(|p| p.monthly_income).sum(),
            active_votes: proposals.iter().filter(|p| p.is_open_at(now)).count() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn proposal(end_date: DateTime<Utc>) -> VotingProposal {
        VotingProposal {
            id: "p".to_string(),
            title: "Fix the roof".to_string(),
            description: "Replace shingles".to_string(),
            property_id: "1".to_string(),
            yes_votes: 3,
            no_votes: 1,
            total_votes: 4,
            end_date,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn record_keeps_total_in_sync() {
        let mut p = proposal(Utc::now() + Duration::days(1));
        p.record(VoteType::Yes);
        p.record(VoteType::No);
        p.record(VoteType::No);
        assert_eq!(p.yes_votes, 4);
        assert_eq!(p.no_votes, 3);
        assert_eq!(p.total_votes, p.yes_votes + p.no_votes);
    }

    #[test]
    fn update_overwrites_only_given_fields() {
        let mut p = proposal(Utc::now());
        VotingProposalUpdate {
            yes_votes: Some(10),
            total_votes: Some(11),
            ..Default::default()
        }
        .apply_to(&mut p);
        assert_eq!(p.yes_votes, 10);
        assert_eq!(p.no_votes, 1);
        assert_eq!(p.total_votes, 11);
        assert_eq!(p.title, "Fix the roof");
    }

    #[test]
    fn vote_type_uses_lowercase_wire_names() {
        let v: VoteRequest = serde_json::from_str(r#"{"voteType":"no"}"#).unwrap();
        assert_eq!(v.vote_type, VoteType::No);
        assert!(serde_json::from_str::<VoteRequest>(r#"{"voteType":"maybe"}"#).is_err());
        assert_eq!("yes".parse::<VoteType>().unwrap(), VoteType::Yes);
    }

    #[test]
    fn user_vote_status_omits_missing_vote() {
        let body = serde_json::to_value(UserVoteStatus {
            has_voted: false,
            vote: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "hasVoted": false }));
    }

    #[test]
    fn dashboard_counts_only_open_proposals() {
        let now = Utc::now();
        let proposals = vec![
            proposal(now + Duration::days(2)),
            proposal(now - Duration::days(2)),
        ];
        let stats = DashboardStats::compute(&[], &proposals, now);
        assert_eq!(stats.total_properties, 0);
        assert_eq!(stats.total_tokens, 0);
        assert_eq!(stats.active_votes, 1);
    }
}
