use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use log::info;

use super::error::{ApiError, ApiResult, StoreResultExt};
use super::AppState;
use crate::models::{
    NewVotingProposal, UserVoteStatus, VoteRequest, VotingProposal, DEMO_USER_ID,
};
use crate::store::StoreError;

pub async fn list_proposals(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<VotingProposal>>> {
    let proposals = state
        .storage
        .get_voting_proposals()
        .await
        .or_fail("Failed to fetch voting proposals")?;
    Ok(Json(proposals))
}

pub async fn get_proposal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<VotingProposal>> {
    state
        .storage
        .get_voting_proposal(&id)
        .await
        .or_fail("Failed to fetch voting proposal")?
        .map(Json)
        .ok_or(ApiError::NotFound("Proposal not found"))
}

/// Opens a new proposal against an existing property.
pub async fn create_proposal(
    State(state): State<AppState>,
    payload: Result<Json<NewVotingProposal>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<VotingProposal>)> {
    let Json(new_proposal) =
        payload.map_err(|e| ApiError::invalid_json("Invalid proposal data", e))?;

    let property = state
        .storage
        .get_property(&new_proposal.property_id)
        .await
        .or_fail("Failed to create voting proposal")?;
    if property.is_none() {
        return Err(ApiError::NotFound("Property not found"));
    }

    let proposal = state
        .storage
        .create_voting_proposal(new_proposal)
        .await
        .or_fail("Failed to create voting proposal")?;
    info!(
        "Opened proposal {} on property {}",
        proposal.id, proposal.property_id
    );
    Ok((StatusCode::CREATED, Json(proposal)))
}

/// Casts the demo user's vote and returns the proposal with updated counters.
pub async fn cast_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<Json<VotingProposal>> {
    let existing = state
        .storage
        .get_user_vote(&id, DEMO_USER_ID)
        .await
        .or_fail("Failed to cast vote")?;
    if existing.is_some() {
        return Err(ApiError::Conflict(StoreError::AlreadyVoted.to_string()));
    }
    let proposal = state
        .storage
        .get_voting_proposal(&id)
        .await
        .or_fail("Failed to cast vote")?;
    if proposal.is_none() {
        return Err(ApiError::NotFound("Proposal not found"));
    }

    // Unknown and already-voted proposals are reported ahead of a malformed body.
    let Json(request) = payload.map_err(|e| ApiError::invalid_json("Invalid vote data", e))?;
    info!("Casting {} vote on proposal {}", request.vote_type, id);
    let proposal = state
        .storage
        .cast_vote(&id, DEMO_USER_ID, request.vote_type)
        .await
        .or_fail("Failed to cast vote")?;
    Ok(Json(proposal))
}

pub async fn user_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserVoteStatus>> {
    let vote = state
        .storage
        .get_user_vote(&id, DEMO_USER_ID)
        .await
        .or_fail("Failed to check user vote")?;
    Ok(Json(UserVoteStatus {
        has_voted: vote.is_some(),
        vote,
    }))
}
