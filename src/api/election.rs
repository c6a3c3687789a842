use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    common::{ElectionId, Identity},
    election::{Candidate, CandidateSpec, ElectionDescription, ElectionSpec, ElectionSummary},
    payload::{CandidateAdded, ElectionCreated},
    schedule::ArmReceipt,
};
use crate::service::{ElectionStateMachine, ResultsProjector, TransitionScheduler};

pub fn routes() -> Vec<Route> {
    routes![
        elections,
        create_election,
        election,
        candidates,
        add_candidate,
        open_voting_session,
        close_voting_session,
        arm_automation,
    ]
}

#[get("/elections")]
async fn elections(projector: &State<ResultsProjector>) -> Result<Json<Vec<ElectionSummary>>> {
    Ok(Json(projector.list_all().await?))
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    caller: Identity,
    spec: Json<ElectionSpec>,
    machine: &State<ElectionStateMachine>,
) -> Result<Json<ElectionCreated>> {
    let election_id = machine.create_election(&caller, spec.0).await?;
    Ok(Json(ElectionCreated { election_id }))
}

#[get("/elections/<election_id>")]
async fn election(
    election_id: ElectionId,
    machine: &State<ElectionStateMachine>,
) -> Result<Json<ElectionDescription>> {
    Ok(Json(machine.election_details(election_id).await?.into()))
}

#[get("/elections/<election_id>/candidates")]
async fn candidates(
    election_id: ElectionId,
    projector: &State<ResultsProjector>,
) -> Result<Json<Vec<Candidate>>> {
    Ok(Json(projector.candidates(election_id).await?))
}

#[post("/elections/<election_id>/candidates", data = "<spec>", format = "json")]
async fn add_candidate(
    caller: Identity,
    election_id: ElectionId,
    spec: Json<CandidateSpec>,
    machine: &State<ElectionStateMachine>,
) -> Result<Json<CandidateAdded>> {
    let candidate_id = machine.add_candidate(&caller, election_id, &spec).await?;
    Ok(Json(CandidateAdded { candidate_id }))
}

#[post("/elections/<election_id>/open")]
async fn open_voting_session(
    caller: Identity,
    election_id: ElectionId,
    machine: &State<ElectionStateMachine>,
) -> Result<()> {
    machine.open_voting_session(&caller, election_id).await
}

#[post("/elections/<election_id>/close")]
async fn close_voting_session(
    caller: Identity,
    election_id: ElectionId,
    machine: &State<ElectionStateMachine>,
) -> Result<()> {
    machine.close_voting_session(&caller, election_id).await
}

#[post("/elections/<election_id>/automation")]
async fn arm_automation(
    caller: Identity,
    election_id: ElectionId,
    scheduler: &State<TransitionScheduler>,
) -> Result<Json<ArmReceipt>> {
    Ok(Json(scheduler.arm(&caller, election_id).await?))
}
