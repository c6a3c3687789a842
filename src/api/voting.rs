use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    common::ElectionId,
    payload::{VoteRequest, VotingToken},
};
use crate::service::ElectionStateMachine;

pub fn routes() -> Vec<Route> {
    routes![issue_token, vote]
}

#[post("/elections/<election_id>/tokens")]
async fn issue_token(
    election_id: ElectionId,
    machine: &State<ElectionStateMachine>,
) -> Result<Json<VotingToken>> {
    let voter_id = machine.issue_voting_token(election_id).await?;
    Ok(Json(VotingToken { voter_id }))
}

/// Cast a vote. The voter identifies themselves in the ballot.
#[post("/elections/<election_id>/vote", data = "<ballot>", format = "json")]
async fn vote(
    election_id: ElectionId,
    ballot: Json<VoteRequest>,
    machine: &State<ElectionStateMachine>,
) -> Result<()> {
    machine
        .vote(election_id, ballot.candidate_id, &ballot.voter)
        .await
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
    };

    use super::*;
    use crate::api::testing::{as_owner, get_json, post_json};
    use crate::model::{
        common::{CandidateId, ElectionStatus},
        election::{CandidateSpec, ElectionDescription, ElectionSpec, VoterSpec},
        payload::ElectionCreated,
        results::CandidateResult,
    };

    /// Create an election with candidates Alice and Bob and open it.
    async fn open_election(client: &Client, spec: ElectionSpec) -> ElectionId {
        let response = client
            .post("/elections")
            .header(ContentType::JSON)
            .header(as_owner(client))
            .json(&spec)
            .dispatch()
            .await;
        let created: ElectionCreated = response.into_json().await.unwrap();
        let id = created.election_id;
        for name in ["Alice", "Bob"] {
            let (status, _) = post_json(
                client,
                format!("/elections/{id}/candidates"),
                as_owner(client),
                &CandidateSpec::new(name, ""),
            )
            .await;
            assert_eq!(status, Status::Ok);
        }
        let response = client
            .post(format!("/elections/{id}/open"))
            .header(as_owner(client))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        id
    }

    async fn cast(client: &Client, id: ElectionId, candidate_id: CandidateId, voter: VoterSpec) -> Status {
        client
            .post(format!("/elections/{id}/vote"))
            .json(&VoteRequest {
                candidate_id,
                voter,
            })
            .dispatch()
            .await
            .status()
    }

    async fn results(client: &Client, id: ElectionId) -> Vec<(String, u64)> {
        let results: Vec<CandidateResult> =
            get_json(client, format!("/elections/{id}/results")).await;
        results.into_iter().map(|r| (r.name, r.vote_count)).collect()
    }

    #[backend_test]
    async fn public_voters_vote_once(client: Client) {
        let id = open_election(&client, ElectionSpec::public_example()).await;

        let v1 = VoterSpec {
            name: "Victor".to_string(),
            email: "victor@example.com".to_string(),
            ..VoterSpec::anonymous("V1")
        };
        assert_eq!(cast(&client, id, 1, v1.clone()).await, Status::Ok);
        assert_eq!(cast(&client, id, 2, v1).await, Status::Conflict);
        assert_eq!(
            results(&client, id).await,
            vec![("Alice".to_string(), 1), ("Bob".to_string(), 0)]
        );

        // The public voter is on record with the details they gave.
        let election: ElectionDescription = get_json(&client, format!("/elections/{id}")).await;
        assert_eq!(election.voters.len(), 1);
        assert_eq!(election.voters[0].name, "Victor");
        assert!(election.voters[0].has_voted);
    }

    #[backend_test]
    async fn private_voters_must_be_on_roster(client: Client) {
        let id = open_election(&client, ElectionSpec::private_example()).await;

        assert_eq!(
            cast(&client, id, 1, VoterSpec::anonymous("V3")).await,
            Status::Forbidden
        );
        assert_eq!(cast(&client, id, 1, VoterSpec::example1()).await, Status::Ok);
        assert_eq!(
            cast(&client, id, 2, VoterSpec::example1()).await,
            Status::Conflict
        );

        let close = client
            .post(format!("/elections/{id}/close"))
            .header(as_owner(&client))
            .dispatch()
            .await;
        assert_eq!(close.status(), Status::Ok);
        let reopen = client
            .post(format!("/elections/{id}/open"))
            .header(as_owner(&client))
            .dispatch()
            .await;
        assert_eq!(reopen.status(), Status::Conflict);
        assert_eq!(cast(&client, id, 2, VoterSpec::example2()).await, Status::Conflict);
        assert_eq!(
            results(&client, id).await,
            vec![("Alice".to_string(), 1), ("Bob".to_string(), 0)]
        );
    }

    #[backend_test]
    async fn unknown_candidates_are_not_found(client: Client) {
        let id = open_election(&client, ElectionSpec::public_example()).await;
        assert_eq!(
            cast(&client, id, 3, VoterSpec::anonymous("V1")).await,
            Status::NotFound
        );
        assert_eq!(
            cast(&client, id + 1, 1, VoterSpec::anonymous("V1")).await,
            Status::NotFound
        );
    }

    #[backend_test]
    async fn blank_voter_ids_are_rejected(client: Client) {
        let id = open_election(&client, ElectionSpec::public_example()).await;
        assert_eq!(
            cast(&client, id, 1, VoterSpec::anonymous("  ")).await,
            Status::BadRequest
        );
    }

    #[backend_test]
    async fn tokens_identify_public_voters(client: Client) {
        let id = open_election(&client, ElectionSpec::public_example()).await;

        let mut tokens = Vec::new();
        for _ in 0..2 {
            let response = client.post(format!("/elections/{id}/tokens")).dispatch().await;
            assert_eq!(response.status(), Status::Ok);
            let token: VotingToken = response.into_json().await.unwrap();
            tokens.push(token.voter_id);
        }
        assert_ne!(tokens[0], tokens[1]);

        for (candidate_id, token) in [(1, &tokens[0]), (2, &tokens[1])] {
            let voter = VoterSpec::anonymous(token.clone());
            assert_eq!(cast(&client, id, candidate_id, voter).await, Status::Ok);
        }
        let voter = VoterSpec::anonymous(tokens[0].clone());
        assert_eq!(cast(&client, id, 2, voter).await, Status::Conflict);
        assert_eq!(
            results(&client, id).await,
            vec![("Alice".to_string(), 1), ("Bob".to_string(), 1)]
        );
    }

    #[backend_test]
    async fn concurrent_votes_are_serialised(client: Client) {
        let id = open_election(&client, ElectionSpec::public_example()).await;
        let machine = client.rocket().state::<ElectionStateMachine>().unwrap();

        // Distinct voters racing on separate tasks must all be counted.
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let machine = machine.clone();
                rocket::tokio::spawn(async move {
                    machine
                        .vote(id, 1 + i % 2, &VoterSpec::anonymous(format!("V{i}")))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let election = machine.election_details(id).await.unwrap();
        assert_eq!(election.status, ElectionStatus::Open);
        assert_eq!(
            results(&client, id).await,
            vec![("Alice".to_string(), 25), ("Bob".to_string(), 25)]
        );
        assert_eq!(election.voters.len(), 50);
    }
}
