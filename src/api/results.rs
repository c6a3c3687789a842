use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    common::ElectionId,
    election::ElectionSummary,
    results::{CandidateResult, Standings},
};
use crate::service::ResultsProjector;

pub fn routes() -> Vec<Route> {
    routes![ongoing, completed, results, standings]
}

#[get("/elections/ongoing")]
async fn ongoing(projector: &State<ResultsProjector>) -> Result<Json<Vec<ElectionSummary>>> {
    Ok(Json(projector.list_ongoing().await?))
}

#[get("/elections/completed")]
async fn completed(projector: &State<ResultsProjector>) -> Result<Json<Vec<ElectionSummary>>> {
    Ok(Json(projector.list_completed().await?))
}

#[get("/elections/<election_id>/results")]
async fn results(
    election_id: ElectionId,
    projector: &State<ResultsProjector>,
) -> Result<Json<Vec<CandidateResult>>> {
    Ok(Json(projector.results(election_id).await?))
}

#[get("/elections/<election_id>/standings")]
async fn standings(
    election_id: ElectionId,
    projector: &State<ResultsProjector>,
) -> Result<Json<Standings>> {
    Ok(Json(projector.standings(election_id).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client, serde::json::Value};

    use super::*;
    use crate::api::testing::get_json;
    use crate::ledger::{ElectionStore, SharedLedger};
    use crate::model::{
        common::Transition,
        election::{Election, VoterSpec},
        results::Outcome,
    };

    async fn seed(ledger: &SharedLedger, id: ElectionId, transitions: &[Transition]) {
        ledger
            .insert_election(&Election::public_example(id))
            .await
            .unwrap();
        for &transition in transitions {
            ledger
                .modify_election(id, &mut |e| e.apply(transition).map(|_| ()))
                .await
                .unwrap();
        }
    }

    fn ids(summaries: &[ElectionSummary]) -> Vec<ElectionId> {
        summaries.iter().map(|s| s.id).collect()
    }

    #[backend_test]
    async fn listings_by_status(client: Client, ledger: SharedLedger) {
        seed(&ledger, 1, &[]).await;
        seed(&ledger, 2, &[Transition::Open]).await;
        seed(&ledger, 3, &[Transition::Open, Transition::Close]).await;
        seed(&ledger, 4, &[Transition::Open]).await;

        let ongoing: Vec<ElectionSummary> = get_json(&client, "/elections/ongoing".into()).await;
        assert_eq!(ids(&ongoing), vec![2, 4]);
        let completed: Vec<ElectionSummary> =
            get_json(&client, "/elections/completed".into()).await;
        assert_eq!(ids(&completed), vec![3]);
        assert_eq!(completed[0].candidate_count, 2);
    }

    #[backend_test]
    async fn standings_expose_ties(client: Client, ledger: SharedLedger) {
        seed(&ledger, 1, &[Transition::Open]).await;
        for (candidate_id, voter) in [(1, "V1"), (2, "V2")] {
            ledger
                .modify_election(1, &mut |e| {
                    e.cast_vote(candidate_id, &VoterSpec::anonymous(voter))
                })
                .await
                .unwrap();
        }

        let standings: Standings = get_json(&client, "/elections/1/standings".into()).await;
        assert!(!standings.is_final);
        match standings.outcome {
            Outcome::Tie(tied) => assert_eq!(tied.len(), 2),
            other => panic!("expected a tie, got {other:?}"),
        }

        // Wire format of the outcome.
        let raw: Value = get_json(&client, "/elections/1/standings".into()).await;
        assert_eq!(raw["final"], false);
        assert_eq!(raw["outcome"]["kind"], "tie");
    }

    #[backend_test]
    async fn results_need_an_election(client: Client) {
        let response = client.get("/elections/5/results").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let response = client.get("/elections/5/standings").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
