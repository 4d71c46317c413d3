use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            results::ElectionResults,
            voting::{
                CandidateList, ElectionStatus, Receipt, UserVotingStatus, VoteRequest, VotingStats,
            },
        },
        db::Voter,
    },
    service::ElectionService,
};

pub fn routes() -> Vec<Route> {
    routes![status, stats, candidates, user_status, vote, results]
}

#[get("/voting/status")]
async fn status(service: &State<ElectionService>) -> Result<Json<ElectionStatus>> {
    Ok(Json(service.status().await?))
}

#[get("/voting/stats")]
async fn stats(
    token: Option<AuthToken<Voter>>,
    service: &State<ElectionService>,
) -> Result<Json<VotingStats>> {
    let voter = token.map(|token| token.id);
    Ok(Json(service.voting_stats(voter).await?))
}

/// The ballot. Vote counts are not included.
#[get("/voting/candidates")]
async fn candidates(service: &State<ElectionService>) -> Result<Json<CandidateList>> {
    let candidates = service
        .candidates()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(CandidateList { candidates }))
}

#[get("/voting/user-status")]
async fn user_status(
    token: AuthToken<Voter>,
    service: &State<ElectionService>,
) -> Result<Json<UserVotingStatus>> {
    Ok(Json(service.user_status(token.id).await?))
}

#[post("/voting/vote", data = "<ballot>", format = "json")]
async fn vote(
    token: AuthToken<Voter>,
    ballot: Json<VoteRequest>,
    service: &State<ElectionService>,
) -> Result<Json<Receipt>> {
    Ok(Json(service.submit_vote(token.id, &ballot.candidate_id).await?))
}

#[get("/voting/results")]
async fn results(service: &State<ElectionService>) -> Result<Json<ElectionResults>> {
    Ok(Json(service.results().await?))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{json, Value},
    };

    use crate::model::api::{
        admin::ToggleResponse,
        candidate::{AdminCandidate, CandidateSpec},
    };

    use super::*;

    fn service(client: &Client) -> &ElectionService {
        client.rocket().state::<ElectionService>().unwrap()
    }

    async fn add_candidates(client: &Client) -> Vec<String> {
        let mut ids = Vec::new();
        for spec in [CandidateSpec::example1(), CandidateSpec::example2()] {
            let candidate: AdminCandidate = service(client).add_candidate(spec).await.unwrap().into();
            ids.push(candidate.description.id.to_string());
        }
        ids
    }

    async fn cast<'c>(client: &'c Client, candidate_id: &str) -> LocalResponse<'c> {
        client
            .post("/api/voting/vote")
            .header(ContentType::JSON)
            .body(json!({ "candidateId": candidate_id }).to_string())
            .dispatch()
            .await
    }

    #[backend_test]
    async fn status_of_fresh_election(client: Client) {
        let response = client.get("/api/voting/status").dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let status = response.into_json::<ElectionStatus>().await.unwrap();
        assert!(!status.is_active);
        assert_eq!(status.title, "General Election");
        assert_eq!(status.start_date, None);
        assert_eq!(status.end_date, None);
    }

    #[backend_test]
    async fn candidates_hide_votes(client: Client) {
        add_candidates(&client).await;
        let response = client.get("/api/voting/candidates").dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let body = response.into_json::<Value>().await.unwrap();
        let candidates = body["candidates"].as_array().unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0]["name"], "John Smith");
        assert!(candidates[0]["_id"].is_string());
        assert!(candidates[0].get("votes").is_none());
    }

    #[backend_test]
    async fn stats_without_sign_in(client: Client) {
        let response = client.get("/api/voting/stats").dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let stats = response.into_json::<VotingStats>().await.unwrap();
        assert_eq!(stats.total_voters, 0);
        assert_eq!(stats.voted_count, 0);
        assert_eq!(stats.remaining_time, "Election not active");
        assert!(!stats.user_has_voted);
    }

    #[backend_test]
    async fn vote_requires_voter(client: Client) {
        let candidates = add_candidates(&client).await;
        let response = cast(&client, &candidates[0]).await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client.get("/api/voting/user-status").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn admin_cannot_vote(client: Client) {
        let candidates = add_candidates(&client).await;
        service(&client).toggle().await.unwrap();
        let response = cast(&client, &candidates[0]).await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(voter)]
    async fn vote_before_start(client: Client) {
        let candidates = add_candidates(&client).await;
        let response = cast(&client, &candidates[0]).await;
        assert_eq!(Status::Forbidden, response.status());

        let status = client
            .get("/api/voting/user-status")
            .dispatch()
            .await
            .into_json::<UserVotingStatus>()
            .await
            .unwrap();
        assert!(!status.can_vote);
        assert!(!status.has_voted);
        assert!(!status.is_election_active);
        assert_eq!(status.time_remaining, "Election not active");
    }

    #[backend_test(voter)]
    async fn vote_once(client: Client) {
        let candidates = add_candidates(&client).await;
        let toggled = service(&client).toggle().await.unwrap();
        assert_eq!(toggled.to_string(), "active");

        let response = cast(&client, &candidates[1]).await;
        assert_eq!(Status::Ok, response.status());
        let receipt = response.into_json::<Receipt>().await.unwrap();
        assert!(receipt.success);
        assert_ne!(receipt.receipt_id.to_string(), candidates[1]);

        let response = cast(&client, &candidates[0]).await;
        assert_eq!(Status::Conflict, response.status());
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["success"], false);

        let stats = client
            .get("/api/voting/stats")
            .dispatch()
            .await
            .into_json::<VotingStats>()
            .await
            .unwrap();
        assert_eq!(stats.total_voters, 1);
        assert_eq!(stats.voted_count, 1);
        assert!(stats.user_has_voted);
        assert_eq!(stats.remaining_time, "No deadline");

        let results = client
            .get("/api/voting/results")
            .dispatch()
            .await
            .into_json::<ElectionResults>()
            .await
            .unwrap();
        assert_eq!(results.total_votes, 1);
        assert_eq!(results.participation_rate, 100.0);
        assert_eq!(results.winner.unwrap().id.to_string(), candidates[1]);
        assert_eq!(results.candidates[1].percentage, 100.0);
        assert_eq!(results.candidates[0].percentage, 0.0);
    }

    #[backend_test(voter)]
    async fn vote_for_unknown_candidate(client: Client) {
        add_candidates(&client).await;
        service(&client).toggle().await.unwrap();

        let response = cast(&client, "000000000000000000000000").await;
        assert_eq!(Status::NotFound, response.status());
        let response = cast(&client, "garbage").await;
        assert_eq!(Status::NotFound, response.status());

        // Neither attempt used up the vote.
        let status = client
            .get("/api/voting/user-status")
            .dispatch()
            .await
            .into_json::<UserVotingStatus>()
            .await
            .unwrap();
        assert!(status.can_vote);
    }

    #[backend_test]
    async fn results_before_any_votes(client: Client) {
        add_candidates(&client).await;
        let response = client.get("/api/voting/results").dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["totalVotes"], 0);
        assert_eq!(body["participationRate"], 0.0);
        assert_eq!(body["winner"], Value::Null);
        assert_eq!(body["isElectionActive"], false);
        assert!(body["lastUpdated"].is_string());
        assert_eq!(body["candidates"][0]["percentage"], 0.0);
    }

    #[backend_test(admin)]
    async fn toggle_response_shape(client: Client) {
        let response = client.post("/api/admin/election/toggle").dispatch().await;
        let toggle = response.into_json::<ToggleResponse>().await.unwrap();
        assert!(toggle.success);

        let status = client
            .get("/api/voting/status")
            .dispatch()
            .await
            .into_json::<ElectionStatus>()
            .await
            .unwrap();
        assert!(status.is_active);
        assert!(status.start_date.is_some());
    }
}
