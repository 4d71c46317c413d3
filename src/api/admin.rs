use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            admin::{
                Ack, AdminStats, CandidateResponse, ElectionSpec, ToggleResponse, VoterList,
            },
            auth::{Admin, AuthToken},
            candidate::CandidateSpec,
        },
        common::election::ElectionState,
        mongodb::Id,
    },
    service::ElectionService,
};

pub fn routes() -> Vec<Route> {
    routes![
        stats,
        add_candidate,
        update_candidate,
        delete_candidate,
        voters,
        toggle_election,
        reset_election,
        update_election,
    ]
}

#[get("/admin/stats")]
async fn stats(_token: AuthToken<Admin>, service: &State<ElectionService>) -> Result<Json<AdminStats>> {
    Ok(Json(service.admin_stats().await?))
}

#[post("/admin/candidates", data = "<spec>", format = "json")]
async fn add_candidate(
    _token: AuthToken<Admin>,
    spec: Json<CandidateSpec>,
    service: &State<ElectionService>,
) -> Result<Json<CandidateResponse>> {
    let candidate = service.add_candidate(spec.0).await?;
    Ok(Json(CandidateResponse {
        success: true,
        message: "Candidate added successfully".to_string(),
        candidate: candidate.into(),
    }))
}

#[put("/admin/candidates/<candidate_id>", data = "<spec>", format = "json")]
async fn update_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    service: &State<ElectionService>,
) -> Result<Json<CandidateResponse>> {
    let candidate = service.update_candidate(candidate_id, spec.0).await?;
    Ok(Json(CandidateResponse {
        success: true,
        message: "Candidate updated successfully".to_string(),
        candidate: candidate.into(),
    }))
}

#[delete("/admin/candidates/<candidate_id>")]
async fn delete_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    service: &State<ElectionService>,
) -> Result<Json<Ack>> {
    service.delete_candidate(candidate_id).await?;
    Ok(Json(Ack::ok("Candidate deleted successfully")))
}

#[get("/admin/voters")]
async fn voters(_token: AuthToken<Admin>, service: &State<ElectionService>) -> Result<Json<VoterList>> {
    let voters = service
        .voters()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(VoterList { voters }))
}

#[post("/admin/election/toggle")]
async fn toggle_election(
    _token: AuthToken<Admin>,
    service: &State<ElectionService>,
) -> Result<Json<ToggleResponse>> {
    let status = service.toggle().await?;
    let message = match status {
        ElectionState::Active => "Election started",
        _ => "Election stopped",
    };
    Ok(Json(ToggleResponse {
        success: true,
        message: message.to_string(),
        status,
    }))
}

#[post("/admin/election/reset")]
async fn reset_election(_token: AuthToken<Admin>, service: &State<ElectionService>) -> Result<Json<Ack>> {
    service.reset().await?;
    Ok(Json(Ack::ok("Election reset successfully")))
}

#[put("/admin/election", data = "<spec>", format = "json")]
async fn update_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    service: &State<ElectionService>,
) -> Result<Json<Ack>> {
    service.update_election(spec.0).await?;
    Ok(Json(Ack::ok("Election updated successfully")))
}
