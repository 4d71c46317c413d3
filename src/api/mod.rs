use rocket::{
    http::Status,
    serde::json::{json, Json, Value},
    Catcher, Request, Route,
};

pub mod admin;
pub mod auth;
pub mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voting::routes());
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes
}

/// Render failures that never reach a handler in the same JSON shape as handler errors.
pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        unprocessable_entity,
        internal_error
    ]
}

fn failure(message: &str) -> Json<Value> {
    Json(json!({
        "success": false,
        "message": message,
    }))
}

#[catch(400)]
fn bad_request() -> Json<Value> {
    failure("Bad request")
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    failure("Sign in required")
}

#[catch(403)]
fn forbidden() -> Json<Value> {
    failure("Forbidden")
}

#[catch(404)]
fn not_found(req: &Request) -> Json<Value> {
    failure(&format!("Nothing found at {}", req.uri()))
}

#[catch(422)]
fn unprocessable_entity() -> Json<Value> {
    failure("Malformed request body")
}

#[catch(500)]
fn internal_error(status: Status, req: &Request) -> Json<Value> {
    error!("Unhandled {status} for {} {}", req.method(), req.uri());
    failure("Internal server error")
}
