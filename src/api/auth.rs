use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::api::{
        admin::Ack,
        auth::{
            Admin, AdminCredentials, AuthToken, RegistrationResponse, VoterLogin,
            VoterRegistration, AUTH_TOKEN_COOKIE,
        },
    },
    service::ElectionService,
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, login, authenticate, logout]
}

/// Register a new voter and sign them in.
#[post("/auth/register", data = "<registration>", format = "json")]
pub async fn register(
    registration: Json<VoterRegistration>,
    cookies: &CookieJar<'_>,
    service: &State<ElectionService>,
    config: &State<Config>,
) -> Result<Json<RegistrationResponse>> {
    let voter = service.register_voter(registration.0).await?;
    cookies.add(AuthToken::new(&voter).into_cookie(config)?);

    Ok(Json(RegistrationResponse {
        success: true,
        message: "Registration successful".to_string(),
        voter: voter.into(),
    }))
}

/// Sign in a returning voter by email.
#[post("/auth/login", data = "<sign_in>", format = "json")]
pub async fn login(
    sign_in: Json<VoterLogin>,
    cookies: &CookieJar<'_>,
    service: &State<ElectionService>,
    config: &State<Config>,
) -> Result<Json<Ack>> {
    let voter = service
        .voter_by_email(&sign_in.email)
        .await?
        .ok_or_else(|| Error::Unauthorized("no voter registered with that email".to_string()))?;
    cookies.add(AuthToken::new(&voter).into_cookie(config)?);

    Ok(Json(Ack::ok("Signed in")))
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate(
    credentials: Json<AdminCredentials>,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
) -> Result<Json<Ack>> {
    if !config.verify_admin(&credentials.username, &credentials.password)? {
        return Err(Error::Unauthorized(
            "no admin found with the provided username and password combination".to_string(),
        ));
    }
    cookies.add(AuthToken::new(&Admin).into_cookie(config)?);

    Ok(Json(Ack::ok("Signed in as admin")))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
