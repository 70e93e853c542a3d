//! Browser-facing login routes
//!
//! Endpoints:
//! - GET  /login    : start the OAuth flow, redirect to the provider
//! - GET  /callback : provider redirect target (query parameters)
//! - POST /callback : provider redirect target (form body wins over query)
//! - GET  /whoami   : current login state and identity
//! - POST /api      : signed API call with the session's access token
//! - POST /logout   : drop every token and rotate the session id
//!
//! Every handler loads the session snapshot named by the cookie, runs one
//! `AuthSession` operation against it, commits the snapshot and re-issues the
//! cookie if the session id changed.

use std::sync::Arc;

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use oauth_client::{ApiRequest, OAuthClient};
use oauth_session::{AuthSession, AuthState, CallbackParams};
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::error::Error;
use crate::metrics;
use crate::session_store::{SessionSnapshot, SessionStore};

/// Shared state for login route handlers.
#[derive(Clone)]
pub struct PortalState {
    client: Arc<dyn OAuthClient>,
    sessions: SessionStore,
    session: Arc<SessionConfig>,
    post_login_redirect: Arc<str>,
}

impl PortalState {
    pub fn new(
        client: Arc<dyn OAuthClient>,
        sessions: SessionStore,
        session: SessionConfig,
        post_login_redirect: &str,
    ) -> Self {
        Self {
            client,
            sessions,
            session: Arc::new(session),
            post_login_redirect: Arc::from(post_login_redirect),
        }
    }

    async fn load(&self, jar: &CookieJar) -> SessionSnapshot {
        let id = jar
            .get(&self.session.cookie_name)
            .map(|c| c.value().to_owned());
        self.sessions.load(id.as_deref()).await
    }

    /// Commit the snapshot and bring the cookie in line with its id.
    async fn persist(&self, jar: CookieJar, snapshot: SessionSnapshot) -> CookieJar {
        let name = self.session.cookie_name.clone();
        let Some(id) = self.sessions.commit(snapshot).await else {
            return jar.remove(Cookie::build((name, "")).path("/"));
        };
        if jar.get(&name).map(|c| c.value()) == Some(id.as_str()) {
            return jar;
        }
        jar.add(
            Cookie::build((name, id))
                .http_only(true)
                .secure(self.session.secure_cookie)
                .same_site(SameSite::Lax)
                .path("/"),
        )
    }
}

/// Build the login router.
pub fn build_auth_router(state: PortalState) -> Router {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback_query).post(callback_form))
        .route("/whoami", get(whoami))
        .route("/api", post(api_call))
        .route("/logout", post(logout))
        .with_state(state)
}

/// GET /login: request a token and redirect the browser to authorize it.
async fn login(State(state): State<PortalState>, jar: CookieJar) -> Response {
    let mut snapshot = state.load(&jar).await;
    let mut session = AuthSession::new(state.client.as_ref(), &mut snapshot);
    let result = session.begin_auth().await;
    drop(session);

    metrics::record_transition("begin", if result.is_ok() { "success" } else { "failure" });
    let jar = state.persist(jar, snapshot).await;

    let result = result
        .map(|url| Redirect::to(&url).into_response())
        .map_err(Error::from);
    respond("/login", jar, result)
}

/// GET /callback: provider redirect with parameters in the query string.
async fn callback_query(
    State(state): State<PortalState>,
    jar: CookieJar,
    Query(query): Query<CallbackParams>,
) -> Response {
    finish_callback(state, jar, query).await
}

/// POST /callback: provider redirect with parameters in the body.
async fn callback_form(
    State(state): State<PortalState>,
    jar: CookieJar,
    Query(query): Query<CallbackParams>,
    Form(body): Form<CallbackParams>,
) -> Response {
    finish_callback(state, jar, CallbackParams::merge(body, query)).await
}

async fn finish_callback(state: PortalState, jar: CookieJar, params: CallbackParams) -> Response {
    let mut snapshot = state.load(&jar).await;
    let session = AuthSession::resume(
        state.client.as_ref(),
        &mut snapshot,
        &params,
        state.session.verify_identity,
    )
    .await;
    record_resume(&session);
    let authenticated = session.is_authenticated();
    let last_error = session.last_error().cloned();
    drop(session);

    let jar = state.persist(jar, snapshot).await;
    let result = if authenticated {
        info!("login completed");
        Ok(Redirect::to(&state.post_login_redirect).into_response())
    } else {
        Err(Error::LoginRequired(last_error))
    };
    respond("/callback", jar, result)
}

/// GET /whoami: login state, plus identity when verified.
async fn whoami(State(state): State<PortalState>, jar: CookieJar) -> Response {
    let mut snapshot = state.load(&jar).await;
    let session = AuthSession::resume(
        state.client.as_ref(),
        &mut snapshot,
        &CallbackParams::default(),
        state.session.verify_identity,
    )
    .await;
    record_resume(&session);

    let result = match session.state() {
        AuthState::Verified => Ok(Json(serde_json::json!({
            "state": AuthState::Verified.label(),
            "user": session.user_info(),
        }))
        .into_response()),
        AuthState::Authenticated => Ok(Json(serde_json::json!({
            "state": AuthState::Authenticated.label(),
        }))
        .into_response()),
        AuthState::Unauthenticated | AuthState::PendingVerification => {
            Err(Error::LoginRequired(session.last_error().cloned()))
        }
    };
    drop(session);

    let jar = state.persist(jar, snapshot).await;
    respond("/whoami", jar, result)
}

/// POST /api: forward a signed call; failures leave the login in place.
async fn api_call(
    State(state): State<PortalState>,
    jar: CookieJar,
    Json(request): Json<ApiRequest>,
) -> Response {
    let mut snapshot = state.load(&jar).await;
    let mut session = AuthSession::resume(
        state.client.as_ref(),
        &mut snapshot,
        &CallbackParams::default(),
        false,
    )
    .await;
    let result = session.call_api(&request).await;
    drop(session);

    if !matches!(result, Err(oauth_session::Error::NotAuthenticated)) {
        metrics::record_transition("call", if result.is_ok() { "success" } else { "failure" });
    }
    let jar = state.persist(jar, snapshot).await;

    let result = result
        .map(|body| (StatusCode::OK, body).into_response())
        .map_err(Error::from);
    respond("/api", jar, result)
}

/// POST /logout: forget every token and rotate the session id.
async fn logout(State(state): State<PortalState>, jar: CookieJar) -> Response {
    let mut snapshot = state.load(&jar).await;
    let mut session = AuthSession::new(state.client.as_ref(), &mut snapshot);
    let result = session.kill();
    drop(session);

    metrics::record_transition("kill", if result.is_ok() { "success" } else { "failure" });
    let jar = state.persist(jar, snapshot).await;

    let result = result
        .map(|()| Json(serde_json::json!({ "status": "logged_out" })).into_response())
        .map_err(Error::from);
    respond("/logout", jar, result)
}

/// Record client failures and the resulting state of a `resume`.
fn record_resume(session: &AuthSession<'_>) {
    if let Some(oauth_session::Error::ExternalFailure { operation, .. }) = session.last_error() {
        metrics::record_transition(operation.as_str(), "failure");
    }
    metrics::record_transition("resume", session.state().label());
}

fn respond(route: &'static str, jar: CookieJar, result: Result<Response, Error>) -> Response {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            warn!(route, error = %e, "request did not complete");
            e.into_response()
        }
    };
    metrics::record_request(route, response.status().as_u16());
    (jar, response).into_response()
}
