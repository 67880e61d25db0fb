//! Member login, logout and sign-up.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Extension, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::Deserialize;
use tower_cookies::Cookies;
use validator::{Validate, ValidationErrors};

use crate::{
    auth::{hash_password, identity::MemberIdentity, verify_dummy_password, verify_password},
    http::{client_ip, found, safe_redirect_target, unexpected_error},
    middleware::paths::{
        MEMBER_API_CURRENT_MEMBER, MEMBER_API_LOGOUT, MEMBER_SIGN_UP_PATH,
        SITE_AUTH_ACCOUNT_PENDING_PATH, SITE_AUTH_LOGIN_PATH, SITE_AUTH_LOGOUT_PATH,
    },
    models::{MemberStatus, NewMember, BASE_MEMBER_ROLE},
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid user name or password. Please try again.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(SITE_AUTH_LOGIN_PATH,           get(login_page).post(login))
        .route(SITE_AUTH_LOGOUT_PATH,          get(logout).post(logout))
        .route(SITE_AUTH_ACCOUNT_PENDING_PATH, get(account_pending))
        .route(MEMBER_SIGN_UP_PATH,            get(sign_up_page).post(sign_up))
        .route(MEMBER_API_CURRENT_MEMBER,      get(current_member))
        .route(MEMBER_API_LOGOUT,              get(logout))
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize)]
struct RefererQuery {
    referer: Option<String>,
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    email:    String,
    #[serde(default)]
    password: String,
    referer:  Option<String>,
}

#[derive(Deserialize, Validate)]
struct SignUpForm {
    #[serde(rename = "firstName", default)]
    #[validate(length(min = 1, message = "Please provide a first name."))]
    first_name:       String,
    #[serde(rename = "lastName", default)]
    #[validate(length(min = 1, message = "Please provide a last name."))]
    last_name:        String,
    #[serde(default)]
    #[validate(email(message = "Please provide a valid email address."))]
    email:            String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Please provide a password."))]
    password:         String,
    #[serde(rename = "reenterPassword", default)]
    reenter_password: String,
}

// ── Login ────────────────────────────────────────────────────

/// GET /member/login
async fn login_page(State(state): State<AppState>, Query(query): Query<RefererQuery>) -> Response {
    let mut ctx = state.templates.context();
    ctx.insert("referer", &query.referer.unwrap_or_default());
    state.templates.render("login.html", &ctx)
}

/// POST /member/login
///
/// Unknown email and wrong password render the same message. Inactive and
/// deleted accounts both go to the account-pending page without a password
/// check.
async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    Form(form): Form<LoginForm>,
) -> Response {
    let render_invalid = |email: &str, referer: &str| {
        let mut ctx = state.templates.context();
        ctx.insert("error_message", INVALID_CREDENTIALS);
        ctx.insert("email", email);
        ctx.insert("referer", referer);
        state.templates.render("login.html", &ctx)
    };
    let referer = form.referer.clone().unwrap_or_default();

    let member = match state.members.find_by_email(form.email.trim(), true).await {
        Ok(Some(member)) => member,
        Ok(None) => {
            let peer = connect_info.map(|Extension(ConnectInfo(addr))| addr);
            tracing::warn!(
                ip = %client_ip(&headers, peer),
                path = SITE_AUTH_LOGIN_PATH,
                "Login attempt for unknown member"
            );
            verify_dummy_password(&form.password);
            return render_invalid(&form.email, &referer);
        }
        Err(err) => {
            tracing::error!(error = %err, "Error looking up member during login");
            return unexpected_error();
        }
    };

    if member.status != MemberStatus::Active || member.is_deleted() {
        return found(SITE_AUTH_ACCOUNT_PENDING_PATH);
    }

    match verify_password(&form.password, &member.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(member_id = member.id, "Login attempt with wrong password");
            return render_invalid(&form.email, &referer);
        }
        Err(err) => {
            tracing::error!(member_id = member.id, error = %err, "Stored password hash is unreadable");
            return unexpected_error();
        }
    }

    let mut session = state.sessions.member.new_session();
    MemberIdentity::from_member(&member).write_to(&mut session);

    if let Err(err) = state.sessions.member.save(&cookies, &session) {
        tracing::error!(error = %err, "Error saving member session");
        return unexpected_error();
    }

    tracing::info!(member_id = member.id, "Member logged in");
    found(&safe_redirect_target(form.referer.as_deref(), "/"))
}

/// GET|POST /member/logout and GET /api/member/logout
async fn logout(State(state): State<AppState>, cookies: Cookies) -> Response {
    // An unreadable session is replaced, so logout always clears the cookie.
    let mut session = state
        .sessions
        .member
        .get(&cookies)
        .unwrap_or_else(|_| state.sessions.member.new_session());
    session.expire();

    if let Err(err) = state.sessions.member.save(&cookies, &session) {
        tracing::error!(error = %err, "Error clearing member session");
        return unexpected_error();
    }

    found("/")
}

/// GET /member/account-pending
async fn account_pending(State(state): State<AppState>) -> Response {
    state.templates.render("account-pending.html", &state.templates.context())
}

/// GET /api/member/current
async fn current_member(Extension(member): Extension<MemberIdentity>) -> impl IntoResponse {
    Json(member)
}

// ── Sign up ──────────────────────────────────────────────────

/// GET /member/create-account
async fn sign_up_page(State(state): State<AppState>) -> Response {
    state.templates.render("sign-up.html", &state.templates.context())
}

/// POST /member/create-account: new members start as Pending Approval.
async fn sign_up(State(state): State<AppState>, Form(form): Form<SignUpForm>) -> Response {
    let render_error = |message: &str| {
        let mut ctx = state.templates.context();
        ctx.insert("error_message", message);
        ctx.insert("first_name", &form.first_name);
        ctx.insert("last_name", &form.last_name);
        ctx.insert("email", &form.email);
        state.templates.render("sign-up.html", &ctx)
    };

    if let Err(errors) = form.validate() {
        return render_error(first_message(&errors));
    }

    match state.members.find_by_email(&form.email, true).await {
        Ok(Some(_)) => return render_error("A member with this email address already exists."),
        Ok(None) => {}
        Err(err) => {
            tracing::error!(error = %err, "Error checking for existing member during sign-up");
            return unexpected_error();
        }
    }

    if form.password != form.reenter_password {
        return render_error(
            "The passwords you provided don't match. Please re-type them and try submitting again.",
        );
    }

    let role = match state.members.role_by_name(BASE_MEMBER_ROLE).await {
        Ok(Some(role)) => role,
        Ok(None) | Err(_) => {
            tracing::error!(role = BASE_MEMBER_ROLE, "Base member role is missing");
            return render_error(
                "There was a problem getting some information before creating your member. Please try again.",
            );
        }
    };

    let password_hash = match hash_password(&form.password) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::error!(error = %err, "Error hashing password during sign-up");
            return unexpected_error();
        }
    };

    let new_member = NewMember {
        email:         form.email.clone(),
        first_name:    form.first_name.clone(),
        last_name:     form.last_name.clone(),
        password_hash,
        role_id:       role.id,
        status:        MemberStatus::PendingApproval,
    };

    match state.members.create(new_member).await {
        Ok(member) => {
            tracing::info!(member_id = member.id, "Member signed up");
            found(SITE_AUTH_ACCOUNT_PENDING_PATH)
        }
        Err(err) => {
            tracing::error!(error = %err, "Error creating new member");
            unexpected_error()
        }
    }
}

/// Message of the first failing field, in form order.
fn first_message(errors: &ValidationErrors) -> &str {
    let fields = errors.field_errors();
    ["first_name", "last_name", "email", "password"]
        .iter()
        .filter_map(|name| fields.get(*name).copied())
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_deref())
        .unwrap_or("Please check the form and try again.")
}
