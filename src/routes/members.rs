//! Member profile pages: name/password edits and avatar upload.

use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart, State},
    response::Response,
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tera::Context;
use tower_cookies::Cookies;

use crate::{
    auth::{hash_password, identity::MemberIdentity},
    http::unexpected_error,
    middleware::paths::{MEMBER_PROFILE_AVATAR_PATH, MEMBER_PROFILE_PATH},
    models::{Member, BLANK_AVATAR_URL},
    services::bucket::ImageUpload,
    state::AppState,
};

/// Largest accepted avatar upload.
const AVATAR_MAX_BYTES: usize = 1 << 20;

/// Room for the multipart envelope around the file itself.
const AVATAR_BODY_LIMIT: usize = AVATAR_MAX_BYTES + 64 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(MEMBER_PROFILE_PATH, get(profile_page).post(update_profile))
        .route(
            MEMBER_PROFILE_AVATAR_PATH,
            get(avatar_page)
                .post(upload_avatar)
                .layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize)]
struct ProfileForm {
    #[serde(rename = "firstName", default)]
    first_name: String,
    #[serde(rename = "lastName", default)]
    last_name:  String,
    #[serde(default)]
    password:   String,
}

// ── Helpers ──────────────────────────────────────────────────

async fn load_member(state: &AppState, identity: &MemberIdentity) -> Option<Member> {
    match state.members.find_by_email(&identity.email, false).await {
        Ok(Some(mut member)) => {
            if member.avatar_url.is_empty() {
                member.avatar_url = BLANK_AVATAR_URL.to_string();
            }
            Some(member)
        }
        Ok(None) => {
            tracing::error!(member_id = identity.member_id, "Session refers to a missing member");
            None
        }
        Err(err) => {
            tracing::error!(member_id = identity.member_id, error = %err, "Error loading member");
            None
        }
    }
}

fn page_context(state: &AppState, identity: &MemberIdentity, member: &Member) -> Context {
    let mut ctx = state.templates.context();
    ctx.insert("member", identity);
    ctx.insert("profile", member);
    ctx
}

/// Keeps the session's copy of the identity in step with the stored member.
fn refresh_session(state: &AppState, cookies: &Cookies, identity: &MemberIdentity) {
    let mut session = state.sessions.member.new_session();
    identity.write_to(&mut session);
    if let Err(err) = state.sessions.member.save(cookies, &session) {
        tracing::error!(member_id = identity.member_id, error = %err, "Error refreshing member session");
    }
}

// ── Profile ──────────────────────────────────────────────────

/// GET /member/profile
async fn profile_page(
    State(state): State<AppState>,
    Extension(identity): Extension<MemberIdentity>,
) -> Response {
    let Some(member) = load_member(&state, &identity).await else {
        return unexpected_error();
    };
    state.templates.render("member-profile.html", &page_context(&state, &identity, &member))
}

/// POST /member/profile: first and last name are required; a blank
/// password leaves the current one in place.
async fn update_profile(
    State(state): State<AppState>,
    Extension(mut identity): Extension<MemberIdentity>,
    cookies: Cookies,
    Form(form): Form<ProfileForm>,
) -> Response {
    let Some(mut member) = load_member(&state, &identity).await else {
        return unexpected_error();
    };

    let problem = if form.first_name.trim().is_empty() {
        Some("Please provide a first name.")
    } else if form.last_name.trim().is_empty() {
        Some("Please provide a last name.")
    } else {
        None
    };

    if let Some(message) = problem {
        let mut ctx = page_context(&state, &identity, &member);
        ctx.insert("success", &false);
        ctx.insert("message", message);
        return state.templates.render("member-profile.html", &ctx);
    }

    let first_name = form.first_name.trim();
    let last_name = form.last_name.trim();

    if let Err(err) = state.members.update_profile(member.id, first_name, last_name).await {
        tracing::error!(member_id = member.id, error = %err, "Error updating member");
        return unexpected_error();
    }

    if !form.password.is_empty() {
        let result = match hash_password(&form.password) {
            Ok(hash) => state.members.update_password(member.id, &hash).await.map_err(anyhow::Error::from),
            Err(err) => Err(anyhow::anyhow!(err)),
        };
        if let Err(err) = result {
            tracing::error!(member_id = member.id, error = %err, "Error updating member password");
            return unexpected_error();
        }
    }

    member.first_name = first_name.to_string();
    member.last_name = last_name.to_string();
    identity.first_name = member.first_name.clone();
    identity.last_name = member.last_name.clone();
    refresh_session(&state, &cookies, &identity);

    let mut ctx = page_context(&state, &identity, &member);
    ctx.insert("success", &true);
    ctx.insert("message", "Member updated successfully!");
    state.templates.render("member-profile.html", &ctx)
}

// ── Avatar ───────────────────────────────────────────────────

/// GET /member/profile/avatar
async fn avatar_page(
    State(state): State<AppState>,
    Extension(identity): Extension<MemberIdentity>,
) -> Response {
    let Some(member) = load_member(&state, &identity).await else {
        return unexpected_error();
    };
    state.templates.render("member-edit-avatar.html", &page_context(&state, &identity, &member))
}

/// POST /member/profile/avatar: `multipart/form-data` with an `imageFile`
/// field of at most 1 MiB.
async fn upload_avatar(
    State(state): State<AppState>,
    Extension(mut identity): Extension<MemberIdentity>,
    cookies: Cookies,
    mut multipart: Multipart,
) -> Response {
    let Some(mut member) = load_member(&state, &identity).await else {
        return unexpected_error();
    };

    let outcome = match read_avatar(&mut multipart, &member).await {
        Err(message) => Err(message),
        Ok(upload) => match state.avatars.store_avatar(&upload).await {
            Err(err) => {
                tracing::error!(member_id = member.id, error = %err, "Error storing avatar");
                Err("There was an error uploading your image. Please try again.")
            }
            Ok(url) => match state.members.update_avatar(member.id, &url).await {
                Err(err) => {
                    tracing::error!(member_id = member.id, error = %err, "Error updating member after image upload");
                    Err("There was a problem updating your member record. Please try again.")
                }
                Ok(()) => Ok(url),
            },
        },
    };

    let mut ctx = match outcome {
        Ok(url) => {
            member.avatar_url = url.clone();
            identity.avatar_url = url;
            refresh_session(&state, &cookies, &identity);

            let mut ctx = page_context(&state, &identity, &member);
            ctx.insert("success", &true);
            ctx.insert("message", "Avatar uploaded successfully!");
            ctx
        }
        Err(message) => {
            let mut ctx = page_context(&state, &identity, &member);
            ctx.insert("success", &false);
            ctx.insert("message", message);
            ctx
        }
    };
    ctx.insert("max_bytes", &AVATAR_MAX_BYTES);
    state.templates.render("member-edit-avatar.html", &ctx)
}

/// Pulls the `imageFile` field out of the form, enforcing size and type.
async fn read_avatar(multipart: &mut Multipart, member: &Member) -> Result<ImageUpload, &'static str> {
    const TOO_LARGE: &str = "Please choose an image no larger than 1MB.";

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err("There was an error getting the file information."),
            Err(_) => return Err(TOO_LARGE),
        };
        if field.name() != Some("imageFile") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("avatar").to_string();
        let bytes = field.bytes().await.map_err(|_| TOO_LARGE)?;
        if bytes.is_empty() {
            return Err("There was an error getting the file information.");
        }
        if bytes.len() > AVATAR_MAX_BYTES {
            return Err(TOO_LARGE);
        }

        let upload = ImageUpload { file_name, bytes: bytes.to_vec(), author: member.display_name() };
        if !matches!(upload.extension().as_str(), "jpg" | "jpeg" | "png" | "gif" | "webp") {
            return Err("Please choose a JPG, PNG, GIF or WEBP image.");
        }
        return Ok(upload);
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };

    use crate::{
        models::MemberStatus,
        testing::{body_text, form, get, location, send, test_app, CookieJar},
    };

    async fn logged_in(app: &axum::Router) -> CookieJar {
        let mut jar = CookieJar::default();
        let response = send(
            app,
            form("POST", "/member/login", &[("email", "ada@example.com"), ("password", "pw")], &jar),
        )
        .await;
        jar.absorb(&response);
        jar
    }

    fn multipart(name: &str, file_name: &str, bytes: &[u8], jar: &CookieJar) -> Request<Body> {
        let boundary = "frame-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n").as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/member/profile/avatar")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .header(header::COOKIE, jar.header().unwrap_or_default())
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn profile_page_shows_member() {
        let (app, _, members) = test_app();
        members.insert("ada@example.com", "pw", MemberStatus::Active);
        let jar = logged_in(&app).await;

        let response = send(&app, get("/member/profile", &jar)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("ada@example.com"));
        assert!(html.contains("blank-profile-picture.png"));
    }

    #[tokio::test]
    async fn profile_update_requires_names() {
        let (app, _, members) = test_app();
        members.insert("ada@example.com", "pw", MemberStatus::Active);
        let jar = logged_in(&app).await;

        let response = send(
            &app,
            form("POST", "/member/profile", &[("firstName", "Ada"), ("lastName", "")], &jar),
        )
        .await;
        assert!(body_text(response).await.contains("Please provide a last name."));
    }

    #[tokio::test]
    async fn profile_update_saves_names_and_password() {
        let (app, _, members) = test_app();
        let member = members.insert("ada@example.com", "pw", MemberStatus::Active);
        let mut jar = logged_in(&app).await;

        let response = send(
            &app,
            form(
                "POST",
                "/member/profile",
                &[("firstName", "Augusta"), ("lastName", "King"), ("password", "new-pw")],
                &jar,
            ),
        )
        .await;
        jar.absorb(&response);
        assert!(body_text(response).await.contains("Member updated successfully!"));

        let stored = members.get(member.id).unwrap();
        assert_eq!(stored.first_name, "Augusta");
        assert_eq!(stored.last_name, "King");
        assert!(crate::auth::verify_password("new-pw", &stored.password_hash).unwrap());

        let response = send(&app, get("/api/member/current", &jar)).await;
        assert!(body_text(response).await.contains("\"firstName\":\"Augusta\""));
    }

    #[tokio::test]
    async fn avatar_upload_stores_image_and_updates_member() {
        let (app, _, members) = test_app();
        let member = members.insert("ada@example.com", "pw", MemberStatus::Active);
        let jar = logged_in(&app).await;

        let response = send(&app, multipart("imageFile", "me.png", b"\x89PNG fake", &jar)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Avatar uploaded successfully!"));

        let stored = members.get(member.id).unwrap();
        assert!(stored.avatar_url.starts_with("/uploads/avatars/"));
        assert!(stored.avatar_url.ends_with(".png"));
    }

    #[tokio::test]
    async fn avatar_upload_rejects_other_file_types() {
        let (app, _, members) = test_app();
        let member = members.insert("ada@example.com", "pw", MemberStatus::Active);
        let jar = logged_in(&app).await;

        let response = send(&app, multipart("imageFile", "script.exe", b"MZ", &jar)).await;
        assert!(body_text(response).await.contains("Please choose a JPG, PNG, GIF or WEBP image."));
        assert_eq!(members.get(member.id).unwrap().avatar_url, "");
    }

    #[tokio::test]
    async fn avatar_upload_rejects_large_files() {
        let (app, _, members) = test_app();
        members.insert("ada@example.com", "pw", MemberStatus::Active);
        let jar = logged_in(&app).await;

        let big = vec![0u8; (1 << 20) + 1];
        let response = send(&app, multipart("imageFile", "big.png", &big, &jar)).await;
        assert!(body_text(response).await.contains("Please choose an image no larger than 1MB."));
    }

    #[tokio::test]
    async fn avatar_page_requires_login() {
        let (app, _, _) = test_app();
        let response = send(&app, get("/member/profile/avatar", &CookieJar::default())).await;
        assert_eq!(location(&response), "/member/login?referer=%2Fmember%2Fprofile%2Favatar");
    }
}
