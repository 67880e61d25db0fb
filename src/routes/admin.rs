//! `/admin` routes: root-user login, member management and role management.
//! Everything except the login page sits behind `require_admin`, applied as a
//! route layer in `routes::build_router`.

use axum::{
    extract::{Extension, Path, Query, State},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Form, Json, Router,
};
use serde::Deserialize;
use tera::Context;
use tower_cookies::Cookies;

use crate::{
    auth::{constant_time_eq, identity::AdminIdentity},
    errors::{AppError, AppResult},
    http::{found, safe_redirect_target, success_json, unexpected_error},
    middleware::paths::{ADMIN_LOGIN_PATH, ADMIN_LOGOUT_PATH, ADMIN_PATH},
    models::{Member, MemberStatus, NewMemberRole, BASE_MEMBER_ROLE_ID},
    paging::{adjust_page, page_from_query, PageQuery, Paged},
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid user name or password";
const INVALID_MEMBER_ID: &str = "Invalid member ID";
const ROLES_MANAGE_PATH: &str = "/admin/roles/manage";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(ADMIN_LOGIN_PATH,                  get(login_page).post(login))
        .route(ADMIN_LOGOUT_PATH,                 get(logout))
        .route(ADMIN_PATH,                        get(dashboard))
        .route("/admin/members/manage",           get(members_page))
        .route("/admin/members/edit/{id}",        get(edit_member_page).post(edit_member))
        .route("/admin/api/members",              get(list_members))
        .route("/admin/api/member/activate",      put(activate_member))
        .route("/admin/api/member/deactivate",    put(deactivate_member))
        .route("/admin/api/member/delete/{id}",   delete(delete_member))
        .route("/admin/api/member/role",          get(list_roles))
        .route(ROLES_MANAGE_PATH,                 get(roles_page))
        .route("/admin/roles/create",             get(create_role_page).post(create_role))
        .route("/admin/roles/edit/{id}",          get(edit_role_page).post(edit_role))
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize)]
struct RefererQuery {
    referer: Option<String>,
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(rename = "userName", default)]
    user_name: String,
    #[serde(default)]
    password:  String,
    referer:   Option<String>,
}

#[derive(Deserialize)]
struct MemberIdForm {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
struct EditMemberForm {
    #[serde(rename = "firstName", default)]
    first_name: String,
    #[serde(rename = "lastName", default)]
    last_name:  String,
    #[serde(default)]
    role:       String,
}

#[derive(Deserialize)]
struct RoleForm {
    #[serde(rename = "roleName", default)]
    role_name: String,
    #[serde(default)]
    color:     String,
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id > 0)
}

fn admin_context(state: &AppState, admin: &AdminIdentity) -> Context {
    let mut ctx = state.templates.context();
    ctx.insert("admin_user_name", &admin.admin_user_name);
    ctx
}

fn with_message(mut ctx: Context, success: bool, message: &str) -> Context {
    ctx.insert("success", &success);
    ctx.insert("message", message);
    ctx
}

// ── Login / logout ───────────────────────────────────────────

/// GET /admin/login
async fn login_page(State(state): State<AppState>, Query(query): Query<RefererQuery>) -> Response {
    let mut ctx = state.templates.context();
    ctx.insert("referer", &query.referer.unwrap_or_default());
    state.templates.render("admin-login.html", &ctx)
}

/// POST /admin/login: the single root administrator from configuration.
///
/// The credentials are compared as plaintext config values and there is no
/// lockout. Put this behind rate limiting before exposing it publicly.
async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Response {
    let name_ok = constant_time_eq(&form.user_name, &state.config.root_user_name);
    let password_ok = constant_time_eq(&form.password, &state.config.root_user_password);

    if !(name_ok && password_ok) {
        tracing::warn!(user_name = %form.user_name, "Invalid admin login attempt");
        let mut ctx = state.templates.context();
        ctx.insert("error_message", INVALID_CREDENTIALS);
        ctx.insert("referer", &form.referer.unwrap_or_default());
        return state.templates.render("admin-login.html", &ctx);
    }

    let mut session = state.sessions.admin.new_session();
    AdminIdentity { admin_user_name: form.user_name.clone() }.write_to(&mut session);

    if let Err(err) = state.sessions.admin.save(&cookies, &session) {
        tracing::error!(error = %err, "Error saving admin session");
        return unexpected_error();
    }

    tracing::info!(user_name = %form.user_name, "Admin logged in");
    found(&safe_redirect_target(form.referer.as_deref(), ADMIN_PATH))
}

/// GET /admin/logout
async fn logout(State(state): State<AppState>, cookies: Cookies) -> Response {
    let mut session = state
        .sessions
        .admin
        .get(&cookies)
        .unwrap_or_else(|_| state.sessions.admin.new_session());
    session.expire();

    if let Err(err) = state.sessions.admin.save(&cookies, &session) {
        tracing::error!(error = %err, "Error clearing admin session");
        return unexpected_error();
    }

    found(ADMIN_LOGIN_PATH)
}

// ── Dashboard ────────────────────────────────────────────────

/// GET /admin
async fn dashboard(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
) -> Response {
    let counts = async {
        let members = state.members.count(false).await?;
        let roles = state.members.roles().await?.len();
        Ok::<_, sqlx::Error>((members, roles))
    };

    match counts.await {
        Ok((member_count, role_count)) => {
            let mut ctx = admin_context(&state, &admin);
            ctx.insert("member_count", &member_count);
            ctx.insert("role_count", &role_count);
            state.templates.render("admin-dashboard.html", &ctx)
        }
        Err(err) => {
            tracing::error!(error = %err, "Error loading dashboard counts");
            unexpected_error()
        }
    }
}

// ── Members ──────────────────────────────────────────────────

async fn load_page(state: &AppState, query: &PageQuery) -> Result<Paged<Member>, sqlx::Error> {
    let page = page_from_query(query);
    let page_size = state.config.page_size;
    let items = state.members.list(adjust_page(page), page_size, false).await?;
    let total = state.members.count(false).await?;
    Ok(Paged::new(items, page, page_size, total))
}

/// GET /admin/members/manage?page=
async fn members_page(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Query(query): Query<PageQuery>,
) -> Response {
    match load_page(&state, &query).await {
        Ok(paged) => {
            let mut ctx = admin_context(&state, &admin);
            ctx.insert("paged", &paged);
            state.templates.render("admin-members-manage.html", &ctx)
        }
        Err(err) => {
            tracing::error!(error = %err, "Error listing members");
            unexpected_error()
        }
    }
}

/// GET /admin/api/members?page=
async fn list_members(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(load_page(&state, &query).await?))
}

/// GET /admin/members/edit/{id}
async fn edit_member_page(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<String>,
) -> Response {
    let ctx = admin_context(&state, &admin);
    let Some(id) = parse_id(&id) else {
        return state.templates.render("admin-members-edit.html", &with_message(ctx, false, INVALID_MEMBER_ID));
    };
    render_member_edit(&state, ctx, id).await
}

async fn render_member_edit(state: &AppState, mut ctx: Context, id: u64) -> Response {
    let loaded = async {
        let member = state.members.find_by_id(id).await?;
        let roles = state.members.roles().await?;
        Ok::<_, sqlx::Error>((member, roles))
    };

    match loaded.await {
        Ok((Some(member), roles)) => {
            ctx.insert("edit_member", &member);
            ctx.insert("roles", &roles);
            state.templates.render("admin-members-edit.html", &ctx)
        }
        Ok((None, _)) => state
            .templates
            .render("admin-members-edit.html", &with_message(ctx, false, INVALID_MEMBER_ID)),
        Err(err) => {
            tracing::error!(member_id = id, error = %err, "Error loading member for edit");
            unexpected_error()
        }
    }
}

/// POST /admin/members/edit/{id}: names and role.
async fn edit_member(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<String>,
    Form(form): Form<EditMemberForm>,
) -> Response {
    let ctx = admin_context(&state, &admin);
    let Some(id) = parse_id(&id) else {
        return state.templates.render("admin-members-edit.html", &with_message(ctx, false, INVALID_MEMBER_ID));
    };

    let problem = if form.first_name.trim().is_empty() {
        Some("Please provide a first name.")
    } else if form.last_name.trim().is_empty() {
        Some("Please provide a last name.")
    } else {
        None
    };
    if let Some(message) = problem {
        return render_member_edit(&state, with_message(ctx, false, message), id).await;
    }

    let role = match parse_id(&form.role) {
        Some(role_id) => state.members.role_by_id(role_id).await,
        None => Ok(None),
    };
    let role = match role {
        Ok(Some(role)) => role,
        Ok(None) => {
            return render_member_edit(&state, with_message(ctx, false, "Please select a valid role."), id).await;
        }
        Err(err) => {
            tracing::error!(member_id = id, error = %err, "Error loading role");
            return unexpected_error();
        }
    };

    let saved = async {
        if state.members.find_by_id(id).await?.is_none() {
            return Ok::<_, sqlx::Error>(false);
        }
        state.members.update_profile(id, form.first_name.trim(), form.last_name.trim()).await?;
        state.members.update_role(id, role.id).await?;
        Ok::<_, sqlx::Error>(true)
    };

    match saved.await {
        Ok(true) => {
            tracing::info!(member_id = id, role_id = role.id, "Member updated by admin");
            render_member_edit(&state, with_message(ctx, true, "Member updated successfully!"), id).await
        }
        Ok(false) => state
            .templates
            .render("admin-members-edit.html", &with_message(ctx, false, INVALID_MEMBER_ID)),
        Err(err) => {
            tracing::error!(member_id = id, error = %err, "Error updating member");
            unexpected_error()
        }
    }
}

async fn change_status(state: &AppState, raw_id: &str, status: MemberStatus, message: &str) -> AppResult<Response> {
    let Some(id) = parse_id(raw_id) else {
        return Err(AppError::BadRequest(INVALID_MEMBER_ID.into()));
    };

    if !state.members.set_status(id, status).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(member_id = id, status = %status, "Member status changed");
    Ok(success_json(message))
}

/// PUT /admin/api/member/activate: form `id`.
async fn activate_member(State(state): State<AppState>, Form(form): Form<MemberIdForm>) -> AppResult<Response> {
    change_status(&state, &form.id, MemberStatus::Active, "Member activated!").await
}

/// PUT /admin/api/member/deactivate: form `id`.
async fn deactivate_member(State(state): State<AppState>, Form(form): Form<MemberIdForm>) -> AppResult<Response> {
    change_status(&state, &form.id, MemberStatus::Inactive, "Member deactivated!").await
}

/// DELETE /admin/api/member/delete/{id}: soft delete; the row is purged by
/// the scheduled job once past retention.
async fn delete_member(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let Some(id) = parse_id(&id) else {
        return Err(AppError::BadRequest(INVALID_MEMBER_ID.into()));
    };

    if !state.members.soft_delete(id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(member_id = id, "Member deleted");
    Ok(success_json("Member deleted!"))
}

/// GET /admin/api/member/role
async fn list_roles(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.members.roles().await?))
}

// ── Roles ────────────────────────────────────────────────────

/// GET /admin/roles/manage
async fn roles_page(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
) -> Response {
    match state.members.roles().await {
        Ok(roles) => {
            let mut ctx = admin_context(&state, &admin);
            ctx.insert("roles", &roles);
            state.templates.render("admin-roles-manage.html", &ctx)
        }
        Err(err) => {
            tracing::error!(error = %err, "Error listing roles");
            unexpected_error()
        }
    }
}

fn role_problem(form: &RoleForm) -> Option<&'static str> {
    if form.role_name.trim().is_empty() {
        Some("Please provide a name for your new role.")
    } else if form.color.trim().is_empty() {
        Some("Please select a color to represent this role.")
    } else {
        None
    }
}

/// GET /admin/roles/create
async fn create_role_page(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
) -> Response {
    state.templates.render("admin-roles-create.html", &admin_context(&state, &admin))
}

/// POST /admin/roles/create: role names are unique.
async fn create_role(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Form(form): Form<RoleForm>,
) -> Response {
    let render_error = |message: &str| {
        let mut ctx = with_message(admin_context(&state, &admin), false, message);
        ctx.insert("role_name", &form.role_name);
        ctx.insert("color", &form.color);
        state.templates.render("admin-roles-create.html", &ctx)
    };

    if let Some(message) = role_problem(&form) {
        return render_error(message);
    }

    let role_name = form.role_name.trim();
    match state.members.role_by_name(role_name).await {
        Ok(Some(_)) => return render_error("A role with this name already exists. Please choose another."),
        Ok(None) => {}
        Err(err) => {
            tracing::error!(error = %err, "Error checking role name");
            return unexpected_error();
        }
    }

    let new_role = NewMemberRole { role_name: role_name.to_string(), color: form.color.trim().to_string() };
    match state.members.create_role(new_role).await {
        Ok(role) => {
            tracing::info!(role_id = role.id, role_name = %role.role_name, "Role created");
            found(ROLES_MANAGE_PATH)
        }
        Err(err) => {
            tracing::error!(error = %err, "Error creating role");
            unexpected_error()
        }
    }
}

/// GET /admin/roles/edit/{id}
async fn edit_role_page(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<String>,
) -> Response {
    let ctx = admin_context(&state, &admin);
    let id = match parse_id(&id) {
        Some(BASE_MEMBER_ROLE_ID) => {
            return state
                .templates
                .render("admin-roles-edit.html", &with_message(ctx, false, "You are not allowed to edit this role"));
        }
        Some(id) => id,
        None => return found(ROLES_MANAGE_PATH),
    };
    render_role_edit(&state, ctx, id).await
}

async fn render_role_edit(state: &AppState, mut ctx: Context, id: u64) -> Response {
    match state.members.role_by_id(id).await {
        Ok(Some(role)) => {
            ctx.insert("role", &role);
            state.templates.render("admin-roles-edit.html", &ctx)
        }
        Ok(None) => found(ROLES_MANAGE_PATH),
        Err(err) => {
            tracing::error!(role_id = id, error = %err, "Error loading role");
            unexpected_error()
        }
    }
}

/// POST /admin/roles/edit/{id}: the base member role cannot be changed.
async fn edit_role(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<String>,
    Form(form): Form<RoleForm>,
) -> Response {
    let ctx = admin_context(&state, &admin);
    let id = match parse_id(&id) {
        Some(BASE_MEMBER_ROLE_ID) => {
            tracing::warn!("Attempt to edit the base member role");
            return state
                .templates
                .render("admin-roles-edit.html", &with_message(ctx, false, "You are not allowed to edit this role"));
        }
        Some(id) => id,
        None => return found(ROLES_MANAGE_PATH),
    };

    if let Some(message) = role_problem(&form) {
        return render_role_edit(&state, with_message(ctx, false, message), id).await;
    }

    let role_name = form.role_name.trim();
    match state.members.role_by_name(role_name).await {
        Ok(Some(existing)) if existing.id != id => {
            let message = "A role with this name already exists. Please choose another.";
            return render_role_edit(&state, with_message(ctx, false, message), id).await;
        }
        Ok(_) => {}
        Err(err) => {
            tracing::error!(role_id = id, error = %err, "Error checking role name");
            return unexpected_error();
        }
    }

    let update = NewMemberRole { role_name: role_name.to_string(), color: form.color.trim().to_string() };
    match state.members.update_role_def(id, update).await {
        Ok(_) => found(ROLES_MANAGE_PATH),
        Err(err) => {
            tracing::error!(role_id = id, error = %err, "Error updating role");
            unexpected_error()
        }
    }
}
