use crate::{
    auth::{
        auth::AuthUser,
        handlers::MIN_PASSWORD_LEN,
        jwt::{TokenSubject, generate_reset_token},
        password::hash_password,
    },
    config::Config,
    error::AppError,
    model::{role::Role, user::User},
    models::{CreateUserReq, PasswordResetReq},
    utils::{mailer::Mailer, reset_link::build_reset_link},
};
use actix_web::{HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info, instrument, warn};

fn validate_new_user(req: &CreateUserReq) -> Result<Role, AppError> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() {
        return Err(AppError::bad_request("Username and email must not be empty"));
    }
    if !req.email.contains('@') {
        return Err(AppError::bad_request("Email is not valid"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Role::from_id(req.role_id).ok_or_else(|| AppError::bad_request("Unknown role_id"))
}

/// Create a login (Admin)
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = Object, example = json!({
            "message": "User registered successfully",
            "id": 4
        })),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Username or email already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUserReq>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let role = validate_new_user(&payload)?;

    let hashed = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        AppError::Internal
    })?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password, role_id, employee_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.username.trim().to_lowercase())
    .bind(payload.email.trim().to_lowercase())
    .bind(&hashed)
    .bind(role.id())
    .bind(payload.employee_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(done) => {
            info!(user_id = done.last_insert_id(), ?role, "User created");
            Ok(HttpResponse::Created().json(json!({
                "message": "User registered successfully",
                "id": done.last_insert_id(),
            })))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
            Err(AppError::Conflict("Username or email already exists".into()))
        }
        Err(e) => {
            error!(error = %e, "Failed to register user");
            Err(AppError::Internal)
        }
    }
}

/// Delete an account together with its sessions and reset tokens (Admin).
/// Deleting an account that does not exist answers 404.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{user_id}",
    params(("user_id" = u64, Path, description = "Account to delete")),
    responses(
        (status = 200, description = "User deleted", body = Object, example = json!({
            "message": "User deleted"
        })),
        (status = 400, description = "Cannot delete your own account"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
#[instrument(name = "admin_delete_user", skip(auth, pool), fields(admin = auth.user_id))]
pub async fn delete_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let user_id = path.into_inner();

    if user_id == auth.user_id {
        return Err(AppError::bad_request("Cannot delete your own account"));
    }

    let db_error = |e: sqlx::Error| {
        error!(error = %e, user_id, "Delete user failed");
        AppError::Internal
    };

    let mut tx = pool.begin().await.map_err(db_error)?;

    for sql in [
        "DELETE FROM refresh_tokens WHERE user_id = ?",
        "DELETE FROM password_resets WHERE user_id = ?",
    ] {
        sqlx::query(sql)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
    }

    let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    if deleted.rows_affected() == 0 {
        // tx rolls back on drop
        warn!(user_id, "Delete requested for unknown user");
        return Err(AppError::not_found("User not found"));
    }

    tx.commit().await.map_err(db_error)?;

    info!(user_id, "User deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "User deleted" })))
}

/// Email a password reset link (Admin)
#[utoipa::path(
    post,
    path = "/api/v1/admin/password-reset",
    request_body = PasswordResetReq,
    responses(
        (status = 200, description = "Reset link sent", body = Object, example = json!({
            "message": "Password reset link sent",
            "continue_url_applied": true
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "No account with this email"),
        (status = 502, description = "Mail relay unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
#[instrument(name = "admin_password_reset", skip(auth, pool, config, mailer, payload))]
pub async fn issue_password_reset(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    mailer: web::Data<Option<Mailer>>,
    payload: web::Json<PasswordResetReq>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let mailer = mailer
        .get_ref()
        .as_ref()
        .ok_or_else(|| AppError::BadGateway("Mail relay is not configured".into()))?;

    let email = payload.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.email, u.password, u.role_id, u.employee_id,
               e.name AS employee_name
        FROM users u
        LEFT JOIN employees e ON e.id = u.employee_id
        WHERE u.email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to look up user by email");
        AppError::Internal
    })?
    .ok_or_else(|| AppError::not_found("No account with this email"))?;

    let (token, claims) = generate_reset_token(
        &TokenSubject::from(&user),
        &config.jwt_secret,
        config.reset_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign reset token");
        AppError::Internal
    })?;

    sqlx::query(
        r#"
        INSERT INTO password_resets (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user.id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, user_id = user.id, "Failed to store reset token");
        AppError::Internal
    })?;

    let link = build_reset_link(
        &config.reset_link_base,
        &token,
        config.reset_continue_url.as_deref(),
        &config.reset_allowed_hosts,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to build reset link");
        AppError::Internal
    })?;

    mailer
        .send_password_reset(&user.email, &link.url)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = user.id, "Failed to send reset mail");
            AppError::BadGateway("Could not send the reset email".into())
        })?;

    info!(user_id = user.id, continue_url_applied = link.continue_url_applied, "Reset link issued");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Password reset link sent",
        "continue_url_applied": link.continue_url_applied,
    })))
}
