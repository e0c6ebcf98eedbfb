use crate::{
    auth::{
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::AppError,
    model::user::User,
    models::{LoginReqDto, PasswordResetConfirm, TokenType},
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

pub const MIN_PASSWORD_LEN: usize = 8;

impl From<&User> for TokenSubject {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role_id,
            employee_id: user.employee_id,
            employee_name: user.employee_name.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    error!(error = %e, "Failed to sign token");
    AppError::Internal
}

async fn store_refresh_token(
    pool: &MySqlPool,
    user_id: u64,
    jti: &str,
    exp: usize,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(jti)
    .bind(exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, user_id, "Failed to store refresh token");
        AppError::Internal
    })?;
    Ok(())
}

/// Issues an access/refresh pair and records the refresh token.
async fn issue_pair(
    subject: &TokenSubject,
    pool: &MySqlPool,
    config: &Config,
) -> Result<LoginResponse, AppError> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(token_error)?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool, subject.user_id, &refresh_claims.jti, refresh_claims.exp).await?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
    })
}

/// Login and receive an access + refresh token pair
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::bad_request("Username or password required"));
    }

    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.email, u.password, u.role_id, u.employee_id,
               e.name AS employee_name
        FROM users u
        LEFT JOIN employees e ON e.id = u.employee_id
        WHERE u.username = ?
        "#,
    )
    .bind(user.username.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Database error while fetching user");
        AppError::Internal
    })?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        AppError::Unauthorized("Invalid credentials".into())
    })?;

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let pair = issue_pair(&TokenSubject::from(&db_user), pool.get_ref(), &config).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(pair))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = LoginResponse),
        (status = 401, description = "Missing, revoked or invalid refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let token = bearer(&req).ok_or_else(|| AppError::Unauthorized("No token".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }

    // revoke the presented token; zero rows means unknown or already revoked
    let revoked = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ? AND revoked = 0")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to revoke refresh token");
            AppError::Internal
        })?;

    if revoked.rows_affected() == 0 {
        return Err(AppError::Unauthorized("Refresh token revoked".into()));
    }

    let pair = issue_pair(&TokenSubject::from(&claims), pool.get_ref(), &config).await?;
    Ok(HttpResponse::Ok().json(pair))
}

/// Revoke a refresh token. Always answers 204.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // idempotent
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

/// Set a new password using a reset token from the reset email
#[utoipa::path(
    post,
    path = "/auth/password/reset",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password updated", body = Object, example = json!({
            "message": "Password updated"
        })),
        (status = 400, description = "Password too short"),
        (status = 401, description = "Invalid, expired or already used reset token")
    ),
    tag = "Auth"
)]
pub async fn confirm_password_reset(
    payload: web::Json<PasswordResetConfirm>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let claims = verify_token(&payload.token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired reset token".into()))?;

    if claims.token_type != TokenType::PasswordReset {
        return Err(AppError::Unauthorized("Invalid or expired reset token".into()));
    }

    if payload.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let hashed = hash_password(&payload.new_password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        AppError::Internal
    })?;

    let db_error = |e: sqlx::Error| {
        error!(error = %e, user_id = claims.user_id, "Password reset failed");
        AppError::Internal
    };

    let mut tx = pool.begin().await.map_err(db_error)?;

    let consumed = sqlx::query(
        r#"
        UPDATE password_resets
        SET used = 1
        WHERE jti = ? AND user_id = ? AND used = 0 AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .bind(claims.user_id)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    if consumed.rows_affected() == 0 {
        return Err(AppError::Unauthorized(
            "Invalid or expired reset token".into(),
        ));
    }

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(claims.user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    // sign out every session of this user
    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?")
        .bind(claims.user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    info!(user_id = claims.user_id, "Password reset completed");
    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated" })))
}
