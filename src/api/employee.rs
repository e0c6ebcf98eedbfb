use crate::{auth::auth::AuthUser, error::AppError, model::employee::Employee};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "Ayu", value_type = String)]
    pub name: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    /// Case-insensitive name prefix
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub total: usize,
}

/// Add a directory entry
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Name missing"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Name already in the directory")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let result = sqlx::query("INSERT INTO employees (name) VALUES (?)")
        .bind(name)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(done) => {
            let employee = Employee {
                id: done.last_insert_id(),
                name: name.to_string(),
            };
            info!(employee_id = employee.id, "Employee created");
            Ok(HttpResponse::Created().json(employee))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => Err(
            AppError::Conflict(format!("{name} is already in the directory")),
        ),
        Err(e) => {
            error!(error = %e, "Failed to create employee");
            Err(AppError::Internal)
        }
    }
}

/// Employee directory, ordered by name
#[utoipa::path(
    get,
    path = "/api/v1/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Employee directory", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, AppError> {
    let pattern = match query.search.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => format!("{}%", s.replace('%', "\\%").replace('_', "\\_")),
        _ => "%".to_string(),
    };

    let data = sqlx::query_as::<_, Employee>(
        "SELECT id, name FROM employees WHERE name LIKE ? ORDER BY name",
    )
    .bind(&pattern)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to list employees");
        AppError::Internal
    })?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        total: data.len(),
        data,
    }))
}
