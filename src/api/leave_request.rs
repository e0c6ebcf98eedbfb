use std::convert::Infallible;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::leave::aggregate::{
    EmployeeTotals, PendingSort, RecordScope, category_totals, pending_queue,
};
use crate::leave::feed::{FeedStats, LeaveFeed, LeaveSnapshotSource};
use crate::model::leave_record::{
    LeaveCategory, LeaveRecord, LeaveRow, LeaveStatus, join_categories,
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    /// Who the leave is for. Only honoured for HR/Admin; employees always
    /// file for themselves.
    #[schema(example = "Ayu")]
    pub employee_name: Option<String>,
    #[schema(example = json!(["Sick"]))]
    pub leave_categories: Vec<LeaveCategory>,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    /// Defaults to `start_date`
    #[schema(example = "2026-01-05", format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRecord>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: usize,
}

#[derive(Deserialize, IntoParams)]
pub struct LeaveFilter {
    /// Filter by leave status
    #[param(value_type = Option<String>, example = "pending")]
    pub status: Option<LeaveStatus>,
    /// Filter by employee name (HR/Admin only)
    pub employee: Option<String>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Pagination per page number
    pub per_page: Option<u32>,
}

#[derive(Deserialize, IntoParams)]
pub struct PendingQuery {
    /// name-asc | name-desc | date-asc | date-desc | created-old | created-new
    #[param(value_type = Option<String>, example = "created-new")]
    pub sort: Option<PendingSort>,
}

#[derive(Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// Employee name, or `all` / omitted for everyone in scope
    pub employee: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SummaryResponse {
    pub data: Vec<EmployeeTotals>,
}

fn db_failure(context: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        error!(error = %e, "{}", context);
        AppError::Internal
    }
}

/// Resolves the name a new record is filed under.
fn filing_name(auth: &AuthUser, requested: Option<&str>) -> Result<String, AppError> {
    if auth.role.is_privileged() {
        return requested
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .ok_or_else(|| AppError::bad_request("employee_name is required"));
    }

    auth.employee_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .ok_or_else(|| AppError::forbidden("No employee profile"))
}

/* =========================
Create leave request
========================= */
/// Submit leave. HR/Admin entries are approved immediately.
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave recorded", body = Object,
         example = json!({
            "message": "Leave request submitted",
            "id": 12,
            "status": "pending"
         })
        ),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<LeaveFeed>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    let employee_name = filing_name(&auth, payload.employee_name.as_deref())?;

    if payload.leave_categories.is_empty() {
        return Err(AppError::bad_request("At least one leave category is required"));
    }

    let end_date = payload.end_date.unwrap_or(payload.start_date);
    if payload.start_date > end_date {
        return Err(AppError::bad_request("start_date cannot be after end_date"));
    }

    let status = LeaveStatus::initial(auth.role.is_privileged());

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_name, leave_categories, start_date, end_date, status, created_by)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&employee_name)
    .bind(join_categories(&payload.leave_categories))
    .bind(payload.start_date)
    .bind(end_date)
    .bind(status.as_ref())
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(db_failure("Failed to create leave request"))?;

    let id = result.last_insert_id();
    info!(leave_id = id, employee = %employee_name, %status, "Leave recorded");
    feed.refresh_after_write(pool.get_ref()).await;

    let message = match status {
        LeaveStatus::Approved => "Leave recorded",
        _ => "Leave request submitted",
    };
    Ok(HttpResponse::Created().json(json!({
        "message": message,
        "id": id,
        "status": status,
    })))
}

/// Moves a pending request to `next`. Terminal records are left untouched.
async fn decide(
    pool: &MySqlPool,
    feed: &LeaveFeed,
    leave_id: u64,
    next: LeaveStatus,
) -> Result<HttpResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?
        WHERE id = ?
        AND status = 'pending'
        "#,
    )
    .bind(next.as_ref())
    .bind(leave_id)
    .execute(pool)
    .await
    .map_err(db_failure("Leave decision failed"))?;

    if result.rows_affected() == 0 {
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM leave_requests WHERE id = ?")
                .bind(leave_id)
                .fetch_optional(pool)
                .await
                .map_err(db_failure("Failed to fetch leave status"))?;

        return match current.and_then(|s| s.parse::<LeaveStatus>().ok()) {
            None => Err(AppError::not_found("Leave request not found")),
            Some(current) if !current.can_transition_to(next) => Err(AppError::Conflict(
                format!("Leave request already {current}"),
            )),
            // raced with another decision between the two statements
            Some(_) => Err(AppError::Conflict("Leave request changed, retry".into())),
        };
    }

    info!(leave_id, %next, "Leave decided");
    feed.refresh_after_write(pool).await;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Leave {next}"),
        "status": next,
    })))
}

/* =========================
Approve leave (HR/Admin)
========================= */
/// Approve a pending leave request
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved successfully", body = Object, example = json!({
            "message": "Leave approved",
            "status": "approved"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already approved or rejected")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<LeaveFeed>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    decide(pool.get_ref(), feed.get_ref(), path.into_inner(), LeaveStatus::Approved).await
}

/* =========================
Reject leave (HR/Admin)
========================= */
/// Reject a pending leave request
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected successfully", body = Object, example = json!({
            "message": "Leave rejected",
            "status": "rejected"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already approved or rejected")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<LeaveFeed>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    decide(pool.get_ref(), feed.get_ref(), path.into_inner(), LeaveStatus::Rejected).await
}

/// Whether `auth` may delete `record`: HR/Admin always, owners while pending.
fn may_delete(auth: &AuthUser, record: &LeaveRecord) -> bool {
    auth.role.is_privileged()
        || (record.status == LeaveStatus::Pending && auth.record_scope().admits(record))
}

/// Delete a leave request
#[utoipa::path(
    delete,
    path = "/api/v1/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to delete")
    ),
    responses(
        (status = 200, description = "Leave deleted", body = Object, example = json!({
            "message": "Leave deleted"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request changed meanwhile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    feed: web::Data<LeaveFeed>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave_id = path.into_inner();

    // ownership and status are checked by the statement itself, never by the snapshot
    let result = match auth.record_scope() {
        RecordScope::All => sqlx::query("DELETE FROM leave_requests WHERE id = ?")
            .bind(leave_id)
            .execute(pool.get_ref())
            .await,
        RecordScope::Own(name) => {
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                return Err(AppError::forbidden("No employee profile"));
            }
            sqlx::query(
                r#"
                DELETE FROM leave_requests
                WHERE id = ?
                AND status = 'pending'
                AND LOWER(TRIM(employee_name)) = ?
                "#,
            )
            .bind(leave_id)
            .bind(name)
            .execute(pool.get_ref())
            .await
        }
    }
    .map_err(db_failure("Failed to delete leave request"))?;

    if result.rows_affected() == 0 {
        let current = sqlx::query_as::<_, LeaveRow>(
            r#"
            SELECT id, employee_name, leave_categories, start_date, end_date, status, created_at
            FROM leave_requests
            WHERE id = ?
            "#,
        )
        .bind(leave_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(db_failure("Failed to fetch leave request"))?
        .and_then(|row| LeaveRecord::try_from(row).ok());

        return Err(delete_refusal(&auth, current.as_ref()));
    }

    feed.refresh_after_write(pool.get_ref()).await;

    info!(leave_id, user_id = auth.user_id, "Leave deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Leave deleted" })))
}

/// Why a delete matched no row, judged against the row as it is now.
fn delete_refusal(auth: &AuthUser, current: Option<&LeaveRecord>) -> AppError {
    match current {
        Some(record) if auth.record_scope().admits(record) => {
            if may_delete(auth, record) {
                // decided or deleted between the two statements
                AppError::Conflict("Leave request changed, retry".into())
            } else {
                AppError::forbidden("Only pending leave of your own can be deleted")
            }
        }
        _ => AppError::not_found("Leave request not found"),
    }
}

/// Get one leave request
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRecord),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    feed: web::Data<LeaveFeed>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave_id = path.into_inner();
    let scope = auth.record_scope();

    feed.snapshot()
        .iter()
        .find(|r| r.id == leave_id && scope.admits(r))
        .map(|r| HttpResponse::Ok().json(r))
        .ok_or_else(|| AppError::not_found("Leave request not found"))
}

fn filter_page(records: &[LeaveRecord], scope: &RecordScope, filter: &LeaveFilter) -> LeaveListResponse {
    let per_page = filter.per_page.unwrap_or(10).clamp(1, 100);
    let page = filter.page.unwrap_or(1).max(1);
    let wanted = filter.employee.as_deref().map(|e| e.trim().to_lowercase());

    let matching: Vec<&LeaveRecord> = records
        .iter()
        .filter(|r| scope.admits(r))
        .filter(|r| filter.status.is_none_or(|s| r.status == s))
        .filter(|r| match &wanted {
            Some(w) => r.employee_name.trim().to_lowercase() == *w,
            None => true,
        })
        .collect();

    let offset = (page as usize - 1).saturating_mul(per_page as usize);
    let data = matching
        .iter()
        .skip(offset)
        .take(per_page as usize)
        .map(|r| (*r).clone())
        .collect();

    LeaveListResponse {
        data,
        page,
        per_page,
        total: matching.len(),
    }
}

/// List leave requests visible to the caller, newest first
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    feed: web::Data<LeaveFeed>,
    query: web::Query<LeaveFilter>,
) -> HttpResponse {
    let snapshot = feed.snapshot();
    HttpResponse::Ok().json(filter_page(&snapshot, &auth.record_scope(), &query))
}

/// Pending queue under one of six sort keys
#[utoipa::path(
    get,
    path = "/api/v1/leave/pending",
    params(PendingQuery),
    responses(
        (status = 200, description = "Pending leave requests", body = [LeaveRecord]),
        (status = 400, description = "Unknown sort key"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn pending_list(
    auth: AuthUser,
    feed: web::Data<LeaveFeed>,
    query: web::Query<PendingQuery>,
) -> HttpResponse {
    let sort = query.sort.unwrap_or_default();
    let queue = pending_queue(&feed.snapshot(), sort, &auth.record_scope());
    HttpResponse::Ok().json(queue)
}

/// Approved leave per employee and category
#[utoipa::path(
    get,
    path = "/api/v1/leave/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Per-employee totals", body = SummaryResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_summary(
    auth: AuthUser,
    feed: web::Data<LeaveFeed>,
    query: web::Query<SummaryQuery>,
) -> HttpResponse {
    let employee = query
        .employee
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty() && !e.eq_ignore_ascii_case("all"));

    let data = category_totals(&feed.snapshot(), &auth.record_scope(), employee);
    HttpResponse::Ok().json(SummaryResponse { data })
}

fn sse_frame(stats: &FeedStats) -> web::Bytes {
    let body = serde_json::to_string(stats).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: leave\ndata: {body}\n\n"))
}

/// Server-sent events: one `leave` event now and one per store change
#[utoipa::path(
    get,
    path = "/api/v1/leave/events",
    responses(
        (status = 200, description = "text/event-stream of FeedStats", body = FeedStats, content_type = "text/event-stream"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_events(auth: AuthUser, feed: web::Data<LeaveFeed>) -> HttpResponse {
    let scope = auth.record_scope();
    let rx = feed.subscribe();

    let stream = futures::stream::unfold((rx, scope, true), |(mut rx, scope, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let stats = FeedStats::from_records(&rx.borrow_and_update(), &scope);
        Some((Ok::<_, Infallible>(sse_frame(&stats)), (rx, scope, false)))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn user(role: Role, name: Option<&str>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "u".into(),
            role,
            employee_id: None,
            employee_name: name.map(String::from),
        }
    }

    fn record(id: u64, name: &str, status: LeaveStatus) -> LeaveRecord {
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        LeaveRecord {
            id,
            employee_name: name.into(),
            leave_categories: vec!["Sick".into()],
            start_date: day,
            end_date: day,
            status,
            created_at: None,
        }
    }

    #[test]
    fn employees_always_file_for_themselves() {
        let employee = user(Role::Employee, Some("Ayu"));
        assert_eq!(filing_name(&employee, Some("Wayan")).unwrap(), "Ayu");
        assert!(matches!(
            filing_name(&user(Role::Employee, None), None),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn privileged_users_must_name_the_employee() {
        let hr = user(Role::Hr, None);
        assert_eq!(filing_name(&hr, Some("  Wayan ")).unwrap(), "Wayan");
        assert!(matches!(filing_name(&hr, Some(" ")), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn delete_rules() {
        let ayu = user(Role::Employee, Some("Ayu"));
        assert!(may_delete(&ayu, &record(1, "Ayu", LeaveStatus::Pending)));
        assert!(!may_delete(&ayu, &record(2, "Ayu", LeaveStatus::Approved)));
        assert!(!may_delete(&ayu, &record(3, "Wayan", LeaveStatus::Pending)));
        assert!(may_delete(&user(Role::Admin, None), &record(4, "Wayan", LeaveStatus::Rejected)));
    }

    #[test]
    fn refused_delete_is_classified_from_the_current_row() {
        let ayu = user(Role::Employee, Some("Ayu"));
        // approved after the caller last looked
        assert!(matches!(
            delete_refusal(&ayu, Some(&record(7, "Ayu", LeaveStatus::Approved))),
            AppError::Forbidden(_)
        ));
        assert!(matches!(delete_refusal(&ayu, None), AppError::NotFound(_)));
        assert!(matches!(
            delete_refusal(&ayu, Some(&record(8, "Wayan", LeaveStatus::Pending))),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            delete_refusal(&ayu, Some(&record(9, "Ayu", LeaveStatus::Pending))),
            AppError::Conflict(_)
        ));
        assert!(matches!(delete_refusal(&user(Role::Hr, None), None), AppError::NotFound(_)));
    }

    #[test]
    fn huge_page_numbers_yield_an_empty_page() {
        let records = vec![record(1, "Ayu", LeaveStatus::Pending)];
        let filter = LeaveFilter {
            status: None,
            employee: None,
            page: Some(u32::MAX),
            per_page: Some(100),
        };
        let page = filter_page(&records, &RecordScope::All, &filter);
        assert!(page.data.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.page, u32::MAX);
    }

    #[test]
    fn list_filters_scope_status_and_pages() {
        let records: Vec<_> = (1..=25)
            .map(|i| {
                let status = if i % 2 == 0 { LeaveStatus::Pending } else { LeaveStatus::Approved };
                record(i, if i <= 20 { "Ayu" } else { "Wayan" }, status)
            })
            .collect();

        let filter = LeaveFilter { status: None, employee: None, page: Some(3), per_page: Some(10) };
        let page = filter_page(&records, &RecordScope::All, &filter);
        assert_eq!(page.total, 25);
        assert_eq!(page.data.len(), 5);
        assert_eq!(page.data[0].id, 21);

        let filter = LeaveFilter {
            status: Some(LeaveStatus::Pending),
            employee: Some("wayan".into()),
            page: None,
            per_page: None,
        };
        let page = filter_page(&records, &RecordScope::All, &filter);
        assert_eq!(page.data.iter().map(|r| r.id).collect::<Vec<_>>(), vec![22, 24]);

        let filter = LeaveFilter { status: None, employee: None, page: None, per_page: None };
        let own = filter_page(&records, &RecordScope::Own("Wayan".into()), &filter);
        assert_eq!(own.total, 5);
    }

    #[test]
    fn sse_frame_is_a_named_event() {
        let frame = sse_frame(&FeedStats { pending: 2, approved: 1, rejected: 0 });
        assert_eq!(
            std::str::from_utf8(&frame).unwrap(),
            "event: leave\ndata: {\"pending\":2,\"approved\":1,\"rejected\":0}\n\n"
        );
    }
}
