use crate::api::employee::{CreateEmployee, EmployeeListResponse};
use crate::api::health::{CheckState, HealthReport};
use crate::api::holiday::HolidayResponse;
use crate::api::leave_request::{CreateLeave, LeaveListResponse, SummaryResponse};
use crate::auth::handlers::LoginResponse;
use crate::leave::aggregate::{EmployeeTotals, PendingSort};
use crate::leave::feed::FeedStats;
use crate::model::employee::Employee;
use crate::model::holiday::{HolidayCategory, HolidayEvent};
use crate::model::leave_record::{LeaveCategory, LeaveRecord, LeaveStatus};
use crate::models::{CreateUserReq, LoginReqDto, PasswordResetConfirm, PasswordResetReq};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Scheduler API",
        version = "1.0.0",
        description = r#"
## Leave Scheduler

Backend for a leave calendar: employees file leave, HR/Admin decide on it,
and the calendar overlays Balinese ceremonial and Indonesian statutory holidays.

### Key Features
- **Leave**
  - File, approve, reject and delete leave; pending queue with six sort orders
  - Per-employee category totals
  - Live `text/event-stream` of status counts
- **Holidays**
  - Pawukon ceremonial observances projected from a 210-day cycle
  - Statutory holidays from Nager.Date plus fixed national observances
- **Accounts**
  - Admin-managed users and emailed password reset links

### Security
Every endpoint under the API prefix needs a **JWT Bearer** access token.
Employees only ever see their own records.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::confirm_password_reset,

        crate::api::health::health,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::delete_leave,
        crate::api::leave_request::pending_list,
        crate::api::leave_request::leave_summary,
        crate::api::leave_request::leave_events,

        crate::api::holiday::list_holidays,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,

        crate::api::admin::create_user,
        crate::api::admin::delete_user,
        crate::api::admin::issue_password_reset
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            PasswordResetConfirm,
            PasswordResetReq,
            CreateUserReq,
            HealthReport,
            CheckState,
            LeaveRecord,
            LeaveCategory,
            LeaveStatus,
            CreateLeave,
            LeaveListResponse,
            PendingSort,
            EmployeeTotals,
            SummaryResponse,
            FeedStats,
            HolidayEvent,
            HolidayCategory,
            HolidayResponse,
            Employee,
            CreateEmployee,
            EmployeeListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token rotation and password reset"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Holiday", description = "Calendar holiday markers"),
        (name = "Employee", description = "Employee directory"),
        (name = "Admin", description = "Account administration"),
        (name = "Health", description = "Readiness probe"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
