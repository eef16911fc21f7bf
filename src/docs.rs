use crate::api::attendance::{ManualAttendanceReq, RejectReq};
use crate::api::course::{CreateCourseReq, ReviewSubmissionReq, SubmitCourseReq};
use crate::api::leave::{ApplyLeaveReq, LeaveStatusReq};
use crate::api::payroll::AddSalaryReq;
use crate::api::review::CreateReviewReq;
use crate::api::users::{CreateUserReq, UpdateUserReq};
use crate::model::attendance::{Attendance, AttendanceWithName, WeeklyChartEntry};
use crate::model::course::{Course, CourseSubmission, SubmissionDetail};
use crate::model::leave::{Leave, LeaveBalance, LeaveSummary, LeaveWithUser};
use crate::model::payroll::{PayrollRecord, PayrollWithName};
use crate::model::profile::{EmployeeProfile, ProfileSummary};
use crate::model::review::PerformanceReview;
use crate::model::role::Role;
use crate::model::user::User;
use crate::models::{ForgotPasswordReq, LoginReqDto, LoginResponse, ResetPasswordReq, TokenPair};
use crate::service::dashboard::{DashboardStats, GrowthPoint};
use crate::service::payroll::SalaryCountdown;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM System API",
        version = "1.0.0",
        description = r#"
## Human Resource Management (HRM) System

Backend for a small organisation's HR operations.

### Key Features
- **Users and profiles**: accounts with Admin, Manager and Employee roles, plus free-form profile sections
- **Attendance**: daily punch in and out, manual requests reviewed by an admin
- **Leave**: per-type balances, applications and approvals
- **Salary**: monthly records, PDF payslips and reports, payday countdown
- **Training**: courses, completion submissions and reviews
- **Performance reviews** and dashboard statistics

### Security
Everything under `/api` needs a JWT access token in `Authorization: Bearer <token>`.
Obtain one from `/auth/login`; renew it with `/auth/refresh`.

### Errors
Failures return `{"error": "..."}`, or `{"errors": {"field": ["..."]}}` for field validation.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::forgot_password,
        crate::auth::handlers::reset_password,

        crate::api::users::create_user,
        crate::api::users::list_users,
        crate::api::users::search_users,
        crate::api::users::me,
        crate::api::users::get_user,
        crate::api::users::update_user,
        crate::api::users::deactivate_user,
        crate::api::users::delete_user,

        crate::api::profile::get_profile,
        crate::api::profile::upsert_profile,
        crate::api::profile::list_profiles,

        crate::api::attendance::punch_in,
        crate::api::attendance::punch_out,
        crate::api::attendance::request_manual,
        crate::api::attendance::my_records,
        crate::api::attendance::pending_requests,
        crate::api::attendance::approve,
        crate::api::attendance::reject,
        crate::api::attendance::search,

        crate::api::leave::apply,
        crate::api::leave::balance,
        crate::api::leave::my_leaves,
        crate::api::leave::update_status,
        crate::api::leave::pending,
        crate::api::leave::search,
        crate::api::leave::employee_leaves,
        crate::api::leave::dashboard_summary,

        crate::api::payroll::add_salary,
        crate::api::payroll::my_records,
        crate::api::payroll::payslip,
        crate::api::payroll::employee_records,
        crate::api::payroll::all_records,
        crate::api::payroll::export_pdf,
        crate::api::payroll::countdown,

        crate::api::course::list_courses,
        crate::api::course::create_course,
        crate::api::course::department_courses,
        crate::api::course::submit,
        crate::api::course::my_submissions,
        crate::api::course::pending_submissions,
        crate::api::course::review_submission,

        crate::api::review::create_review,
        crate::api::review::list_reviews,

        crate::api::dashboard::stats,
        crate::api::dashboard::weekly_chart,
        crate::api::dashboard::employee_growth,
        crate::api::dashboard::department_counts
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            TokenPair,
            ForgotPasswordReq,
            ResetPasswordReq,
            Role,
            User,
            CreateUserReq,
            UpdateUserReq,
            EmployeeProfile,
            ProfileSummary,
            Attendance,
            AttendanceWithName,
            WeeklyChartEntry,
            ManualAttendanceReq,
            RejectReq,
            Leave,
            LeaveWithUser,
            LeaveBalance,
            LeaveSummary,
            ApplyLeaveReq,
            LeaveStatusReq,
            PayrollRecord,
            PayrollWithName,
            SalaryCountdown,
            AddSalaryReq,
            Course,
            CourseSubmission,
            SubmissionDetail,
            CreateCourseReq,
            SubmitCourseReq,
            ReviewSubmissionReq,
            PerformanceReview,
            CreateReviewReq,
            DashboardStats,
            GrowthPoint
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh and password reset"),
        (name = "Users", description = "Account management APIs"),
        (name = "Profiles", description = "Employee profile sections"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Payroll", description = "Salary records, payslips and reports"),
        (name = "Courses", description = "Training courses and submissions"),
        (name = "Reviews", description = "Performance reviews"),
        (name = "Dashboard", description = "Aggregate statistics"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme the protected paths refer to.
pub struct SecurityAddon;

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
