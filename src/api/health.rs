use crate::config::Config;
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HealthQuery {
    /// Also prove the store accepts writes
    pub write: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Ok,
    Failed,
    Skipped,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthReport {
    #[schema(example = "ok")]
    pub status: &'static str,
    pub missing_config: Vec<&'static str>,
    pub database_read: CheckState,
    pub database_write: CheckState,
}

impl HealthReport {
    pub fn new(
        missing_config: Vec<&'static str>,
        database_read: CheckState,
        database_write: CheckState,
    ) -> Self {
        let healthy = missing_config.is_empty()
            && database_read == CheckState::Ok
            && database_write != CheckState::Failed;
        Self {
            status: if healthy { "ok" } else { "degraded" },
            missing_config,
            database_read,
            database_write,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

async fn probe_read(pool: &MySqlPool) -> CheckState {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await {
        Ok(_) => CheckState::Ok,
        Err(e) => {
            warn!(error = %e, "health: database read failed");
            CheckState::Failed
        }
    }
}

async fn probe_write(pool: &MySqlPool) -> CheckState {
    match sqlx::query("REPLACE INTO health_checks (id, checked_at) VALUES (1, NOW())")
        .execute(pool)
        .await
    {
        Ok(_) => CheckState::Ok,
        Err(e) => {
            warn!(error = %e, "health: database write failed");
            CheckState::Failed
        }
    }
}

/// Liveness/readiness probe
#[utoipa::path(
    get,
    path = "/health",
    params(HealthQuery),
    responses(
        (status = 200, description = "All checks passed", body = HealthReport),
        (status = 503, description = "Configuration missing or store unreachable", body = HealthReport)
    ),
    tag = "Health"
)]
pub async fn health(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<HealthQuery>,
) -> HttpResponse {
    let database_read = probe_read(pool.get_ref()).await;
    let database_write = if query.write.unwrap_or(false) {
        probe_write(pool.get_ref()).await
    } else {
        CheckState::Skipped
    };

    let report = HealthReport::new(config.missing_required(), database_read, database_write);

    if report.is_healthy() {
        HttpResponse::Ok().json(report)
    } else {
        HttpResponse::ServiceUnavailable().json(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_write_probe_is_healthy() {
        let report = HealthReport::new(vec![], CheckState::Ok, CheckState::Skipped);
        assert!(report.is_healthy());
    }

    #[test]
    fn any_failure_degrades() {
        assert!(!HealthReport::new(vec!["SMTP_HOST"], CheckState::Ok, CheckState::Ok).is_healthy());
        assert!(!HealthReport::new(vec![], CheckState::Failed, CheckState::Skipped).is_healthy());
        assert!(!HealthReport::new(vec![], CheckState::Ok, CheckState::Failed).is_healthy());
    }

    #[test]
    fn report_serializes_lowercase_states() {
        let report = HealthReport::new(vec![], CheckState::Ok, CheckState::Skipped);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["database_write"], "skipped");
    }
}
