use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub reset_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_reset_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Statutory holiday feed
    pub holiday_api_base: String,
    pub holiday_country: String,
    pub holiday_year_span: i32,
    pub holiday_cache_ttl_secs: u64,
    pub holiday_fetch_timeout_secs: u64,

    // Outbound mail relay + password reset links
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub mail_from: String,
    pub reset_link_base: String,
    pub reset_continue_url: Option<String>,
    pub reset_allowed_hosts: Vec<String>,
}

/// Reads `key`, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            // empty values surface through missing_required()
            database_url: env_string("DATABASE_URL", ""),
            jwt_secret: env_string("JWT_SECRET", ""),
            access_token_ttl: env_or("ACCESS_TOKEN_TTL", 900), // default 15 min
            refresh_token_ttl: env_or("REFRESH_TOKEN_TTL", 604_800), // default 7 days
            reset_token_ttl: env_or("RESET_TOKEN_TTL", 3600),

            rate_login_per_min: env_or("RATE_LOGIN_PER_MIN", 60),
            rate_reset_per_min: env_or("RATE_RESET_PER_MIN", 10),
            rate_refresh_per_min: env_or("RATE_REFRESH_PER_MIN", 30),
            rate_protected_per_min: env_or("RATE_PROTECTED_PER_MIN", 1000),

            api_prefix: env_string("API_PREFIX", "/api/v1"),

            holiday_api_base: env_string("HOLIDAY_API_BASE", "https://date.nager.at"),
            holiday_country: env_string("HOLIDAY_COUNTRY", "ID"),
            holiday_year_span: env_or("HOLIDAY_YEAR_SPAN", 5),
            holiday_cache_ttl_secs: env_or("HOLIDAY_CACHE_TTL_SECS", 86_400),
            holiday_fetch_timeout_secs: env_or("HOLIDAY_FETCH_TIMEOUT_SECS", 10),

            smtp_host: env_string("SMTP_HOST", ""),
            smtp_port: env_or("SMTP_PORT", 587),
            smtp_username: env_string("SMTP_USERNAME", ""),
            smtp_password: env_string("SMTP_PASSWORD", ""),
            mail_from: env_string("MAIL_FROM", ""),
            reset_link_base: env_string("RESET_LINK_BASE", ""),
            reset_continue_url: env::var("RESET_CONTINUE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            reset_allowed_hosts: split_list(&env_string("RESET_ALLOWED_HOSTS", "")),
        }
    }

    /// Names of settings the admin endpoints need that are empty.
    /// Reported by the readiness probe.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let checks = [
            ("JWT_SECRET", &self.jwt_secret),
            ("DATABASE_URL", &self.database_url),
            ("SMTP_HOST", &self.smtp_host),
            ("MAIL_FROM", &self.mail_from),
            ("RESET_LINK_BASE", &self.reset_link_base),
        ];

        checks
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }
}

#[cfg(test)]
impl Config {
    /// Fully populated config for unit tests, no environment access.
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/leave_test".into(),
            jwt_secret: "test-secret".into(),
            server_addr: "127.0.0.1:0".into(),
            access_token_ttl: 900,
            refresh_token_ttl: 604_800,
            reset_token_ttl: 3600,
            rate_login_per_min: 60,
            rate_reset_per_min: 10,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api/v1".into(),
            holiday_api_base: "http://localhost:9".into(),
            holiday_country: "ID".into(),
            holiday_year_span: 5,
            holiday_cache_ttl_secs: 60,
            holiday_fetch_timeout_secs: 1,
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            smtp_username: "mailer".into(),
            smtp_password: "secret".into(),
            mail_from: "Leave Desk <leave@example.com>".into(),
            reset_link_base: "https://leave.example.com/reset".into(),
            reset_continue_url: Some("https://leave.example.com/login".into()),
            reset_allowed_hosts: vec!["leave.example.com".into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_lowercases() {
        assert_eq!(
            split_list(" Leave.Example.com , ,intranet.local"),
            vec!["leave.example.com".to_string(), "intranet.local".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn missing_required_lists_empty_settings() {
        let mut config = Config::for_tests();
        assert!(config.missing_required().is_empty());

        config.smtp_host.clear();
        config.reset_link_base = "  ".into();
        assert_eq!(config.missing_required(), vec!["SMTP_HOST", "RESET_LINK_BASE"]);
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        // unlikely to collide with a real variable
        assert_eq!(env_or("LEAVE_SCHEDULER_TEST_UNSET_VAR", 42u32), 42);
    }
}
