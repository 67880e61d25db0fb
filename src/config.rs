use dotenvy::dotenv;
use std::env;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    // App
    pub app_name:            String,
    pub debug:               bool,
    pub log_level:           String,

    // Server
    pub server_host:         String,
    pub server_port:         u16,
    pub request_timeout_secs: u64,

    // Database
    pub db_host:             String,
    pub db_port:             u16,
    pub db_name:             String,
    pub db_user:             String,
    pub db_password:         String,

    // Member session
    pub session_name:        String,
    pub session_key:         String,
    pub session_max_age:     i64,

    // Admin session
    pub admin_session_name:    String,
    pub admin_session_key:     String,
    pub admin_session_max_age: i64,

    // Root administrator (plaintext comparison, see routes/admin.rs)
    pub root_user_name:      String,
    pub root_user_password:  String,

    // Site auth
    pub paths_excluded_from_auth: Vec<String>,
    pub html_paths:               Vec<String>,

    // Members
    pub page_size:                     u32,
    pub deleted_member_retention_days: u32,
    pub member_purge_schedule:         String,

    // Object storage
    pub gobucket_url:         String,
    pub gobucket_app_key:     String,
    pub gobucket_client_code: String,

    // Templates
    pub template_dir:        Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        fn require(key: &str) -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        }

        fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
            match env::var(key) {
                Ok(raw) => raw
                    .trim()
                    .parse::<T>()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw)),
                Err(_) => Ok(default),
            }
        }

        fn list_or(key: &str, default: &[&str]) -> Vec<String> {
            match env::var(key) {
                Ok(raw) => split_list(&raw),
                Err(_) => default.iter().map(|s| s.to_string()).collect(),
            }
        }

        let config = Self {
            app_name:  env::var("APP_NAME").unwrap_or_else(|_| "Frame".into()),
            debug:     parse_or("DEBUG", false)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),

            server_host:          env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port:          parse_or("SERVER_PORT", 8080)?,
            request_timeout_secs: parse_or("SERVER_REQUEST_TIMEOUT", 60)?,

            db_host:     env::var("DB_HOST").unwrap_or_else(|_| "db".into()),
            db_port:     parse_or("DB_PORT", 3306)?,
            db_name:     require("DB_NAME")?,
            db_user:     require("DB_USER")?,
            db_password: require("DB_PASSWORD")?,

            session_name:    env::var("SESSION_NAME").unwrap_or_else(|_| "frame-session".into()),
            session_key:     require("SESSION_KEY")?,
            session_max_age: parse_or("SESSION_MAX_AGE", 86_400)?,

            admin_session_name:    env::var("ADMIN_SESSION_NAME")
                .unwrap_or_else(|_| "frame-admin-session".into()),
            admin_session_key:     require("ADMIN_SESSION_KEY")?,
            admin_session_max_age: parse_or("ADMIN_SESSION_MAX_AGE", 3_600)?,

            root_user_name:     require("ROOT_USER_NAME")?,
            root_user_password: require("ROOT_USER_PASSWORD")?,

            paths_excluded_from_auth: list_or("SITE_AUTH_EXCLUDED_PATHS", &["/"]),
            html_paths:               list_or("SITE_AUTH_HTML_PATHS", &["/member"]),

            page_size:                     parse_or("PAGE_SIZE", 20)?,
            deleted_member_retention_days: parse_or("DELETED_MEMBER_RETENTION_DAYS", 30)?,
            member_purge_schedule:         env::var("MEMBER_PURGE_SCHEDULE")
                .unwrap_or_else(|_| "0 0 3 * * *".into()),

            gobucket_url:         env::var("GOBUCKET_URL").unwrap_or_default(),
            gobucket_app_key:     env::var("GOBUCKET_APP_KEY").unwrap_or_default(),
            gobucket_client_code: env::var("GOBUCKET_CLIENT_CODE").unwrap_or_default(),

            template_dir: env::var("TEMPLATE_DIR").ok().filter(|s| !s.trim().is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Member and admin sessions are separate trust domains: they may never
    /// share a cookie name or a signing key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_name == self.admin_session_name {
            return Err(ConfigError::InvalidValue(
                "ADMIN_SESSION_NAME".into(),
                "must differ from SESSION_NAME".into(),
            ));
        }
        if self.session_key == self.admin_session_key {
            return Err(ConfigError::InvalidValue(
                "ADMIN_SESSION_KEY".into(),
                "must differ from SESSION_KEY".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue("PAGE_SIZE".into(), "0".into()));
        }
        Ok(())
    }

    pub fn database_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.db_user,
            self.db_password,
            self.db_host,
            self.db_port,
            self.db_name,
        )
    }

    /// Cookies carry `Secure` everywhere except in debug mode.
    pub fn secure_cookies(&self) -> bool {
        !self.debug
    }

    pub fn bucket_enabled(&self) -> bool {
        !self.gobucket_url.trim().is_empty()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
