use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub session_hours: i64,
    pub remember_me_days: i64,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub work_day: i32,
    pub ldap: LdapConfig,
    pub directory_fixture: Option<String>,
    pub directory_cache_ttl_secs: u64,
    pub directory_miss_ttl_secs: u64,
    pub email: EmailConfig,
    pub calendar_name: String,
}

#[derive(Debug, Clone)]
pub struct LdapConfig {
    pub uri: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub search_base: String,
    pub user_dn_template: String,
    pub start_tls: bool,
    pub email_domain: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub fallback_to_address: String,
    pub blacklist: Vec<String>,
    pub subject: String,
    pub subject_edit: String,
    pub signature: String,
}

/// Yearly allowance for a country, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CountryTotals {
    pub holidays: i32,
    pub sickdays: i32,
}

pub fn country_totals(country: &str) -> Option<CountryTotals> {
    match country {
        "US" => Some(CountryTotals {
            holidays: 21,
            sickdays: 0,
        }),
        "GB" => Some(CountryTotals {
            holidays: 18,
            sickdays: 6,
        }),
        _ => None,
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_env_only()
    }

    /// Load configuration from environment variables only (without loading .env files)
    /// This is useful for testing where you want to control the environment directly
    pub fn from_env_only() -> Result<Self> {
        let blacklist = var_or("EMAIL_BLACKLIST", "all@mozilla.com,all-mv@mozilla.com")
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            database_url: var_or("DATABASE_URL", "sqlite:pto.db"),
            jwt_secret: var_or(
                "JWT_SECRET",
                "your-super-secret-jwt-key-change-this-in-production-12345",
            ),
            session_hours: parsed_or("SESSION_HOURS", 24),
            remember_me_days: parsed_or("REMEMBER_ME_DAYS", 30),
            host: var_or("HOST", "127.0.0.1"),
            port: parsed_or("PORT", 8080),
            environment: var_or("ENVIRONMENT", "development"),
            work_day: parsed_or("WORK_DAY", 8),
            ldap: LdapConfig {
                uri: var_or("LDAP_URI", ""),
                bind_dn: var_or("LDAP_BIND_DN", ""),
                bind_password: var_or("LDAP_BIND_PASSWORD", ""),
                search_base: var_or("LDAP_SEARCH_BASE", "dc=mozilla"),
                user_dn_template: var_or("LDAP_USER_DN_TEMPLATE", "mail=%(user)s,o=com,dc=mozilla"),
                start_tls: parsed_or("LDAP_START_TLS", true),
                email_domain: var_or("LDAP_EMAIL_DOMAIN", "mozilla.com"),
            },
            directory_fixture: env::var("DIRECTORY_FIXTURE").ok().filter(|s| !s.is_empty()),
            directory_cache_ttl_secs: parsed_or("DIRECTORY_CACHE_TTL_SECS", 60 * 60),
            directory_miss_ttl_secs: parsed_or("DIRECTORY_MISS_TTL_SECS", 60),
            email: EmailConfig {
                smtp_host: var_or("SMTP_HOST", ""),
                smtp_port: parsed_or("SMTP_PORT", 25),
                fallback_to_address: var_or("FALLBACK_TO_ADDRESS", "jvandeven@mozilla.com"),
                blacklist,
                subject: var_or(
                    "EMAIL_SUBJECT",
                    "PTO notification from %(first_name)s %(last_name)s",
                ),
                subject_edit: var_or(
                    "EMAIL_SUBJECT_EDIT",
                    "PTO update from %(first_name)s %(last_name)s",
                ),
                signature: var_or("EMAIL_SIGNATURE", "The Mozilla PTO cruncher"),
            },
            calendar_name: var_or("CALENDAR_NAME", "Mozilla Vacation"),
        })
    }

    /// Deterministic configuration for tests; never reads the environment.
    pub fn test_config() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-jwt-secret-key-that-is-long-enough".to_string(),
            session_hours: 1,
            remember_me_days: 1,
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            work_day: 8,
            ldap: LdapConfig {
                uri: String::new(),
                bind_dn: String::new(),
                bind_password: String::new(),
                search_base: "dc=mozilla".to_string(),
                user_dn_template: "mail=%(user)s,o=com,dc=mozilla".to_string(),
                start_tls: false,
                email_domain: "mozilla.com".to_string(),
            },
            directory_fixture: None,
            directory_cache_ttl_secs: 60 * 60,
            directory_miss_ttl_secs: 60,
            email: EmailConfig {
                smtp_host: String::new(),
                smtp_port: 25,
                fallback_to_address: "fallback@mozilla.com".to_string(),
                blacklist: vec!["all@mozilla.com".to_string()],
                subject: "PTO notification from %(first_name)s %(last_name)s".to_string(),
                subject_edit: "PTO update from %(first_name)s %(last_name)s".to_string(),
                signature: "The PTO cruncher".to_string(),
            },
            calendar_name: "Test Vacation".to_string(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn half_day(&self) -> i32 {
        self.work_day / 2
    }
}
