use serde::Deserialize;

pub const DEFAULT_MAX_LOGIN_ATTEMPTS: i32 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// Failed logins after which an account is locked.
    pub max_login_attempts: i32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "usermgmt".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "usermgmt-users".into()),
            ttl_minutes: parse_env("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: parse_env("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };
        let max_login_attempts =
            parse_env("MAX_LOGIN_ATTEMPTS").unwrap_or(DEFAULT_MAX_LOGIN_ATTEMPTS);
        Ok(Self {
            database_url,
            jwt,
            max_login_attempts,
        })
    }

    /// Fixed values for test runs; only the database location varies.
    pub fn for_tests(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_config_has_fixed_jwt_values() {
        let cfg = AppConfig::for_tests("postgres://localhost/test");
        assert_eq!(cfg.database_url, "postgres://localhost/test");
        assert_eq!(cfg.jwt.issuer, "test-issuer");
        assert_eq!(cfg.jwt.audience, "test-aud");
        assert_eq!(cfg.max_login_attempts, DEFAULT_MAX_LOGIN_ATTEMPTS);
    }

    #[test]
    #[serial]
    fn parse_env_ignores_unparsable_values() {
        std::env::set_var("USERMGMT_TEST_NOT_A_NUMBER", "abc");
        std::env::set_var("USERMGMT_TEST_NUMBER", "42");
        let unparsable = parse_env::<i64>("USERMGMT_TEST_NOT_A_NUMBER");
        let number = parse_env::<i64>("USERMGMT_TEST_NUMBER");
        std::env::remove_var("USERMGMT_TEST_NOT_A_NUMBER");
        std::env::remove_var("USERMGMT_TEST_NUMBER");

        assert_eq!(unparsable, None);
        assert_eq!(number, Some(42));
        assert_eq!(parse_env::<i64>("USERMGMT_TEST_MISSING_KEY"), None);
    }

    #[test]
    #[serial]
    fn max_login_attempts_falls_back_to_default() {
        let vars = [
            ("DATABASE_URL", "postgres://localhost/app"),
            ("JWT_SECRET", "s3cret"),
            ("MAX_LOGIN_ATTEMPTS", "not-a-number"),
        ];
        let saved: Vec<_> = vars.iter().map(|(k, _)| (*k, std::env::var(k).ok())).collect();
        for (k, v) in vars {
            std::env::set_var(k, v);
        }
        let cfg = AppConfig::from_env();
        for (k, previous) in saved {
            match previous {
                Some(v) => std::env::set_var(k, v),
                None => std::env::remove_var(k),
            }
        }

        let cfg = cfg.expect("config from env");
        assert_eq!(cfg.max_login_attempts, DEFAULT_MAX_LOGIN_ATTEMPTS);
        assert_eq!(cfg.jwt.secret, "s3cret");
    }
}
