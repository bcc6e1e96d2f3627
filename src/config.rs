use std::{str::FromStr, time::Duration};

use anyhow::Context;

/// Longest accepted session lifetime: one year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    /// Session lifetime, rejected outside `1..=MAX_TTL_MINUTES` minutes.
    pub fn ttl(&self) -> anyhow::Result<Duration> {
        if !(1..=MAX_TTL_MINUTES).contains(&self.ttl_minutes) {
            anyhow::bail!(
                "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {}",
                self.ttl_minutes
            );
        }
        let secs = u64::try_from(self.ttl_minutes)?
            .checked_mul(60)
            .context("JWT_TTL_MINUTES overflows")?;
        Ok(Duration::from_secs(secs))
    }
}

/// Argon2 work factor. Read once at startup and shared read-only.
#[derive(Debug, Clone, Copy)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub environment: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "endevera".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "endevera-portal".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24 * 7),
        };
        if jwt.secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        jwt.ttl()?;
        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("ARGON2_ITERATIONS", defaults.iterations),
        };
        Ok(Self {
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 20),
            database_acquire_timeout_secs: env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 5),
            jwt,
            password,
            environment: std::env::var("APP_ENV").unwrap_or_else(|_| "production".into()),
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Internal error chains are shown to clients only in development.
    pub fn expose_internal_errors(&self) -> bool {
        self.is_development()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    parse_or(std::env::var(key).ok().as_deref(), default)
}

fn parse_or<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_on_missing_or_garbage() {
        assert_eq!(parse_or::<i64>(None, 42), 42);
        assert_eq!(parse_or::<i64>(Some("nope"), 42), 42);
        assert_eq!(parse_or::<i64>(Some(" 15 "), 42), 15);
    }

    #[test]
    fn development_flag_is_case_insensitive() {
        let mut cfg = crate::testing::test_config();
        cfg.environment = "Development".into();
        assert!(cfg.is_development());
        cfg.environment = "production".into();
        assert!(!cfg.is_development());
        assert!(!cfg.expose_internal_errors());
    }

    #[test]
    fn ttl_outside_bounds_is_rejected() {
        let mut jwt = crate::testing::test_config().jwt;
        assert_eq!(jwt.ttl().unwrap(), Duration::from_secs(5 * 60));
        for minutes in [0, -1, MAX_TTL_MINUTES + 1, i64::MAX] {
            jwt.ttl_minutes = minutes;
            assert!(jwt.ttl().is_err(), "ttl {minutes}");
        }
        jwt.ttl_minutes = MAX_TTL_MINUTES;
        assert!(jwt.ttl().is_ok());
    }
}
