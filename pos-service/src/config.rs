use anyhow::{anyhow, Context, Result};
use common_auth::JwtConfig;

const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

pub fn load_service_config() -> Result<ServiceConfig> {
    ServiceConfig::from_lookup(|key| std::env::var(key).ok())
}

impl ServiceConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .and_then(|value| normalize_optional(&value))
            .ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5u32)?;
        let run_migrations = lookup("RUN_MIGRATIONS")
            .map(|value| is_truthy(&value))
            .unwrap_or(false);

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 8090u16)?;

        let secret = lookup("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;
        if secret.len() < MIN_SECRET_BYTES {
            return Err(anyhow!(
                "JWT_SECRET must be at least {MIN_SECRET_BYTES} bytes long"
            ));
        }
        let issuer = lookup("JWT_ISSUER")
            .and_then(|value| normalize_optional(&value))
            .unwrap_or_else(|| "pos-ninja".to_string());
        let leeway = parse_or(&lookup, "JWT_LEEWAY_SECONDS", 30u32)?;
        let org_ttl = parse_or(&lookup, "ORG_TOKEN_TTL_SECONDS", 24 * 60 * 60i64)?;
        let employee_ttl = parse_or(&lookup, "EMPLOYEE_TOKEN_TTL_SECONDS", 12 * 60 * 60i64)?;
        if org_ttl <= 0 || employee_ttl <= 0 {
            return Err(anyhow!("token TTLs must be positive"));
        }

        let jwt = JwtConfig::new(secret.into_bytes(), issuer)
            .with_leeway(leeway)
            .with_ttls(org_ttl, employee_ttl);

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|value| parse_list(&value))
            .unwrap_or_default();

        Ok(Self {
            database_url,
            max_connections,
            run_migrations,
            host,
            port,
            jwt,
            cors_allowed_origins,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).and_then(|value| normalize_optional(&value)) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("Failed to parse {key}='{value}'")),
        None => Ok(default),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|item| normalize_optional(item))
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
