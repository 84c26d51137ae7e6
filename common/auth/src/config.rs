/// Runtime configuration for issuing and verifying tokens.
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared HS256 secret.
    pub secret: Vec<u8>,
    /// Issuer claim (iss); also the prefix of the per-kind audiences.
    pub issuer: String,
    /// Allowable clock skew in seconds when validating exp.
    pub leeway_seconds: u32,
    /// Lifetime of organization tokens.
    pub organization_ttl_seconds: i64,
    /// Lifetime of employee tokens.
    pub employee_ttl_seconds: i64,
}

impl JwtConfig {
    /// Construct config with sensible defaults (30 second leeway, one day
    /// organization tokens, twelve hour employee tokens).
    pub fn new(secret: impl Into<Vec<u8>>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            leeway_seconds: 30,
            organization_ttl_seconds: 24 * 60 * 60,
            employee_ttl_seconds: 12 * 60 * 60,
        }
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn with_ttls(mut self, organization_seconds: i64, employee_seconds: i64) -> Self {
        self.organization_ttl_seconds = organization_seconds;
        self.employee_ttl_seconds = employee_seconds;
        self
    }

    pub fn organization_audience(&self) -> String {
        format!("{}/organization", self.issuer)
    }

    pub fn employee_audience(&self) -> String {
        format!("{}/employee", self.issuer)
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("leeway_seconds", &self.leeway_seconds)
            .field("organization_ttl_seconds", &self.organization_ttl_seconds)
            .field("employee_ttl_seconds", &self.employee_ttl_seconds)
            .finish()
    }
}
