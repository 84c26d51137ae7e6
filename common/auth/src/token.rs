use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::claims::{EmployeeClaims, EmployeeRepr, OrganizationClaims, OrganizationRepr};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Mints organization and employee bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    config: JwtConfig,
    encoding_key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(&config.secret);
        Self {
            config,
            encoding_key,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn issue_organization_token(&self, organization_id: i64) -> AuthResult<String> {
        self.issue_organization_token_at(organization_id, Utc::now())
    }

    pub fn issue_employee_token(
        &self,
        organization_id: i64,
        outlet_id: i64,
        employee_id: i64,
        role: Role,
    ) -> AuthResult<String> {
        self.issue_employee_token_at(organization_id, outlet_id, employee_id, role, Utc::now())
    }

    pub(crate) fn issue_organization_token_at(
        &self,
        organization_id: i64,
        issued_at: DateTime<Utc>,
    ) -> AuthResult<String> {
        let expires_at = issued_at + Duration::seconds(self.config.organization_ttl_seconds);
        let payload = OrganizationRepr {
            org_id: organization_id,
            iss: self.config.issuer.clone(),
            aud: self.config.organization_audience(),
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
        };
        self.sign(&payload)
    }

    pub(crate) fn issue_employee_token_at(
        &self,
        organization_id: i64,
        outlet_id: i64,
        employee_id: i64,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> AuthResult<String> {
        let expires_at = issued_at + Duration::seconds(self.config.employee_ttl_seconds);
        let payload = EmployeeRepr {
            org_id: organization_id,
            outlet_id,
            employee_id,
            role: role.as_str().to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.employee_audience(),
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
        };
        self.sign(&payload)
    }

    fn sign<T: serde::Serialize>(&self, payload: &T) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), payload, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }
}

/// Verifies signature, issuer, audience and expiry of bearer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    config: JwtConfig,
    decoding_key: DecodingKey,
}

impl TokenVerifier {
    pub fn new(config: JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(&config.secret);
        Self {
            config,
            decoding_key,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn parse_organization_token(&self, token: &str) -> AuthResult<OrganizationClaims> {
        let repr: OrganizationRepr = self.decode(token, self.config.organization_audience())?;
        let claims = OrganizationClaims::try_from(repr)?;
        debug!(org_id = claims.organization_id, "verified organization token");
        Ok(claims)
    }

    pub fn parse_employee_token(&self, token: &str) -> AuthResult<EmployeeClaims> {
        let repr: EmployeeRepr = self.decode(token, self.config.employee_audience())?;
        let claims = EmployeeClaims::try_from(repr)?;
        debug!(
            org_id = claims.organization_id,
            employee_id = claims.employee_id,
            role = %claims.role,
            "verified employee token"
        );
        Ok(claims)
    }

    fn decode<T: DeserializeOwned>(&self, token: &str, audience: String) -> AuthResult<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = self.config.leeway_seconds.into();

        let data = decode::<T>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}
