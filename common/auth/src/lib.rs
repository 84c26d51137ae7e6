pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod gate;
pub mod policy;
pub mod roles;
pub mod token;

pub use claims::{EmployeeClaims, OrganizationClaims};
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::{EmployeeContext, OrganizationContext, Scope};
pub use gate::{require_employee, require_organization, EmployeeGate};
pub use policy::Capability;
pub use roles::Role;
pub use token::{TokenIssuer, TokenVerifier};
