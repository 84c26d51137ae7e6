use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use common_auth::{JwtConfig, Role, TokenIssuer};

#[derive(Parser, Debug)]
#[command(about = "Issue organization or employee tokens for local testing", long_about = None)]
struct Options {
    #[command(subcommand)]
    kind: TokenKind,
}

#[derive(Subcommand, Debug)]
enum TokenKind {
    /// Token for back-office calls scoped to one organization
    Organization {
        #[arg(long = "org")]
        organization_id: i64,
    },
    /// Token for a till employee
    Employee {
        #[arg(long = "org")]
        organization_id: i64,
        #[arg(long = "outlet")]
        outlet_id: i64,
        #[arg(long = "employee")]
        employee_id: i64,
        /// owner, director, admin or cashier
        #[arg(long)]
        role: Role,
    },
}

fn main() -> Result<()> {
    let opts = Options::parse();

    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| anyhow!("JWT_SECRET must be set to sign tokens"))?;
    let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| "pos-ninja".to_string());
    let issuer = TokenIssuer::new(JwtConfig::new(secret.into_bytes(), issuer));

    let token = match opts.kind {
        TokenKind::Organization { organization_id } => {
            issuer.issue_organization_token(organization_id)?
        }
        TokenKind::Employee {
            organization_id,
            outlet_id,
            employee_id,
            role,
        } => issuer.issue_employee_token(organization_id, outlet_id, employee_id, role)?,
    };

    println!("{token}");
    Ok(())
}
