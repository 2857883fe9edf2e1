use anyhow::Context;
use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{AuthUser, TokenVerifier};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;

#[derive(Debug, Args)]
pub struct TokenArgs {
    #[arg(long, help = "User id the token is issued for")]
    pub user_id: Uuid,

    #[arg(long, default_value = "", help = "Display name claim")]
    pub name: String,

    #[arg(long, default_value = "", help = "Email claim")]
    pub email: String,

    #[arg(long, default_value = "super_admin", help = "Role claim")]
    pub role: String,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::config().security;
    let verifier = TokenVerifier::new(&security.jwt_secret, security.jwt_expiry_hours);

    let user = AuthUser {
        user_id: args.user_id,
        name: args.name,
        email: args.email,
        role: args.role,
    };
    let token = verifier.issue(&user).context("set JWT_SECRET to issue tokens")?;

    match output_format {
        OutputFormat::Json => output_success(
            output_format,
            "Token issued",
            json!({ "token": token, "user": user, "expiresInHours": security.jwt_expiry_hours }),
        ),
        OutputFormat::Text => output_success(output_format, "Token issued", json!(token)),
    }
}
