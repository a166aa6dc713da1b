//! Token inspection commands.

use clap::{Args, Subcommand};

use tokenward_auth::{Clock, SystemClock, TokenCodec, time};
use tokenward_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for token commands
#[derive(Debug, Args)]
pub struct TokenArgs {
    /// Token subcommand
    #[command(subcommand)]
    pub command: TokenCommand,
}

/// Token subcommands
#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Print a token's claims without checking its signature
    Inspect {
        /// Compact token
        token: String,
    },
}

/// Execute token commands
pub fn execute(args: &TokenArgs, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        TokenCommand::Inspect { token } => {
            let claims = TokenCodec::decode(token)
                .ok_or_else(|| AppError::validation("Not a readable token"))?;

            match format {
                OutputFormat::Json => output::print_item(&claims, format),
                OutputFormat::Table => {
                    output::print_warning("Signature NOT verified");
                    let show = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
                    output::print_kv("Type", &show(claims.typ.map(|t| t.to_string())));
                    output::print_kv("Subject", &show(claims.sub.map(|s| s.to_string())));
                    output::print_kv("Session", &show(claims.session_id.map(|s| s.to_string())));
                    output::print_kv("Token ID", &show(claims.jti.map(|j| j.to_string())));
                    output::print_kv(
                        "Roles",
                        &show(claims.roles.as_ref().map(|roles| {
                            roles
                                .iter()
                                .map(|r| r.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        })),
                    );
                    output::print_kv("Name", &show(claims.full_name.clone()));
                    let issued = match (claims.iat_ms, claims.iat) {
                        (Some(ms), _) => Some(output::format_unix_millis(ms)),
                        (None, iat) => iat.map(output::format_unix),
                    };
                    output::print_kv("Issued", &show(issued));
                    output::print_kv("Expires", &show(claims.exp.map(output::format_unix)));
                    if let Some(exp) = claims.exp {
                        let now = SystemClock.now_seconds();
                        let state = if time::is_expired(exp, now) {
                            "expired".to_string()
                        } else {
                            format!("valid for {}s", time::remaining_ttl(exp, now).as_secs())
                        };
                        output::print_kv("Lifetime", &state);
                    }
                }
            }
        }
    }
    Ok(())
}
