//! Per-user token administration commands.

use clap::{Args, Subcommand};

use tokenward_core::error::AppError;
use tokenward_core::types::UserId;
use tokenward_entity::user::Registration;

use super::Cli;
use crate::output;

/// Arguments for user commands
#[derive(Debug, Args)]
pub struct UserArgs {
    /// User subcommand
    #[command(subcommand)]
    pub command: UserCommand,
}

/// User subcommands
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Register a local account
    Register {
        /// Display name
        #[arg(long)]
        name: String,
        /// Email address
        #[arg(long)]
        email: String,
        /// Login name for password login
        #[arg(long)]
        username: Option<String>,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Reject every token of a user issued before now
    InvalidateTokens {
        /// User ID
        id: UserId,
    },
}

/// Execute user commands
pub async fn execute(args: &UserArgs, cli: &Cli) -> Result<(), AppError> {
    let ctx = super::connect(cli).await?;

    match &args.command {
        UserCommand::Register {
            name,
            email,
            username,
            password,
        } => {
            let password = match password {
                Some(p) => p.clone(),
                None => dialoguer::Password::new()
                    .with_prompt("Password")
                    .with_confirmation("Confirm password", "Passwords do not match")
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?,
            };
            let registration = Registration {
                full_name: name.clone(),
                email: email.clone(),
                username: username.clone(),
                password,
            };

            let identity = ctx.manager.register(&registration).await?;
            output::print_success(&format!("Registered user {}", identity.id));
        }
        UserCommand::InvalidateTokens { id } => {
            let watermark = ctx.manager.invalidate_older_tokens(*id).await?;
            output::print_success(&format!(
                "Tokens of user {id} issued before {} are rejected",
                output::format_unix_millis(watermark)
            ));
        }
    }

    ctx.db.close().await;
    Ok(())
}
