//! Session inspection and revocation commands.

use clap::{Args, Subcommand};

use tokenward_core::error::AppError;
use tokenward_core::types::sorting::SortField;
use tokenward_core::types::{PageRequest, SessionId, UserId};

use super::Cli;
use crate::output::{self, SessionRow};

/// Arguments for session commands
#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Session subcommand
    #[command(subcommand)]
    pub command: SessionCommand,
}

/// Session subcommands
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// List a user's live sessions
    List {
        /// Owning user ID
        #[arg(long)]
        user: UserId,
        /// Page number (1-based)
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Page size (defaults to session.default_page_size)
        #[arg(long)]
        limit: Option<u64>,
        /// Sort field; prefix with '-' for descending (e.g. -created_at)
        #[arg(long, allow_hyphen_values = true)]
        sort: Option<SortField>,
    },
    /// Show one session
    Show {
        /// Session ID
        id: SessionId,
    },
    /// Revoke one session
    Revoke {
        /// Session ID
        id: SessionId,
    },
    /// Revoke every session of a user
    RevokeAll {
        /// Owning user ID
        #[arg(long)]
        user: UserId,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
    /// Purge session records past their expiry
    Sweep,
}

/// Execute session commands
pub async fn execute(args: &SessionArgs, cli: &Cli) -> Result<(), AppError> {
    let ctx = super::connect(cli).await?;
    let manager = &ctx.manager;

    match &args.command {
        SessionCommand::List {
            user,
            page,
            limit,
            sort,
        } => {
            let page = PageRequest {
                page: *page,
                page_size: limit.unwrap_or(ctx.config.session.default_page_size),
            };
            let result = manager.list_sessions(*user, page, sort.as_ref()).await?;

            let rows: Vec<SessionRow> = result.items.iter().map(SessionRow::from).collect();
            output::print_list(&rows, cli.format);
            if cli.format == output::OutputFormat::Table {
                println!(
                    "Page {}/{} ({} sessions)",
                    result.page, result.total_pages, result.total_items
                );
            }
        }
        SessionCommand::Show { id } => {
            let session = manager
                .sessions()
                .find_by_id(*id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Session {id} not found")))?;
            output::print_session(&session, cli.format);
        }
        SessionCommand::Revoke { id } => {
            if manager.revoke_session(*id).await? {
                output::print_success(&format!("Session {id} revoked"));
            } else {
                output::print_warning(&format!(
                    "Session {id} had no record; its active marker was cleared"
                ));
            }
        }
        SessionCommand::RevokeAll { user, force } => {
            if !force {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt(format!("Revoke ALL sessions of user {user}?"))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let count = manager.revoke_all_sessions(*user).await?;
            output::print_success(&format!("Revoked {count} sessions"));
        }
        SessionCommand::Sweep => {
            let removed = manager.sessions().delete_expired().await?;
            output::print_success(&format!("Purged {removed} expired sessions"));
        }
    }

    ctx.db.close().await;
    Ok(())
}
