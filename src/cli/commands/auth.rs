use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_error, output_fields, output_success, read_password};
use crate::cli::OutputFormat;
use crate::config::ClientConfig;
use crate::services::PortalService;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to server")]
    Login {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, help = "Password (read from HRDESK_PASSWORD or stdin if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Logout and clear the local session")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Refresh authentication token")]
    Refresh,

    #[command(about = "Show current user information")]
    Whoami,
}

pub async fn handle(
    cmd: AuthCommands,
    config: &ClientConfig,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let portal = PortalService::open(config)?;

    match cmd {
        AuthCommands::Login { username, password } => {
            let password = read_password(password)?;
            portal.login(&username, &password).await?;

            let profile = portal.session.profile();
            output_success(
                output_format,
                &format!("Logged in as {}", username),
                Some(json!({
                    "user": profile,
                    "menu_state": portal.menu.state(),
                })),
            )
        }
        AuthCommands::Logout => {
            portal.logout()?;
            output_success(output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let session = portal.session.session();
            output_fields(
                output_format,
                json!({
                    "authenticated": session.is_authenticated(),
                    "user": session.profile.as_ref().map(|p| p.name.clone()),
                    "role": session.role().as_str(),
                    "refresh_token": session.refresh_token.is_some(),
                }),
            )
        }
        AuthCommands::Refresh => {
            portal.auth.refresh(&portal.session).await?;
            output_success(output_format, "Token refreshed", None)
        }
        AuthCommands::Whoami => match portal.session.profile() {
            Some(profile) => output_fields(output_format, serde_json::to_value(profile)?),
            None if portal.session.is_authenticated() => output_error(
                output_format,
                "Authenticated, but no profile is stored",
                Some("NO_PROFILE"),
            ),
            None => output_error(output_format, "Not authenticated", Some("NO_TOKEN")),
        },
    }
}
