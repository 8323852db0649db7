use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_error, output_fields, output_success};
use crate::cli::OutputFormat;
use crate::config::ClientConfig;
use crate::menu::{MenuNode, ProviderState};
use crate::services::PortalService;

#[derive(Subcommand)]
pub enum MenuCommands {
    #[command(about = "Fetch and print the menu tree for the current user")]
    Show,

    #[command(about = "Check whether the current user can access a menu key")]
    Check {
        #[arg(help = "Menu key")]
        key: String,
    },

    #[command(about = "Refetch the menu tree and report provider state")]
    Refresh,
}

pub async fn handle(
    cmd: MenuCommands,
    config: &ClientConfig,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let portal = PortalService::open(config)?;
    if !portal.session.is_authenticated() {
        return output_error(output_format, "Not authenticated", Some("NO_TOKEN"));
    }

    match cmd {
        MenuCommands::Show => {
            portal.menu.sync().await;
            let snapshot = portal.menu.snapshot();
            match output_format {
                OutputFormat::Json => output_fields(
                    output_format,
                    json!({
                        "state": snapshot.state,
                        "degraded": snapshot.degraded,
                        "fetched_at": snapshot.fetched_at,
                        "error": snapshot.error.as_ref().map(|e| e.to_string()),
                        "menu": snapshot.tree,
                    }),
                ),
                OutputFormat::Text => {
                    if let Some(error) = &snapshot.error {
                        eprintln!("Warning: {}", error);
                    }
                    for line in render_tree(snapshot.tree.roots()) {
                        println!("{}", line);
                    }
                    Ok(())
                }
            }
        }
        MenuCommands::Check { key } => {
            portal.menu.sync().await;
            let allowed = portal.has_access(&key);
            output_fields(
                output_format,
                json!({
                    "key": key,
                    "allowed": allowed,
                    "role": portal.session.session().role().as_str(),
                }),
            )
        }
        MenuCommands::Refresh => {
            portal.menu.refresh().await;
            let snapshot = portal.menu.snapshot();
            match (&snapshot.state, &snapshot.error) {
                (ProviderState::Errored, Some(error)) => {
                    output_error(output_format, &error.to_string(), Some(error.error_code()))
                }
                _ => output_success(
                    output_format,
                    &format!("Menu refreshed ({} keys)", snapshot.tree.keys().len()),
                    Some(json!({ "state": snapshot.state, "degraded": snapshot.degraded })),
                ),
            }
        }
    }
}

/// Indented outline, one node per line
fn render_tree(roots: &[MenuNode]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stack: Vec<(&MenuNode, usize)> = roots.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        lines.push(format!("{}{} ({})", "  ".repeat(depth), node.label, node.key));
        stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }
    lines
}
