mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hrdesk::auth::{AuthClient, AuthError};
use hrdesk::config::ClientConfig;
use hrdesk::menu::HttpMenuSource;
use hrdesk::services::PortalService;
use hrdesk::storage::FileStorage;
use hrdesk::{ProviderState, RoleLevel};
use tempfile::TempDir;

fn open_portal(base_url: &str, dir: &Path) -> Result<PortalService> {
    let config = ClientConfig::development()
        .with_base_url(base_url)
        .with_storage_dir(dir);
    Ok(PortalService::open(&config)?)
}

#[tokio::test]
async fn user_login_loads_menu_and_gates_keys() -> Result<()> {
    let server = common::spawn_server().await?;
    let dir = TempDir::new()?;
    let portal = open_portal(&server.base_url, dir.path())?;

    portal.login("kim", common::PASSWORD).await?;

    assert_eq!(portal.session.current_token().as_deref(), Some("access-kim"));
    assert_eq!(portal.menu.state(), ProviderState::Ready);
    assert!(portal.has_access("leave"));
    assert!(portal.has_access("early-departure"));
    assert!(!portal.has_access("payroll"));
    Ok(())
}

#[tokio::test]
async fn admin_login_bypasses_menu() -> Result<()> {
    let server = common::spawn_server().await?;
    let dir = TempDir::new()?;
    let portal = open_portal(&server.base_url, dir.path())?;

    portal.login("admin", common::PASSWORD).await?;

    assert_eq!(portal.session.session().role(), RoleLevel::Admin);
    assert!(portal.has_access("payroll"));
    assert!(portal.has_access("anything-at-all"));
    Ok(())
}

#[tokio::test]
async fn numeric_user_id_logs_in_and_caches() -> Result<()> {
    let server = common::spawn_server().await?;
    let dir = TempDir::new()?;
    let portal = open_portal(&server.base_url, dir.path())?;

    portal.login("1042", common::PASSWORD).await?;

    assert_eq!(portal.session.session().user_id(), Some("1042"));
    assert!(portal.has_access("leave"));

    server.fail_menu(true);
    portal.menu.refresh().await;
    assert!(portal.menu.is_degraded());
    assert!(portal.has_access("leave"));
    Ok(())
}

#[tokio::test]
async fn wrong_password_leaves_session_empty() -> Result<()> {
    let server = common::spawn_server().await?;
    let dir = TempDir::new()?;
    let portal = open_portal(&server.base_url, dir.path())?;

    let result = portal.login("kim", "nope").await;

    match result {
        Err(AuthError::Rejected { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid credentials");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(!portal.session.is_authenticated());
    assert_eq!(portal.menu.state(), ProviderState::Idle);
    assert_eq!(server.menu_requests(), 0);
    Ok(())
}

#[tokio::test]
async fn refresh_replaces_tokens_and_keeps_profile() -> Result<()> {
    let server = common::spawn_server().await?;
    let dir = TempDir::new()?;
    let portal = open_portal(&server.base_url, dir.path())?;
    portal.login("kim", common::PASSWORD).await?;

    portal.auth.refresh(&portal.session).await?;

    let session = portal.session.load();
    assert_eq!(session.access_token.as_deref(), Some("access-kim-renewed"));
    assert_eq!(session.user_id(), Some("kim"));
    // Same user, so the tree stays visible
    assert!(portal.has_access("leave"));
    Ok(())
}

#[tokio::test]
async fn offline_restart_falls_back_to_cached_menu() -> Result<()> {
    let server = common::spawn_server().await?;
    let dir = TempDir::new()?;
    {
        let portal = open_portal(&server.base_url, dir.path())?;
        portal.login("kim", common::PASSWORD).await?;
    }

    server.fail_menu(true);
    let portal = open_portal(&server.base_url, dir.path())?;
    assert!(portal.session.is_authenticated());

    portal.menu.sync().await;

    assert_eq!(portal.menu.state(), ProviderState::Ready);
    assert!(portal.menu.is_degraded());
    assert!(portal.menu.error().is_some());
    assert!(portal.has_access("leave"));
    Ok(())
}

#[tokio::test]
async fn body_without_menu_keeps_cached_tree() -> Result<()> {
    let server = common::spawn_server().await?;
    let dir = TempDir::new()?;
    let portal = open_portal(&server.base_url, dir.path())?;
    portal.login("kim", common::PASSWORD).await?;

    server.omit_menu_field(true);
    portal.menu.refresh().await;

    assert_eq!(portal.menu.state(), ProviderState::Ready);
    assert!(portal.menu.is_degraded());
    assert!(portal.has_access("leave"));

    // The cached tree was not overwritten either
    let reopened = open_portal(&server.base_url, dir.path())?;
    reopened.menu.sync().await;
    assert!(reopened.has_access("leave"));
    Ok(())
}

#[tokio::test]
async fn logout_during_token_refresh_stays_logged_out() -> Result<()> {
    let server = common::spawn_server().await?;
    let dir = TempDir::new()?;
    let portal = Arc::new(open_portal(&server.base_url, dir.path())?);
    portal.login("kim", common::PASSWORD).await?;
    server.delay_refresh(Duration::from_millis(500));

    let refresh = tokio::spawn({
        let portal = portal.clone();
        async move { portal.auth.refresh(&portal.session).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    portal.logout()?;

    let result = refresh.await?;
    assert!(matches!(result, Err(AuthError::SessionChanged)), "got {result:?}");
    assert!(!portal.session.is_authenticated());
    assert!(!dir.path().join("session.json").exists());
    Ok(())
}

#[tokio::test]
async fn failure_without_cache_is_errored() -> Result<()> {
    let server = common::spawn_server().await?;
    server.fail_menu(true);
    let dir = TempDir::new()?;
    let portal = open_portal(&server.base_url, dir.path())?;

    portal.login("kim", common::PASSWORD).await?;

    assert_eq!(portal.menu.state(), ProviderState::Errored);
    assert!(!portal.has_access("leave"));
    Ok(())
}

#[tokio::test]
async fn logout_clears_session_file_and_menu() -> Result<()> {
    let server = common::spawn_server().await?;
    let dir = TempDir::new()?;
    let portal = open_portal(&server.base_url, dir.path())?;
    portal.login("kim", common::PASSWORD).await?;
    assert!(dir.path().join("session.json").exists());

    portal.logout()?;

    assert!(!dir.path().join("session.json").exists());
    assert_eq!(portal.menu.state(), ProviderState::Idle);
    assert!(portal.menu.tree().is_empty());
    assert!(!portal.has_access("leave"));

    // A reopened portal starts unauthenticated too
    let reopened = open_portal(&server.base_url, dir.path())?;
    assert!(!reopened.session.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn explicit_parts_share_one_store() -> Result<()> {
    let server = common::spawn_server().await?;
    let dir = TempDir::new()?;
    let config = ClientConfig::development().with_base_url(&server.base_url);

    let portal = PortalService::with_parts(
        &config,
        Arc::new(FileStorage::open(dir.path())?),
        Arc::new(HttpMenuSource::new(&config)?),
        AuthClient::new(&config)?,
    );
    portal.login("kim", common::PASSWORD).await?;

    assert_eq!(server.last_bearer().as_deref(), Some("access-kim"));
    assert!(Arc::ptr_eq(portal.menu.session(), &portal.session));
    Ok(())
}
