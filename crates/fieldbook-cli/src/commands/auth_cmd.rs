use chrono::DateTime;

use crate::auth::{authenticator_for_profile, clear_stored_token};
use crate::cli::AuthCommands;
use crate::commands::common::{format_sync_timestamp, resolve_remote_config};
use crate::config_profiles::{CliProfilesConfig, RemoteKind};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;

    match command {
        AuthCommands::Url { profile } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let remote_config = resolve_remote_config(&config, &profile_name)?;
            let auth = authenticator_for_profile(&profile_name, &remote_config)?;
            println!("{}", auth.authorization_url());
            println!(
                "Open the URL, approve access, then run `fieldbook auth callback <redirect-url-or-code>`."
            );
            Ok(())
        }
        AuthCommands::Callback { profile, raw } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let remote_config = resolve_remote_config(&config, &profile_name)?;
            let auth = authenticator_for_profile(&profile_name, &remote_config)?;
            let token = auth.consume_callback(&raw).await?;
            println!(
                "Connected profile '{profile_name}' (token expires {})",
                format_expiry(token.expires_at)
            );
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            if config
                .profile(&profile_name)
                .is_some_and(|profile| profile.remote_kind() == RemoteKind::LocalDir)
            {
                println!("Profile '{profile_name}' syncs to a local directory; no sign-in needed.");
                return Ok(());
            }

            let remote_config = match resolve_remote_config(&config, &profile_name) {
                Ok(remote_config) => remote_config,
                Err(CliError::RemoteNotConfigured) => {
                    println!("Profile '{profile_name}' is not configured.");
                    return Ok(());
                }
                Err(error) => return Err(error),
            };
            let auth = authenticator_for_profile(&profile_name, &remote_config)?;

            if auth.is_authenticated().await {
                let expires = auth
                    .token()
                    .await
                    .map_or_else(|| "unknown".to_string(), |token| format_expiry(token.expires_at));
                println!("Profile '{profile_name}' is connected (token expires {expires})");
            } else {
                println!("Profile '{profile_name}' is not connected.");
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            clear_stored_token(&profile_name)?;
            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}

fn format_expiry(expires_at: i64) -> String {
    DateTime::from_timestamp(expires_at, 0)
        .map_or_else(|| expires_at.to_string(), format_sync_timestamp)
}
