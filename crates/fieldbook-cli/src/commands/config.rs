use std::env;
use std::path::PathBuf;

use fieldbook_core::config::{
    normalize_root_folder, CLIENT_ID_VAR, CLIENT_SECRET_VAR, REDIRECT_URI_VAR, ROOT_FOLDER_VAR,
};
use fieldbook_core::util::is_http_url;

use crate::cli::{ConfigCommands, RemoteKindArg};
use crate::config_profiles::{normalize_text_option, CliProfile, CliProfilesConfig, RemoteKind};
use crate::error::CliError;

/// Values passed to `config init`; absent fields keep what the profile has.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub remote: Option<RemoteKindArg>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub root_folder: Option<String>,
    pub local_dir: Option<PathBuf>,
    pub sync_interval: Option<u64>,
    pub check_remote_version: bool,
}

impl From<RemoteKindArg> for RemoteKind {
    fn from(value: RemoteKindArg) -> Self {
        match value {
            RemoteKindArg::Yandex => Self::Yandex,
            RemoteKindArg::LocalDir => Self::LocalDir,
        }
    }
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            remote,
            client_id,
            client_secret,
            redirect_uri,
            root_folder,
            local_dir,
            sync_interval,
            check_remote_version,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileUpdate {
                remote,
                client_id,
                client_secret,
                redirect_uri,
                root_folder,
                local_dir,
                sync_interval,
                check_remote_version,
            },
            no_activate,
        ),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    update: ProfileUpdate,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let profile = config.profile_mut_or_default(&profile_name);
    apply_profile_update(profile, update, |key| env::var(key).ok());
    validate_profile(profile)?;
    let missing_fields = profile.missing_fields();

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `fieldbook auth url` to connect, then `fieldbook sync`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

/// Merge explicit flags, then `FIELDBOOK_*` variables, over the existing profile.
pub fn apply_profile_update(
    profile: &mut CliProfile,
    update: ProfileUpdate,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let from_env = |key: &str| normalize_text_option(lookup(key));

    if let Some(remote) = update.remote {
        profile.remote = Some(remote.into());
    }
    if let Some(value) = normalize_text_option(update.client_id).or_else(|| from_env(CLIENT_ID_VAR))
    {
        profile.client_id = Some(value);
    }
    if let Some(value) =
        normalize_text_option(update.client_secret).or_else(|| from_env(CLIENT_SECRET_VAR))
    {
        profile.client_secret = Some(value);
    }
    if let Some(value) =
        normalize_text_option(update.redirect_uri).or_else(|| from_env(REDIRECT_URI_VAR))
    {
        profile.redirect_uri = Some(value);
    }
    if let Some(value) =
        normalize_text_option(update.root_folder).or_else(|| from_env(ROOT_FOLDER_VAR))
    {
        profile.root_folder = Some(value);
    }
    if let Some(dir) = update.local_dir {
        profile.local_dir = Some(dir);
    }
    if let Some(secs) = update.sync_interval {
        profile.sync_interval_secs = Some(secs);
    }
    if update.check_remote_version {
        profile.check_remote_version = Some(true);
    }
}

fn validate_profile(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = &profile.redirect_uri {
        if !is_http_url(url) {
            return Err(CliError::Config(
                "redirect_uri must include http:// or https://".to_string(),
            ));
        }
    }
    if let Some(folder) = &profile.root_folder {
        normalize_root_folder(folder).map_err(|error| CliError::Config(error.to_string()))?;
    }
    if profile.sync_interval_secs == Some(0) {
        return Err(CliError::Config(
            "sync_interval must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
