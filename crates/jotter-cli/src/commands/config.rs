use std::env;

use crate::cli::ConfigCommands;
use crate::config_profiles::{is_http_url, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            supabase_url,
            supabase_anon_key,
            no_activate,
        ),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(
        &existing_profile,
        supabase_url.or_else(|| env::var("SUPABASE_URL").ok()),
        supabase_anon_key.or_else(|| env::var("SUPABASE_ANON_KEY").ok()),
    )?;
    *config.profile_mut_or_default(&profile_name) = merged;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profile(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing_fields = missing_profile_fields(profile);
    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `jotter auth login --email <email> --password <password>`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}. Entries stay on this device until it is complete.",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

/// Overlay new values on an existing profile, keeping fields not given.
pub fn merge_profile(
    existing: &CliProfile,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
) -> Result<CliProfile, CliError> {
    let profile = CliProfile {
        supabase_url: normalize_text_option(supabase_url).or_else(|| existing.supabase_url()),
        supabase_anon_key: normalize_text_option(supabase_anon_key)
            .or_else(|| existing.supabase_anon_key()),
    };
    validate_profile_urls(&profile)?;
    Ok(profile)
}

pub fn missing_profile_fields(profile: &CliProfile) -> Vec<&'static str> {
    let mut missing_fields = Vec::new();
    if profile.supabase_url().is_none() {
        missing_fields.push("supabase_url");
    }
    if profile.supabase_anon_key().is_none() {
        missing_fields.push("supabase_anon_key");
    }
    missing_fields
}

fn validate_profile_urls(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.supabase_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}
