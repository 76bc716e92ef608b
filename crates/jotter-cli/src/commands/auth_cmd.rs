use jotter_core::auth::SignUpOutcome;
use jotter_core::{IdentitySource, StorageMode};

use crate::auth::{clear_stored_session, load_stored_session};
use crate::cli::AuthCommands;
use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_auth(context: &AppContext, command: AuthCommands) -> Result<(), CliError> {
    match command {
        AuthCommands::Signup {
            email,
            password,
            username,
        } => run_signup(context, &email, &password, username).await,
        AuthCommands::Login { email, password } => run_login(context, &email, &password).await,
        AuthCommands::Status => run_status(context).await,
        AuthCommands::Logout => run_logout(context).await,
    }
}

async fn run_signup(
    context: &AppContext,
    email: &str,
    password: &str,
    username: Option<String>,
) -> Result<(), CliError> {
    let remote = context.require_remote()?;
    let outcome = remote
        .auth
        .sign_up(email, password, username, &remote.profiles)
        .await
        .map_err(|error| CliError::Auth(error.to_string()))?;

    match outcome {
        SignUpOutcome::SignedIn(session) => {
            let email_label = session.user.email.as_deref().unwrap_or(email);
            println!(
                "Created account and signed in profile '{}' as {email_label}",
                context.profile_name
            );
            report_migration(context).await;
        }
        SignUpOutcome::ConfirmationRequired => {
            println!("Check {email} to confirm the account, then run `jotter auth login`.");
        }
    }
    Ok(())
}

async fn run_login(context: &AppContext, email: &str, password: &str) -> Result<(), CliError> {
    let remote = context.require_remote()?;
    let session = remote
        .auth
        .sign_in(email, password)
        .await
        .map_err(|error| CliError::Auth(error.to_string()))?;

    // Accounts confirmed by email have no profile row until now
    if let Err(error) = remote.auth.ensure_profile(&session, &remote.profiles).await {
        tracing::warn!("Could not set up profile: {}", error);
    }

    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
    println!(
        "Signed in profile '{}' as {email_label}",
        context.profile_name
    );
    report_migration(context).await;
    Ok(())
}

async fn run_status(context: &AppContext) -> Result<(), CliError> {
    let Some(remote) = context.remote.as_ref() else {
        println!(
            "Profile '{}' has no Supabase project; entries stay on this device.",
            context.profile_name
        );
        return Ok(());
    };

    let session = load_stored_session(&context.profile_name)
        .map_err(|error| CliError::Auth(error.to_string()))?
        .filter(|_| remote.hub.current().is_signed_in());
    let Some(session) = session else {
        println!("Profile '{}' is not signed in.", context.profile_name);
        return Ok(());
    };

    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
    let username = match remote.auth.ensure_profile(&session, &remote.profiles).await {
        Ok(profile) => profile.display_name(email_label).to_string(),
        Err(error) => {
            tracing::warn!("Could not load profile: {}", error);
            email_label.to_string()
        }
    };
    println!(
        "Profile '{}' is signed in as {username} <{email_label}> (expires_at={})",
        context.profile_name, session.expires_at
    );

    let guest_count = context.coordinator.guest_store().read().len();
    if guest_count > 0 {
        println!("{guest_count} guest entries are waiting; run `jotter migrate` to retry.");
    }
    Ok(())
}

async fn run_logout(context: &AppContext) -> Result<(), CliError> {
    let session = load_stored_session(&context.profile_name)
        .map_err(|error| CliError::Auth(error.to_string()))?;

    match (context.remote.as_ref(), session) {
        (Some(remote), Some(session)) => {
            remote
                .auth
                .sign_out(&session.access_token)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
        }
        // Nothing to revoke server-side; just forget whatever is stored
        _ => clear_stored_session(&context.profile_name)
            .map_err(|error| CliError::Auth(error.to_string()))?,
    }

    context.sync_identity().await;
    println!("Signed out profile '{}'", context.profile_name);
    Ok(())
}

/// Apply the freshly signed-in identity and say what happened to guest entries.
async fn report_migration(context: &AppContext) {
    let outcome = context.sync_identity().await;
    match context.coordinator.mode() {
        Some(StorageMode::Remote { .. }) if outcome.migrated_count > 0 => {
            println!(
                "Moved {} guest entries into your account",
                outcome.migrated_count
            );
        }
        Some(StorageMode::Remote { .. }) => {}
        _ => println!("Guest entries are still on this device; run `jotter migrate` to retry."),
    }
}
