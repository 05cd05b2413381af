//! Backend commands: load, save, rename, rollback, login, logout.
//!
//! Each command opens a `SyncSession` over the REST client. The CLI never
//! talks to the AI job socket, so the session gets an idle in-process
//! transport.

use std::path::PathBuf;
use std::time::Instant;

use sheetpilot_config::SyncSettings;
use sheetpilot_hub_client::{delete_auth, load_auth, save_auth, AuthCredentials, HubClient, HubError};
use sheetpilot_sync::{channel_transport, ChannelTransport, SessionIds, SessionOptions, SyncSession};

use crate::exit_codes::EXIT_ERROR;
use crate::{read_snapshot, write_output, CliError, DocArgs};

type RemoteSession = SyncSession<ChannelTransport, HubClient>;

const CLI_CLIENT_ID: &str = "sheetpilot-cli";

/// --token wins over saved credentials; --api-base wins over both.
fn resolve_credentials(doc: &DocArgs, settings: &SyncSettings) -> Result<AuthCredentials, CliError> {
    let mut creds = match &doc.token {
        Some(token) => AuthCredentials::new(token.clone(), settings.api_base.clone()),
        None => load_auth().ok_or_else(|| CliError::hub(HubError::NotAuthenticated))?,
    };
    if let Some(base) = &doc.api_base {
        creds.api_base = base.clone();
    }
    Ok(creds)
}

fn open_session(doc: &DocArgs) -> Result<RemoteSession, CliError> {
    let settings = SyncSettings::load();
    let creds = resolve_credentials(doc, &settings)?;
    let user_id = doc
        .user
        .clone()
        .or_else(|| creds.user_id.clone())
        .ok_or_else(|| {
            CliError::args("No user id").with_hint("pass --user or run `sheetpilot login --user <ID>`")
        })?;
    let client = HubClient::with_timeout(creds, settings.request_timeout()).map_err(CliError::hub)?;

    let (transport, _peer, inbound) = channel_transport(CLI_CLIENT_ID);
    log::debug!("Opening session for document {} as {}", doc.document, user_id);
    Ok(SyncSession::new(
        SessionIds::new(&doc.document, &doc.chat, &user_id),
        transport,
        inbound,
        client,
        SessionOptions::from_settings(&settings),
    ))
}

fn lock_label(session: &RemoteSession) -> String {
    match session.version_state().lock_version {
        Some(lock) => format!("lock {}", lock),
        None => "no lock".to_string(),
    }
}

fn name_label(session: &RemoteSession) -> String {
    session.file_name().map(|n| format!("'{}'", n)).unwrap_or_else(|| "(untitled)".to_string())
}

// ── Load ────────────────────────────────────────────────────────────

pub fn cmd_load(doc: &DocArgs, output: Option<PathBuf>) -> Result<(), CliError> {
    let mut session = open_session(doc)?;
    let exists = session.load().map_err(CliError::sync)?;

    write_output(&session.workbook().to_json(), output.as_ref())?;
    if exists {
        eprintln!("Loaded {} ({})", name_label(&session), lock_label(&session));
    } else {
        eprintln!("Document {} is not stored yet; wrote a blank workbook", doc.document);
    }
    Ok(())
}

// ── Save ────────────────────────────────────────────────────────────

pub fn cmd_save(doc: &DocArgs, snapshot: PathBuf) -> Result<(), CliError> {
    let workbook = read_snapshot(&snapshot)?;
    let mut session = open_session(doc)?;

    // Observe the current lock version before writing over it.
    session.load().map_err(CliError::sync)?;
    session.edit(Instant::now(), |wb| *wb = workbook);
    session.save_now().map_err(CliError::sync)?;

    eprintln!("Saved {} ({})", name_label(&session), lock_label(&session));
    Ok(())
}

// ── Rename ──────────────────────────────────────────────────────────

pub fn cmd_rename(doc: &DocArgs, name: &str) -> Result<(), CliError> {
    if name.trim().is_empty() {
        return Err(CliError::args("File name cannot be empty"));
    }
    let mut session = open_session(doc)?;
    session.rename(name).map_err(CliError::sync)?;
    eprintln!("Renamed {} to '{}'", doc.document, name);
    Ok(())
}

// ── Rollback ────────────────────────────────────────────────────────

pub fn cmd_rollback(doc: &DocArgs, branch: &str, output: Option<PathBuf>) -> Result<(), CliError> {
    let mut session = open_session(doc)?;
    session.load().map_err(CliError::sync)?;
    let parent = session.rollback(branch).map_err(CliError::sync)?;

    write_output(&session.workbook().to_json(), output.as_ref())?;
    eprintln!("Rolled back to {} ({})", branch, lock_label(&session));
    match parent {
        Some(parent) => eprintln!("  Next message continues from: {}", parent),
        None => eprintln!("  Next message starts a new thread"),
    }
    Ok(())
}

// ── Login / logout ──────────────────────────────────────────────────

pub fn cmd_login(token: String, api_base: Option<String>, user: Option<String>) -> Result<(), CliError> {
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(CliError::args("No token provided").with_hint("pass --token or set SHEETPILOT_TOKEN"));
    }
    let api_base = api_base.unwrap_or_else(|| SyncSettings::load().api_base);
    let mut creds = AuthCredentials::new(token, api_base);
    if let Some(user) = user {
        creds = creds.with_user_id(user);
    }

    save_auth(&creds).map_err(|e| CliError { code: EXIT_ERROR, message: e, hint: None })?;

    match &creds.user_id {
        Some(user) => eprintln!("Saved credentials for {} at {}", user, creds.api_base),
        None => eprintln!("Saved credentials for {}", creds.api_base),
    }
    Ok(())
}

pub fn cmd_logout() -> Result<(), CliError> {
    delete_auth().map_err(|e| CliError { code: EXIT_ERROR, message: e, hint: None })?;
    eprintln!("Credentials removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_args() -> DocArgs {
        DocArgs {
            document: "doc-1".into(),
            chat: "chat-1".into(),
            user: None,
            token: None,
            api_base: None,
        }
    }

    #[test]
    fn test_token_flag_uses_settings_base() {
        let settings = SyncSettings { api_base: "http://settings.test".into(), ..Default::default() };
        let doc = DocArgs { token: Some("tok".into()), ..doc_args() };
        let creds = resolve_credentials(&doc, &settings).unwrap();
        assert_eq!(creds.token, "tok");
        assert_eq!(creds.api_base, "http://settings.test");
    }

    #[test]
    fn test_api_base_flag_overrides() {
        let settings = SyncSettings::default();
        let doc = DocArgs {
            token: Some("tok".into()),
            api_base: Some("http://flag.test".into()),
            ..doc_args()
        };
        let creds = resolve_credentials(&doc, &settings).unwrap();
        assert_eq!(creds.api_base, "http://flag.test");
    }
}
