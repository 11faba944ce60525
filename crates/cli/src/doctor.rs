// shiptrack doctor - resolved settings and credential sources

use std::path::Path;

use shiptrack_config::credentials::{keychain_available, CredentialStatus};
use shiptrack_config::{Credentials, Settings};

use crate::{load_settings, CliError};

pub fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), CliError> {
    let (path, _) = Settings::resolve_path(config, &|name| std::env::var(name).ok());
    let settings = load_settings(config)?;
    let validation = settings.validate().err().map(|e| e.to_string());
    let credentials = Credentials::from_env();

    if json {
        let credential_json: Vec<_> = credentials.entries.iter().map(credential_entry).collect();
        let json_output = serde_json::json!({
            "schema_version": 1,
            "status": if validation.is_none() { "ok" } else { "invalid" },
            "blocking_reason": validation,
            "config_path": path.display().to_string(),
            "config_exists": path.exists(),
            "keychain": if keychain_available() { "ok" } else { "unavailable" },
            "settings": settings,
            "credentials": credential_json,
        });
        let rendered = serde_json::to_string_pretty(&json_output)
            .map_err(|e| CliError::general(format!("failed to serialize doctor output: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }

    println!("shiptrack doctor");
    println!("----------------");
    println!(
        "config:          {}{}",
        path.display(),
        if path.exists() { "" } else { " (not found, using defaults)" }
    );
    match &validation {
        None => println!("status:          ok"),
        Some(reason) => println!("status:          invalid ({reason})"),
    }
    println!("lark.base_url:   {}", settings.lark.base_url);
    println!(
        "lark.chat_id:    {}",
        if settings.lark.chat_id.is_empty() { "(not set)" } else { settings.lark.chat_id.as_str() }
    );
    println!("sheet_tokens:    {}", settings.lark.sheet_tokens.len());
    println!("tab_scope:       {:?}", settings.sheets.tab_scope);
    println!("skip_tabs:       {}", settings.sheets.skip_tabs.join(", "));
    println!(
        "dispatch:        {} ms pacing, {} retries",
        settings.dispatch.pacing_ms, settings.dispatch.max_retries
    );
    println!("keychain:        {}", if keychain_available() { "ok" } else { "unavailable" });
    println!();
    println!("credentials");
    for entry in &credentials.entries {
        let missing = entry.missing();
        if missing.is_empty() {
            println!("  {:<6} {}", entry.name, entry.source().as_str());
        } else {
            println!("  {:<6} missing ({})", entry.name, missing.join(", "));
        }
    }
    Ok(())
}

fn credential_entry(entry: &CredentialStatus) -> serde_json::Value {
    serde_json::json!({
        "name": entry.name,
        "configured": entry.is_complete(),
        "source": entry.source().as_str(),
        "missing": entry.missing(),
    })
}
