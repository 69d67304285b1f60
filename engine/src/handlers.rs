//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - inspect: parse a sheet and print the extracted students
//! - chat: interactive interview and report session
//! - generate: interview-free generation for one or all students
//! - login: store the Gemini API key
//! - logout: remove the stored key
//! - doctor: validate configuration and key availability

use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use crate::cli::ChatCommand;
use crate::config::Config;
use crate::ingest;
use crate::llm::gemini::GeminiProvider;
use crate::llm::{LLMError, LLMProvider};
use crate::secrets::{SecretManager, GEMINI_API_KEY};
use crate::session::Session;
use crate::store::{SharedStore, StudentEvent};
use crate::units::UnitRegistry;
use sdk::errors::ErrorExt;
use sdk::{StudentRecord, StudentStatus};

/// Keychain service name
pub const SERVICE_NAME: &str = "termgenius";

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Build a session backed by Gemini with the configured units
fn build_session(config: &Config) -> Result<Session> {
    let api_key = SecretManager::new(SERVICE_NAME)
        .get_secret(GEMINI_API_KEY)
        .map_err(|e| anyhow::anyhow!("{} ({})", e, e.user_hint()))?;

    let provider = Arc::new(GeminiProvider::new(config.llm.gemini.clone(), api_key));
    Ok(Session::new(
        provider,
        UnitRegistry::new(config.initial_units()),
        Duration::from_secs(config.llm.timeout_secs),
    ))
}

/// Parse a sheet and print what was extracted
pub async fn handle_inspect(file: &Path, format: OutputFormat) -> Result<()> {
    let records = ingest::parse_file(file)
        .await
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    match format {
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No students found in {}.", file.display());
                return Ok(());
            }
            println!("{} students in {}:", records.len(), file.display());
            println!();
            for record in &records {
                println!("  {:<30} score {}", record.name, record.score);
                for line in &record.raw_context {
                    println!("      {}", line);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}

/// Generate summaries without interview answers
pub async fn handle_generate(
    file: &Path,
    student: Option<&str>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let mut session = build_session(config)?;
    session
        .load_file(file)
        .await
        .with_context(|| format!("Failed to load {}", file.display()))?;

    let targets: Vec<StudentRecord> = {
        let store = session.store().read().await;
        match student {
            Some(needle) => vec![store
                .find(needle)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("No student matching '{}'", needle))?],
            None => store.records().to_vec(),
        }
    };

    let mut results = Vec::new();
    for record in &targets {
        if let OutputFormat::Text = format {
            println!("Generating summary for {}...", record.name);
        }
        match session.regenerate(&record.id).await {
            Ok(summary) => {
                if let OutputFormat::Text = format {
                    println!();
                    println!("{}", summary);
                    println!();
                }
                results.push(json!({
                    "id": record.id,
                    "name": record.name,
                    "status": StudentStatus::Completed,
                    "summary": summary
                }));
            }
            Err(e) => {
                if let OutputFormat::Text = format {
                    println!("✗ {}: {}", record.name, e);
                }
                results.push(json!({
                    "id": record.id,
                    "name": record.name,
                    "status": StudentStatus::Error,
                    "error": e.to_string()
                }));
            }
        }
    }

    let (completed, total) = session.progress().await;
    match format {
        OutputFormat::Text => println!("{}/{} completed", completed, total),
        OutputFormat::Json => {
            let output = json!({ "students": results, "completed": completed, "total": total });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Interactive session on stdin/stdout
pub async fn handle_chat(file: &Path, config: &Config) -> Result<()> {
    let mut session = build_session(config)?;
    let _watcher = spawn_status_printer(&session).await;

    load_and_greet(&mut session, file).await?;
    println!("Type a message, or /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt()?;
        // The next line is read only after the previous turn has finished
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match ChatCommand::parse(line) {
            None => {
                if session.active_file().is_none() {
                    println!("(no file loaded, use /load <FILE>)");
                }
                let turn = session.send(line).await;
                println!();
                println!("{}", turn.text);
                println!();
            }
            Some(Err(message)) => println!("{}", message),
            Some(Ok(ChatCommand::Quit)) => break,
            Some(Ok(command)) => run_chat_command(&mut session, command).await?,
        }
    }

    let (completed, total) = session.progress().await;
    println!("{}/{} summaries completed.", completed, total);
    Ok(())
}

async fn load_and_greet(session: &mut Session, file: &Path) -> Result<()> {
    session
        .load_file(file)
        .await
        .with_context(|| format!("Failed to load {}", file.display()))?;
    if let Some(turn) = session.transcript().last() {
        println!("{}", turn.text);
    }
    Ok(())
}

async fn run_chat_command(session: &mut Session, command: ChatCommand) -> Result<()> {
    match command {
        ChatCommand::Students => {
            let store = session.store().read().await;
            let (completed, total) = store.progress();
            println!("Students ({}/{} completed):", completed, total);
            for record in store.records() {
                println!(
                    "  {:<30} {:<11} {}",
                    record.name,
                    record.status.to_string(),
                    record.id
                );
            }
            if let Some(next) = store.next_idle() {
                println!("Next up: {}", next.name);
            }
        }
        ChatCommand::Show(needle) => {
            let store = session.store().read().await;
            match store.find(&needle) {
                Some(record) => print_record(record),
                None => println!("No student matching '{}'", needle),
            }
        }
        ChatCommand::Regenerate(needle) => {
            let id = session.store().read().await.find(&needle).map(|r| r.id.clone());
            match id {
                Some(id) => match session.regenerate(&id).await {
                    Ok(summary) => println!("{}", summary),
                    Err(e) => println!("✗ {} ({})", e, e.user_hint()),
                },
                None => println!("No student matching '{}'", needle),
            }
        }
        ChatCommand::Units => {
            let units = session.units().read().await;
            if units.units().is_empty() {
                println!("No units. Add one with /unit add [TITLE].");
            }
            for (position, unit) in units.units().iter().enumerate() {
                println!("{}. {}", position + 1, unit.display_title());
                for (key, criterion) in unit.criteria.iter() {
                    if !criterion.enabled {
                        println!("  {}: not assessed", key);
                        continue;
                    }
                    let file = criterion
                        .reference_file
                        .as_ref()
                        .map(|f| f.name.as_str())
                        .unwrap_or("no file");
                    println!("  {}: {} [{}]", key, criterion.notes, file);
                }
            }
        }
        ChatCommand::UnitAdd(title) => {
            let mut units = session.units().write().await;
            let id = units.add_unit();
            units.set_title(&id, title)?;
            println!("Added unit {}.", units.units().len());
        }
        ChatCommand::UnitRemove(reference) => {
            let mut units = session.units().write().await;
            match units.resolve(&reference) {
                Some(id) => {
                    units.remove_unit(&id);
                    println!("Removed unit {}.", reference);
                }
                None => println!("No unit '{}'", reference),
            }
        }
        ChatCommand::UnitTitle { unit, title } => {
            let mut units = session.units().write().await;
            match units.resolve(&unit) {
                Some(id) => units.set_title(&id, title)?,
                None => println!("No unit '{}'", unit),
            }
        }
        ChatCommand::Criterion { unit, key, update } => {
            let mut units = session.units().write().await;
            match units.resolve(&unit) {
                Some(id) => units.update_criterion(&id, key, update)?,
                None => println!("No unit '{}'", unit),
            }
        }
        ChatCommand::Clear => {
            session.clear_file().await;
            println!("Cleared the file and the conversation. Units are kept.");
        }
        ChatCommand::Load(path) => {
            if let Err(e) = load_and_greet(session, &path).await {
                println!("✗ {:#}", e);
            }
        }
        ChatCommand::Help => {
            println!("/students            list students and their status");
            println!("/show <name|id>      show a student's data and summary");
            println!("/regenerate <name|id> regenerate a summary without an interview");
            println!("/units               show the configured units");
            println!("/unit add [TITLE]    add a unit");
            println!("/unit remove <UNIT>  remove a unit (position or id)");
            println!("/unit title <UNIT> <TITLE>");
            println!("                     rename a unit");
            println!("/criterion <UNIT> <A-D> enable|disable|notes <TEXT>|file <PATH>|nofile");
            println!("                     edit one criterion");
            println!("/clear               clear the file and the conversation");
            println!("/load <FILE>         load another grade sheet");
            println!("/quit                leave");
        }
        ChatCommand::Quit => {}
    }
    Ok(())
}

fn print_record(record: &StudentRecord) {
    println!("{} (score {}, {})", record.name, record.score, record.status);
    for line in &record.raw_context {
        println!("  {}", line);
    }
    if !record.generated_summary.is_empty() {
        println!();
        println!("{}", record.generated_summary);
    }
}

fn print_prompt() -> Result<()> {
    use std::io::Write;
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

/// Print generation progress as the store reports it
async fn spawn_status_printer(session: &Session) -> tokio::task::JoinHandle<()> {
    let mut events = session.subscribe().await;
    let store: SharedStore = session.store().clone();

    tokio::spawn(async move {
        while let Some(event) = next_event(&mut events).await {
            if let Some(line) = status_line(&store, event).await {
                println!("{}", line);
            }
        }
    })
}

/// Next store event, skipping past any the receiver fell behind on.
/// `None` once the store is gone.
async fn next_event(events: &mut broadcast::Receiver<StudentEvent>) -> Option<StudentEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                debug!("Status printer skipped {} events", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Progress line for a store event, if it is worth showing
async fn status_line(store: &SharedStore, event: StudentEvent) -> Option<String> {
    let StudentEvent::StatusChanged { id, status } = event else {
        return None;
    };
    let name = store.read().await.get(&id).map(|r| r.name.clone())?;
    match status {
        StudentStatus::Generating => Some(format!("  … writing {}'s report", name)),
        StudentStatus::Error => Some(format!("  ✗ {}'s report failed", name)),
        _ => None,
    }
}

/// Store the Gemini API key read from stdin
pub async fn handle_login() -> Result<()> {
    use std::io::{self, Write};

    let manager = SecretManager::new(SERVICE_NAME);
    if manager.has_secret(GEMINI_API_KEY) {
        println!("A Gemini API key is already available; a new one replaces the stored key.");
    }

    print!("Gemini API key: ");
    io::stdout().flush()?;
    let mut key = String::new();
    io::stdin().read_line(&mut key)?;

    manager
        .set_secret(GEMINI_API_KEY, key.trim())
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    println!("Stored in keychain.");
    Ok(())
}

/// Remove the stored Gemini API key
pub async fn handle_logout() -> Result<()> {
    SecretManager::new(SERVICE_NAME)
        .delete_secret(GEMINI_API_KEY)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    println!("Removed the Gemini API key from the keychain.");
    Ok(())
}

/// Validate configuration and report what a session would use
pub async fn handle_doctor(
    config: &Config,
    config_path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(&str, String)> = Vec::new();

    // Config is already validated when loaded
    let path = match config_path {
        Some(path) => path,
        None => Config::default_config_path()?,
    };
    checks.push(("Configuration", path.display().to_string()));
    checks.push(("Model", config.llm.gemini.model.clone()));
    checks.push(("Endpoint", config.llm.gemini.base_url.clone()));
    checks.push(("Timeout", format!("{}s", config.llm.timeout_secs)));

    if let Ok(api_key) = SecretManager::new(SERVICE_NAME).get_secret(GEMINI_API_KEY) {
        checks.push(("Gemini API key", "Configured".to_string()));

        let provider = GeminiProvider::new(config.llm.gemini.clone(), api_key);
        let health = tokio::time::timeout(
            Duration::from_secs(config.llm.timeout_secs),
            provider.check_health(),
        )
        .await
        .unwrap_or(Err(LLMError::Timeout));
        match health {
            Ok(()) => checks.push(("Gemini API", "Reachable".to_string())),
            Err(e) => {
                checks.push(("Gemini API", "Unreachable".to_string()));
                issues.push(format!("Gemini API check failed: {}", e));
            }
        }
    } else {
        checks.push(("Gemini API key", "Not configured".to_string()));
        issues.push(
            "No Gemini API key. Run 'termgenius login' or set GEMINI_API_KEY.".to_string(),
        );
    }

    let units = UnitRegistry::new(config.initial_units());
    let titles = units.title_summary();
    checks.push((
        "Units",
        format!(
            "{} ({})",
            units.units().len(),
            if titles.trim().is_empty() { "untitled" } else { titles.as_str() }
        ),
    ));

    for unit in units.units() {
        for (key, criterion) in unit.criteria.iter() {
            if let Some(file) = &criterion.reference_file {
                if criterion.enabled && !file.path.exists() {
                    issues.push(format!(
                        "{} criterion {}: reference file not found: {}",
                        unit.display_title(),
                        key,
                        file.path.display()
                    ));
                }
            }
        }
    }

    match format {
        OutputFormat::Text => {
            println!("TermGenius Diagnostics");
            println!("======================");
            println!();

            for (check, status) in &checks {
                println!("  {:<18} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
