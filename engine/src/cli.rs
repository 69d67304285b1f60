//! CLI interface for TermGenius
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags, plus the parser for the slash
//! commands understood inside a chat session.

use clap::{Parser, Subcommand};
use sdk::CriterionKey;
use std::path::PathBuf;

use crate::units::CriterionUpdate;

/// TermGenius report card assistant
///
/// Loads a grade sheet, interviews you about each student and writes their
/// end-of-term report comments with a language model.
#[derive(Parser, Debug)]
#[command(name = "termgenius")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a grade sheet and show the extracted students
    Inspect {
        /// Spreadsheet or CSV file
        file: PathBuf,
    },

    /// Start an interactive report session for a grade sheet
    Chat {
        /// Spreadsheet or CSV file
        file: PathBuf,
    },

    /// Generate reports without an interview
    Generate {
        /// Spreadsheet or CSV file
        file: PathBuf,

        /// Only generate for this student (name or id)
        #[arg(short, long)]
        student: Option<String>,
    },

    /// Store the Gemini API key in the system keychain
    Login,

    /// Remove the stored Gemini API key
    Logout,

    /// Run configuration diagnostics
    Doctor,
}

/// Local commands typed inside a chat session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Show every student with its status
    Students,
    /// Print one student's record and summary
    Show(String),
    /// Regenerate one student's summary without an interview
    Regenerate(String),
    /// Show the configured units
    Units,
    /// Append a unit, optionally titled
    UnitAdd(String),
    /// Remove a unit by position or id
    UnitRemove(String),
    UnitTitle { unit: String, title: String },
    /// Edit one criterion of a unit
    Criterion {
        unit: String,
        key: CriterionKey,
        update: CriterionUpdate,
    },
    /// Clear the loaded file and the conversation
    Clear,
    /// Load another file
    Load(PathBuf),
    Quit,
    Help,
}

impl ChatCommand {
    /// Parse a line starting with `/`. Returns `None` for ordinary messages.
    pub fn parse(line: &str) -> Option<Result<Self, String>> {
        let line = line.trim();
        let rest = line.strip_prefix('/')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let needs_arg = |cmd: fn(String) -> ChatCommand| {
            if arg.is_empty() {
                Err(format!("/{} needs an argument", name))
            } else {
                Ok(cmd(arg.to_string()))
            }
        };

        Some(match name {
            "students" => Ok(ChatCommand::Students),
            "show" => needs_arg(ChatCommand::Show),
            "regenerate" => needs_arg(ChatCommand::Regenerate),
            "units" => Ok(ChatCommand::Units),
            "unit" => parse_unit(arg),
            "criterion" => parse_criterion(arg),
            "clear" => Ok(ChatCommand::Clear),
            "load" => needs_arg(|p| ChatCommand::Load(PathBuf::from(p))),
            "quit" | "exit" => Ok(ChatCommand::Quit),
            "help" => Ok(ChatCommand::Help),
            other => Err(format!("Unknown command '/{}'. Type /help for a list.", other)),
        })
    }
}

/// Split off the first whitespace-separated word
fn next_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

fn parse_unit(arg: &str) -> Result<ChatCommand, String> {
    const USAGE: &str = "Usage: /unit add [TITLE] | /unit remove <UNIT> | /unit title <UNIT> <TITLE>";

    let (action, rest) = next_word(arg);
    match action {
        "add" => Ok(ChatCommand::UnitAdd(rest.to_string())),
        "remove" if !rest.is_empty() => Ok(ChatCommand::UnitRemove(rest.to_string())),
        "title" => match next_word(rest) {
            ("", _) => Err(USAGE.to_string()),
            (unit, title) => Ok(ChatCommand::UnitTitle {
                unit: unit.to_string(),
                title: title.to_string(),
            }),
        },
        _ => Err(USAGE.to_string()),
    }
}

fn parse_criterion(arg: &str) -> Result<ChatCommand, String> {
    const USAGE: &str =
        "Usage: /criterion <UNIT> <A-D> enable | disable | notes <TEXT> | file <PATH> | nofile";

    let (unit, rest) = next_word(arg);
    let (key, rest) = next_word(rest);
    let (action, value) = next_word(rest);
    if unit.is_empty() {
        return Err(USAGE.to_string());
    }

    let key = CriterionKey::ALL
        .into_iter()
        .find(|k| k.to_string().eq_ignore_ascii_case(key))
        .ok_or_else(|| format!("Unknown criterion '{}', expected A, B, C or D", key))?;

    let update = match action {
        "enable" => CriterionUpdate {
            enabled: Some(true),
            ..Default::default()
        },
        "disable" => CriterionUpdate {
            enabled: Some(false),
            ..Default::default()
        },
        "notes" => CriterionUpdate {
            notes: Some(value.to_string()),
            ..Default::default()
        },
        "file" if !value.is_empty() => CriterionUpdate {
            reference_file: Some(Some(PathBuf::from(value))),
            ..Default::default()
        },
        "nofile" => CriterionUpdate {
            reference_file: Some(None),
            ..Default::default()
        },
        _ => return Err(USAGE.to_string()),
    };

    Ok(ChatCommand::Criterion {
        unit: unit.to_string(),
        key,
        update,
    })
}
