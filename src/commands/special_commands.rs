//! Slash-command parser for the interactive chat
//!
//! Lines starting with `/` (and the bare words `exit` and `quit`) control
//! the session instead of being sent to the assistant:
//! - start, list, switch and delete conversations
//! - search the history list
//! - change the display language
//!
//! Command names are case-insensitive. Conversations are addressed by their
//! 1-based position in the history list as last printed.

use crate::locale::Language;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Commands handled by the chat loop itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Start a new conversation
    NewChat,
    /// Print the history list
    ListHistory,
    /// Display the conversation at this 1-based history position
    Switch(usize),
    /// Delete the conversation at this 1-based history position
    Delete(usize),
    /// Filter the history list; an empty query lists everything
    Search(String),
    /// Change the display language
    Language(Language),
    /// Display help information
    Help,
    /// Leave the chat
    Exit,
    /// Not a special command; send the line as a message
    None,
}

/// Parse a line of user input
///
/// # Errors
///
/// Returns [`CommandError`] for unknown commands and bad arguments.
///
/// # Examples
///
/// ```
/// use polyglot_messenger::commands::special_commands::{parse_special_command, SpecialCommand};
/// use polyglot_messenger::locale::Language;
///
/// assert_eq!(parse_special_command("/switch 2").unwrap(), SpecialCommand::Switch(2));
/// assert_eq!(parse_special_command("/lang zh").unwrap(), SpecialCommand::Language(Language::Chinese));
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if lower == "exit" || lower == "quit" {
        return Ok(SpecialCommand::Exit);
    }
    if !trimmed.starts_with('/') {
        return Ok(SpecialCommand::None);
    }

    let (command, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((command, arg)) => (command.to_lowercase(), arg.trim()),
        None => (lower, ""),
    };

    match command.as_str() {
        "/new" => Ok(SpecialCommand::NewChat),
        "/list" | "/history" => Ok(SpecialCommand::ListHistory),
        "/switch" | "/open" => parse_position("/switch", arg).map(SpecialCommand::Switch),
        "/delete" | "/rm" => parse_position("/delete", arg).map(SpecialCommand::Delete),
        "/search" | "/find" => Ok(SpecialCommand::Search(arg.to_string())),
        "/lang" | "/language" => {
            if arg.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "/lang".to_string(),
                    usage: "/lang <en|zh|ur>".to_string(),
                });
            }
            Language::from_code(arg)
                .map(SpecialCommand::Language)
                .map_err(|_| CommandError::UnsupportedArgument {
                    command: "/lang".to_string(),
                    arg: arg.to_string(),
                })
        }
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

fn parse_position(command: &str, arg: &str) -> Result<usize, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: format!("{command} <number>"),
        });
    }
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        }),
    }
}

/// Help text listing every command
pub fn help_text() -> &'static str {
    r#"
Chat Commands
=============

CONVERSATIONS:
  /new              - Start a new conversation
  /list             - Show the conversation history (also /history)
  /switch <n>       - Open conversation number <n> from the list
  /delete <n>       - Delete conversation number <n> from the list
  /search [text]    - Show conversations whose name contains <text>

LANGUAGE:
  /lang <code>      - Change the display language (en, zh, ur)

SESSION:
  /help             - Show this help message
  exit, quit        - Leave the chat

Anything else is sent to the assistant in the current conversation.
"#
}

/// Print the help text to stdout
pub fn print_help() {
    println!("{}", help_text());
}
