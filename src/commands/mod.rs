/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`: interactive multi-conversation chat
- `languages`: list supported display languages
*/

use crate::chat::ids::ConversationId;
use crate::chat::search::SearchResult;
use crate::chat::store::ConversationStore;
use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::config::{Config, TransportKind};
use crate::error::{PolyglotError, Result};
use crate::render::{format_history, format_summary_line, TerminalSink};
use crate::session::ChatSession;
use crate::transport::assistant::AssistantTransport;
use crate::transport::stdio::StdioTransport;
use crate::transport::{forward_inbound, pump_outbound, Transport};
use std::sync::Arc;

// Slash-command parser
pub mod special_commands;

// Chat command handler
pub mod chat {
    //! Interactive chat handler.
    //!
    //! Builds the session and its transport, then runs a loop that applies
    //! one event at a time: a line typed by the user, a message from the
    //! assistant, or a timer tick that expires overdue requests.
    //!
    //! The line editor blocks, so it runs on its own thread and hands lines
    //! over a channel. It waits for an acknowledgement carrying the next
    //! prompt, which keeps the prompt below the output of the previous line
    //! and in the current display language.

    use super::*;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc;
    use tokio::time::MissedTickBehavior;
    use tokio_util::sync::CancellationToken;

    /// How often overdue requests are checked
    const TICK_INTERVAL: Duration = Duration::from_millis(250);

    /// What the line editor thread reports
    #[derive(Debug)]
    enum ReadEvent {
        Line(String),
        Interrupted,
        Eof,
        Failed(String),
    }

    /// Whether the loop keeps going after a line
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Flow {
        Continue,
        Exit,
    }

    /// Start the interactive chat
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be started.
    pub async fn run_chat(config: Config) -> Result<()> {
        tracing::info!(
            language = %config.locale.language,
            transport = %config.transport.kind,
            "Starting interactive chat"
        );

        let cancellation = CancellationToken::new();
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<String>();
        let store = ConversationStore::new(config.locale.language, config.naming.clone());

        let mut session = match build_transport(&config)? {
            Some(transport) => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
                pump_outbound(Arc::clone(&transport), outbound_rx, cancellation.clone());
                forward_inbound(transport, inbound_tx.clone(), cancellation.clone());
                ChatSession::connected(store, outbound_tx, config.request_timeout())
            }
            None => ChatSession::new(store),
        };
        session.subscribe(Box::new(TerminalSink::stdout()));

        print_welcome_banner(&session, config.transport.kind);

        let (mut line_rx, ack_tx) = spawn_line_reader(prompt_for(&session));

        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_event = line_rx.recv() => {
                    let Some(event) = maybe_event else {
                        break;
                    };
                    match event {
                        ReadEvent::Line(line) => {
                            if handle_line(&mut session, &line) == Flow::Exit {
                                break;
                            }
                            if ack_tx.send(prompt_for(&session)).is_err() {
                                break;
                            }
                        }
                        ReadEvent::Interrupted => {
                            println!("CTRL-C");
                            break;
                        }
                        ReadEvent::Eof => {
                            println!("CTRL-D");
                            break;
                        }
                        ReadEvent::Failed(err) => {
                            tracing::error!("Readline error: {}", err);
                            break;
                        }
                    }
                }

                Some(raw) = inbound_rx.recv() => {
                    session.handle_inbound(&raw);
                }

                _ = tick.tick() => {
                    session.expire_overdue(Instant::now());
                }
            }
        }

        cancellation.cancel();
        drop(inbound_tx);
        println!("Goodbye!");
        Ok(())
    }

    /// Build the configured transport, or `None` when offline
    fn build_transport(config: &Config) -> Result<Option<Arc<dyn Transport>>> {
        let transport: Arc<dyn Transport> = match config.transport.kind {
            TransportKind::Offline => return Ok(None),
            TransportKind::Assistant => Arc::new(AssistantTransport::new(config.assistant.clone())?),
            TransportKind::Bridge => {
                let bridge = &config.transport.bridge;
                let command = bridge.command.clone().ok_or_else(|| {
                    PolyglotError::Config(
                        "transport.bridge.command is required for the bridge transport"
                            .to_string(),
                    )
                })?;
                Arc::new(StdioTransport::spawn(
                    command,
                    bridge.args.clone(),
                    bridge.env.clone(),
                )?)
            }
        };
        Ok(Some(transport))
    }

    /// Run the line editor on a dedicated thread
    ///
    /// Returns the line channel and the acknowledgement sender, which takes
    /// the prompt for the next line. Dropping the sender stops the thread
    /// after its current prompt.
    fn spawn_line_reader(
        first_prompt: String,
    ) -> (
        mpsc::UnboundedReceiver<ReadEvent>,
        std::sync::mpsc::Sender<String>,
    ) {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = std::sync::mpsc::channel::<String>();

        std::thread::spawn(move || {
            let mut rl = match DefaultEditor::new() {
                Ok(rl) => rl,
                Err(e) => {
                    let _ = line_tx.send(ReadEvent::Failed(e.to_string()));
                    return;
                }
            };

            let mut prompt = first_prompt;
            loop {
                let event = match rl.readline(&prompt) {
                    Ok(line) => {
                        if !line.trim().is_empty() {
                            let _ = rl.add_history_entry(line.as_str());
                        }
                        ReadEvent::Line(line)
                    }
                    Err(ReadlineError::Interrupted) => ReadEvent::Interrupted,
                    Err(ReadlineError::Eof) => ReadEvent::Eof,
                    Err(err) => ReadEvent::Failed(err.to_string()),
                };
                let is_line = matches!(event, ReadEvent::Line(_));
                if line_tx.send(event).is_err() || !is_line {
                    break;
                }
                match ack_rx.recv() {
                    Ok(next) => prompt = next,
                    Err(_) => break,
                }
            }
        });

        (line_rx, ack_tx)
    }

    /// Prompt in the session's display language
    fn prompt_for(session: &ChatSession) -> String {
        let translations = session.store().language().translations();
        format!("{} > ", translations.message_placeholder)
    }

    /// Apply one line of user input to the session
    pub(crate) fn handle_line(session: &mut ChatSession, line: &str) -> Flow {
        let command = match parse_special_command(line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}\n", e.to_string().red());
                return Flow::Continue;
            }
        };

        let result = match command {
            SpecialCommand::None => session.send_user_message(line).map(|_| ()),
            SpecialCommand::NewChat => {
                session.new_conversation();
                Ok(())
            }
            SpecialCommand::ListHistory => {
                let translations = session.store().language().translations();
                println!("{}", format_history(&session.summaries(), translations));
                Ok(())
            }
            SpecialCommand::Switch(position) => {
                resolve_position(session, position).and_then(|id| session.switch_to(id))
            }
            SpecialCommand::Delete(position) => resolve_position(session, position)
                .and_then(|id| session.delete_conversation(id)),
            SpecialCommand::Search(query) => {
                println!("{}", format_search(session, &query));
                Ok(())
            }
            SpecialCommand::Language(language) => {
                session.set_language(language);
                Ok(())
            }
            SpecialCommand::Help => {
                print_help();
                Ok(())
            }
            SpecialCommand::Exit => return Flow::Exit,
        };

        if let Err(e) = result {
            eprintln!("{}\n", format!("Error: {}", e).red());
        }
        Flow::Continue
    }

    /// Map a 1-based history position to a conversation id
    pub(crate) fn resolve_position(
        session: &ChatSession,
        position: usize,
    ) -> Result<ConversationId> {
        position
            .checked_sub(1)
            .and_then(|index| session.summaries().get(index).map(|s| s.id))
            .ok_or_else(|| {
                PolyglotError::Command(format!(
                    "no conversation number {} (see /list)",
                    position
                ))
                .into()
            })
    }

    /// Format search results, numbered by their position in the full list
    pub(crate) fn format_search(session: &ChatSession, query: &str) -> String {
        let matches = match session.search(query) {
            SearchResult::Matches(matches) => matches,
            SearchResult::NoMatches { label } => return label.dimmed().to_string(),
        };

        session
            .summaries()
            .iter()
            .enumerate()
            .filter(|(_, s)| matches.iter().any(|m| m.id == s.id))
            .map(|(i, s)| format_summary_line(i + 1, s))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Display welcome banner at the start of the chat
    fn print_welcome_banner(session: &ChatSession, transport: TransportKind) {
        let translations = session.store().language().translations();
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║{:^62}║", translations.assistant);
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Transport: {}", transport.to_string().cyan());
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

}

// Language listing
pub mod languages {
    //! `languages` command: prints the supported display languages.

    use crate::locale::Language;

    /// Format one line per supported language
    pub fn format_languages() -> String {
        Language::ALL
            .iter()
            .map(|language| {
                format!(
                    "{}  {:<8} {}",
                    language.code(),
                    language.native_name(),
                    language.translations().assistant
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Print the supported languages to stdout
    pub fn list_languages() {
        println!("{}", format_languages());
    }

}
