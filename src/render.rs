//! Presentation helpers and the terminal sink
//!
//! Turn content is untrusted, whoever wrote it. The store keeps it raw;
//! every consumer escapes it for its own medium:
//!
//! - HTML consumers pass it through [`escape_html`];
//! - the terminal passes it through [`sanitize_terminal`], which removes
//!   escape sequences and control characters that could rewrite the screen.

use std::io::Write;

use colored::Colorize;

use crate::chat::log::{Author, Turn};
use crate::chat::notify::{ChangeKind, Notification, PresentationSink, StoreChange};
use crate::chat::store::ConversationSummary;
use crate::locale::Translations;

/// Escape text for inclusion in HTML element content or attribute values
///
/// # Examples
///
/// ```
/// use polyglot_messenger::render::escape_html;
///
/// assert_eq!(
///     escape_html(r#"<img src=x onerror="alert('hi')">"#),
///     "&lt;img src=x onerror=&quot;alert(&#x27;hi&#x27;)&quot;&gt;"
/// );
/// ```
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Make text safe to print on a terminal
///
/// Removes ANSI CSI and OSC escape sequences and every other control
/// character except newline and tab. Printable text, including non-Latin
/// scripts, is kept as is.
///
/// # Examples
///
/// ```
/// use polyglot_messenger::render::sanitize_terminal;
///
/// assert_eq!(sanitize_terminal("\x1b[2Jhello\x07"), "hello");
/// assert_eq!(sanitize_terminal("你好\tworld\n"), "你好\tworld\n");
/// ```
pub fn sanitize_terminal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                // CSI: parameters and intermediates up to a final byte in @..~
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('@'..='~').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: terminated by BEL or ESC \
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                // Two-character escape
                Some(_) => {
                    chars.next();
                }
                None => {}
            },
            '\n' | '\t' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Format one history row
///
/// `position` is the 1-based number the `/switch` and `/delete` commands
/// take. The active conversation is marked with `*`.
pub fn format_summary_line(position: usize, summary: &ConversationSummary) -> String {
    let marker = if summary.is_active { "*" } else { " " };
    let line = format!(
        "{} {:>2}. {} ({})",
        marker,
        position,
        sanitize_terminal(&summary.name),
        summary.last_activity_at.format("%H:%M")
    );
    if summary.is_active {
        line.green().to_string()
    } else {
        line
    }
}

/// Format the history list under its localized heading
pub fn format_history(summaries: &[ConversationSummary], translations: &Translations) -> String {
    let mut out = format!("{}\n", translations.history.bold());
    for (i, summary) in summaries.iter().enumerate() {
        out.push_str(&format_summary_line(i + 1, summary));
        out.push('\n');
    }
    out
}

/// Format one turn for the transcript
pub fn format_turn(turn: &Turn) -> String {
    let content = sanitize_terminal(turn.content());
    match turn.author() {
        Author::User => format!("{} {}", "you:".green().bold(), content),
        Author::Assistant => format!("{} {}", "ai:".cyan().bold(), content),
    }
}

/// Presentation sink that prints to a terminal
///
/// User turns are not echoed when appended, since the line editor already
/// shows what was typed. Turns appended to a background conversation only
/// produce a one-line notice.
pub struct TerminalSink {
    out: Box<dyn Write + Send>,
}

impl TerminalSink {
    /// Sink printing to stdout
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Sink printing to any writer
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    fn render_change(&mut self, change: &StoreChange) -> std::io::Result<()> {
        let snapshot = &change.snapshot;
        let name_of = |id| {
            snapshot
                .summaries
                .iter()
                .find(|s| s.id == id)
                .map(|s| sanitize_terminal(&s.name))
                .unwrap_or_default()
        };

        match &change.kind {
            ChangeKind::Created { id } => {
                writeln!(self.out, "\n{}\n", format!("── {} ──", name_of(*id)).bold())?;
            }
            ChangeKind::ActiveChanged { id, turns } => {
                writeln!(self.out, "\n{}", format!("── {} ──", name_of(*id)).bold())?;
                for turn in turns {
                    writeln!(self.out, "{}", format_turn(turn))?;
                }
                writeln!(self.out)?;
            }
            ChangeKind::Deleted { replacement, .. } => {
                writeln!(self.out, "{}", "Conversation deleted".dimmed())?;
                if let Some(id) = replacement {
                    writeln!(self.out, "\n{}\n", format!("── {} ──", name_of(*id)).bold())?;
                }
            }
            ChangeKind::TurnAppended { id, turn } => {
                if turn.author() == Author::User {
                    return Ok(());
                }
                if *id == snapshot.active {
                    writeln!(self.out, "{}\n", format_turn(turn))?;
                } else {
                    let notice = format!("(new reply in \"{}\")", name_of(*id));
                    writeln!(self.out, "{}", notice.dimmed())?;
                }
            }
            ChangeKind::LanguageChanged { language } => {
                let translations = language.translations();
                writeln!(self.out, "\n{}", translations.assistant.bold())?;
                write!(
                    self.out,
                    "{}",
                    format_history(&snapshot.summaries, translations)
                )?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TerminalSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSink").finish_non_exhaustive()
    }
}

impl PresentationSink for TerminalSink {
    fn notify(&mut self, notification: &Notification) {
        let result = match notification {
            Notification::StoreChanged(change) => self.render_change(change),
            Notification::Typing { visible: true, .. } => {
                writeln!(self.out, "{}", "ai is typing...".dimmed().italic())
            }
            Notification::Typing { visible: false, .. } => Ok(()),
            Notification::RemoteError { message, .. } => writeln!(
                self.out,
                "{}\n",
                format!("! {}", sanitize_terminal(message)).red()
            ),
        };
        if let Err(e) = result.and_then(|_| self.out.flush()) {
            tracing::debug!("Terminal write failed: {e}");
        }
    }
}
