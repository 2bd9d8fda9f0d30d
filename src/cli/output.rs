//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the forum-rag CLI.

use crate::types::{AnswerStatus, QueryResponse, Source};
use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Success,
    Info,
    Warning,
    Error,
}

impl Tone {
    fn tag(self) -> &'static str {
        match self {
            Tone::Success => "OK",
            Tone::Info => "INFO",
            Tone::Warning => "WARN",
            Tone::Error => "ERROR",
        }
    }
}

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the startup banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "forum-rag".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n   forum-rag v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        self.status(Tone::Success, message);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        self.status(Tone::Info, message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        self.status(Tone::Warning, message);
    }

    /// Print an error message to stderr
    pub fn error(&self, message: &str) {
        self.status(Tone::Error, message);
    }

    fn status(&self, tone: Tone, message: &str) {
        let line = if self.colored {
            match tone {
                Tone::Success => format!("  {} {}", "✓".green().bold(), message.green()),
                Tone::Info => format!("  {} {}", "•".blue(), message),
                Tone::Warning => format!("  {} {}", "⚠".yellow().bold(), message.yellow()),
                Tone::Error => format!("  {} {}", "✗".red().bold(), message.red()),
            }
        } else {
            format!("  [{}] {}", tone.tag(), message)
        };

        if tone == Tone::Error {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print an answer, optionally followed by its sources
    pub fn answer(&self, response: &QueryResponse, with_sources: bool) {
        match response.status {
            AnswerStatus::Answered => {}
            AnswerStatus::NoRelevantMaterial => {
                self.warning("No relevant conversations found");
            }
            AnswerStatus::Degraded => {
                self.warning("Generation unavailable, showing retrieved excerpts");
            }
        }

        println!();
        for line in response.answer.lines() {
            println!("  {}", line);
        }

        if with_sources && !response.sources.is_empty() {
            self.header("Sources");
            for source in &response.sources {
                self.source(source);
            }
        }

        println!();
        let footer = format!("{} · {} ms", response.request_id, response.duration_ms);
        if self.colored {
            println!("  {}", footer.dimmed());
        } else {
            println!("  {}", footer);
        }
    }

    /// Print one source with its score
    pub fn source(&self, source: &Source) {
        let excerpt = source.excerpt.replace('\n', " ");
        if self.colored {
            println!(
                "    {} {} {}",
                format!("{:.3}", source.score).bright_cyan(),
                source.chunk_id.dimmed(),
                excerpt
            );
        } else {
            println!("    {:.3} {} {}", source.score, source.chunk_id, excerpt);
        }
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}
