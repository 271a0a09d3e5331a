//! Command-line interface for the housie service.

use clap::{Parser, Subcommand};
use housie_engine::{COLUMNS, Ticket};
use std::fmt::Write;
use std::path::PathBuf;

/// Housie - host-moderated number-calling game
#[derive(Parser, Debug)]
#[command(name = "housie")]
#[command(about = "Runs a live housie game over HTTP and WebSocket", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the game server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to (overrides config and HOUSIE_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config and HOUSIE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print freshly generated tickets
    Tickets {
        /// Number of tickets
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Seed for reproducible tickets
        #[arg(long)]
        seed: Option<u64>,

        /// Emit JSON instead of grids
        #[arg(long)]
        json: bool,
    },
}

/// Renders a ticket as a boxed text grid, blanks shown as dots.
pub fn render_ticket(ticket: &Ticket) -> String {
    let rule = format!("+{}+", "-".repeat(COLUMNS * 4));
    let mut out = String::new();
    let _ = writeln!(out, "{}", ticket.id());
    let _ = writeln!(out, "{rule}");
    for row in ticket.grid() {
        out.push('|');
        for cell in row {
            if *cell == 0 {
                out.push_str("  . ");
            } else {
                let _ = write!(out, " {cell:>2} ");
            }
        }
        out.push_str("|\n");
    }
    out.push_str(&rule);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use housie_engine::TicketGenerator;

    #[test]
    fn test_parse_serve_overrides() {
        let args = ["housie", "serve", "--port", "8080", "--config", "housie.toml"];
        let cli = Cli::try_parse_from(args).expect("valid args");
        assert_eq!(
            cli.command,
            Command::Serve {
                config: Some(PathBuf::from("housie.toml")),
                host: None,
                port: Some(8080),
            }
        );
    }

    #[test]
    fn test_parse_tickets() {
        let cli = Cli::try_parse_from(["housie", "tickets", "-n", "6", "--seed", "42", "--json"])
            .expect("valid args");
        assert_eq!(
            cli.command,
            Command::Tickets {
                count: 6,
                seed: Some(42),
                json: true,
            }
        );
    }

    #[test]
    fn test_render_has_every_number() {
        let ticket = TicketGenerator::seeded(3).generate(1);
        let text = render_ticket(&ticket);

        assert!(text.starts_with("T-01\n"));
        assert_eq!(text.lines().count(), 6);
        for number in ticket.numbers() {
            assert!(text.contains(&format!("{number:>2}")));
        }
        assert_eq!(text.matches(" . ").count(), 12);
    }
}
