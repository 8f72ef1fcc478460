//! Command-line command surface.
//!
//! A thin binary wrapper reads lines, calls [`parse_command`], and
//! dispatches through [`CliSession`]. Parsing understands double-quoted
//! arguments (`search "Software Engineer" "New York"`); unknown input maps
//! to a help response instead of an error.

use crate::controller::{Controller, Platform};
use crate::error::Result;
use std::sync::Arc;

/// Parsed CLI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Start,
    Stop,
    Status,
    Search { job_title: String, location: String },
    Pause,
    Resume,
    Config(Vec<String>),
    Quit,
    Help,
    Unknown(String),
}

/// What the wrapper should do after dispatching a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliOutcome {
    /// Keep reading commands; the payload is the text to show.
    Continue(String),
    /// Clean shutdown requested.
    Quit,
}

/// One-line usage summary shown for help and unknown input.
pub fn help_text() -> &'static str {
    "Commands: start | stop | status | search \"<title>\" \"<location>\" | pause | resume | config ... | quit"
}

/// Exit code for a finished CLI session: 0 on a clean quit, non-zero when
/// a fatal error propagated.
pub fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Parse one input line into a command.
pub fn parse_command(line: &str) -> CliCommand {
    let tokens = tokenize(line);
    let Some(verb) = tokens.first() else {
        return CliCommand::Help;
    };

    match verb.as_str() {
        "start" => CliCommand::Start,
        "stop" => CliCommand::Stop,
        "status" => CliCommand::Status,
        "pause" => CliCommand::Pause,
        "resume" => CliCommand::Resume,
        "quit" | "exit" => CliCommand::Quit,
        "help" | "?" => CliCommand::Help,
        "config" => CliCommand::Config(tokens[1..].to_vec()),
        "search" => {
            if tokens.len() < 3 {
                return CliCommand::Unknown(line.trim().to_string());
            }
            CliCommand::Search {
                job_title: tokens[1].clone(),
                location: tokens[2].clone(),
            }
        }
        _ => CliCommand::Unknown(line.trim().to_string()),
    }
}

/// Split a line into tokens, honouring double quotes.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Stateful command dispatcher over a controller.
pub struct CliSession {
    controller: Arc<Controller>,
}

impl CliSession {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }

    /// Dispatch one parsed command.
    pub async fn dispatch(&self, command: CliCommand) -> Result<CliOutcome> {
        self.controller
            .telemetry()
            .track_cli_command(&command_name(&command), serde_json::json!(format!("{:?}", command)));

        match command {
            CliCommand::Start => {
                self.controller.start_session().await?;
                Ok(CliOutcome::Continue("Session started successfully.".into()))
            }
            CliCommand::Stop => {
                self.controller.end_session().await?;
                Ok(CliOutcome::Continue("Session ended successfully.".into()))
            }
            CliCommand::Status => {
                let state = self.controller.session_state();
                let recent = self.controller.tracker().get_recent(30, None, None)?;
                let mut out = format!(
                    "paused={} stopped={} current_task={}\n",
                    state.paused,
                    state.stopped,
                    state.current_task.as_deref().unwrap_or("-")
                );
                if recent.is_empty() {
                    out.push_str("No activities recorded yet.");
                } else {
                    out.push_str("Recent activities:\n");
                    for record in recent.iter().rev().take(5).rev() {
                        out.push_str(&record.as_log_line());
                        out.push('\n');
                    }
                }
                Ok(CliOutcome::Continue(out))
            }
            CliCommand::Search {
                job_title,
                location,
            } => {
                self.controller
                    .run_platform_flow(Platform::LinkedIn, &job_title, &location)
                    .await?;
                Ok(CliOutcome::Continue(format!(
                    "Completed search & apply flow for '{}' in '{}'.",
                    job_title, location
                )))
            }
            CliCommand::Pause => {
                self.controller.pause_session().await?;
                Ok(CliOutcome::Continue("Session paused successfully.".into()))
            }
            CliCommand::Resume => {
                self.controller.resume_session().await?;
                Ok(CliOutcome::Continue("Session resumed successfully.".into()))
            }
            CliCommand::Config(args) => Ok(CliOutcome::Continue(format!(
                "Configuration is immutable at runtime; edit the environment and restart. (args: {:?})",
                args
            ))),
            CliCommand::Quit => {
                self.controller.end_session().await?;
                Ok(CliOutcome::Quit)
            }
            CliCommand::Help => Ok(CliOutcome::Continue(help_text().into())),
            CliCommand::Unknown(line) => Ok(CliOutcome::Continue(format!(
                "Unknown command: {}\n{}",
                line,
                help_text()
            ))),
        }
    }
}

fn command_name(command: &CliCommand) -> String {
    match command {
        CliCommand::Start => "start",
        CliCommand::Stop => "stop",
        CliCommand::Status => "status",
        CliCommand::Search { .. } => "search",
        CliCommand::Pause => "pause",
        CliCommand::Resume => "resume",
        CliCommand::Config(_) => "config",
        CliCommand::Quit => "quit",
        CliCommand::Help => "help",
        CliCommand::Unknown(_) => "unknown",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::Error;
    use crate::page::fake::FakePage;
    use crate::page::PageDriver;
    use crate::prompt::NullPrompt;
    use crate::session::Pacing;

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!(parse_command("start"), CliCommand::Start);
        assert_eq!(parse_command("  pause "), CliCommand::Pause);
        assert_eq!(parse_command("quit"), CliCommand::Quit);
        assert_eq!(parse_command("?"), CliCommand::Help);
        assert_eq!(parse_command(""), CliCommand::Help);
    }

    #[test]
    fn test_parse_search_with_quotes() {
        assert_eq!(
            parse_command("search \"Software Engineer\" \"New York\""),
            CliCommand::Search {
                job_title: "Software Engineer".into(),
                location: "New York".into(),
            }
        );
    }

    #[test]
    fn test_parse_search_missing_args_is_unknown() {
        assert!(matches!(
            parse_command("search \"only title\""),
            CliCommand::Unknown(_)
        ));
    }

    #[test]
    fn test_parse_unknown_input() {
        assert!(matches!(parse_command("launch the rockets"), CliCommand::Unknown(_)));
    }

    #[test]
    fn test_parse_config_args() {
        assert_eq!(
            parse_command("config max_retries 5"),
            CliCommand::Config(vec!["max_retries".into(), "5".into()])
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok(())), 0);
        assert_eq!(exit_code(&Err(Error::Config("bad".into()))), 1);
    }

    fn session() -> (tempfile::TempDir, CliSession) {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.system.data_dir = dir.path().join("data");
        settings.telemetry.storage_path = settings.system.data_dir.join("telemetry");

        let page = Arc::new(FakePage::new());
        let controller = Controller::builder(settings, page as Arc<dyn PageDriver>)
            .with_prompt(Arc::new(NullPrompt))
            .with_pacing(Pacing::none())
            .build()
            .unwrap();
        (dir, CliSession::new(Arc::new(controller)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_lifecycle_commands() {
        let (_dir, cli) = session();

        let out = cli.dispatch(CliCommand::Start).await.unwrap();
        assert!(matches!(out, CliOutcome::Continue(_)));

        let out = cli.dispatch(CliCommand::Status).await.unwrap();
        let CliOutcome::Continue(text) = out else {
            panic!("status should continue");
        };
        assert!(text.contains("Session started"));

        let out = cli.dispatch(CliCommand::Quit).await.unwrap();
        assert_eq!(out, CliOutcome::Quit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_unknown_shows_help() {
        let (_dir, cli) = session();
        let out = cli
            .dispatch(parse_command("frobnicate the widgets"))
            .await
            .unwrap();
        let CliOutcome::Continue(text) = out else {
            panic!("unknown should continue");
        };
        assert!(text.contains("Unknown command"));
        assert!(text.contains("search"));
    }
}
