//! Input parsing
//!
//! Maps one line typed at the prompt to a [`Command`]. Lines starting with
//! `/` are commands; anything else is chat text.

use console_core::{ConsoleEvent, FileType, TaskRequest};

/// Help text shown by `/help`
pub const HELP: &str = "\
Commands:
  /models                      refresh and list available models
  /health                      refresh backend health
  /switch <name>               load another model
  /clear                       start a fresh conversation
  /cmd <command> <target>      send a service command, e.g. /cmd restart monitoring
  /task <type> <model> [file]  create an inference task (type: image, text, video, audio)
  /tasks                       list inference tasks
  /help                        show this help
  /quit                        exit
Anything else is sent as a chat message.";

/// What a line of input asks for
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Chat text
    Chat(String),
    /// `/models`
    Models,
    /// `/health`
    Health,
    /// `/switch <name>`
    Switch(String),
    /// `/clear`
    Clear,
    /// `/cmd <command> <target>`
    Service {
        /// Command verb
        command: String,
        /// What it applies to
        target: String,
    },
    /// `/task <type> <model> [file]`
    Task(TaskRequest),
    /// `/tasks`
    Tasks,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// Blank line
    Empty,
    /// Unusable input, with the reason
    Invalid(String),
}

impl Command {
    /// The console event this command sends, if any
    pub fn into_event(self) -> Option<ConsoleEvent> {
        match self {
            Self::Chat(content) => Some(ConsoleEvent::UserMessage { content }),
            Self::Models | Self::Health => Some(ConsoleEvent::RefreshModels),
            Self::Switch(name) => Some(ConsoleEvent::SwitchModel { name }),
            Self::Clear => Some(ConsoleEvent::ClearHistory),
            Self::Service { command, target } => {
                Some(ConsoleEvent::ServiceCommand { command, target })
            }
            Self::Task(request) => Some(ConsoleEvent::SubmitTask { request }),
            Self::Quit => Some(ConsoleEvent::Shutdown),
            Self::Tasks | Self::Help | Self::Empty | Self::Invalid(_) => None,
        }
    }

    /// Whether the command starts a chat reply
    pub fn starts_reply(&self) -> bool {
        matches!(self, Self::Chat(_) | Self::Service { .. })
    }
}

/// Parse one line of input
pub fn parse_line(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Command::Chat(line.to_string());
    };

    let (name, args) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(name, args)| (name, args.trim()));

    match name {
        "models" => Command::Models,
        "health" => Command::Health,
        "clear" => Command::Clear,
        "tasks" => Command::Tasks,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "switch" if args.is_empty() => Command::Invalid("usage: /switch <name>".to_string()),
        "switch" => Command::Switch(args.to_string()),
        "cmd" => parse_service(args),
        "task" => parse_task(args),
        other => Command::Invalid(format!("unknown command: /{other} (try /help)")),
    }
}

fn parse_service(args: &str) -> Command {
    match args.split_once(char::is_whitespace) {
        Some((command, target)) if !target.trim().is_empty() => Command::Service {
            command: command.to_string(),
            target: target.trim().to_string(),
        },
        _ => Command::Invalid("usage: /cmd <command> <target>".to_string()),
    }
}

fn parse_task(args: &str) -> Command {
    let mut parts = args.split_whitespace();
    let (Some(file_type), Some(model)) = (parts.next(), parts.next()) else {
        return Command::Invalid("usage: /task <type> <model> [file]".to_string());
    };
    let Some(file_type) = FileType::parse(file_type) else {
        return Command::Invalid(format!(
            "unknown file type: {file_type} (image, text, video, audio)"
        ));
    };

    let mut request = TaskRequest::new(file_type, model);
    if let Some(file) = parts.next() {
        request = request.with_file_name(file);
    }
    Command::Task(request)
}
