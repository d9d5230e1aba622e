//! Line-oriented front end over the session and exchange controllers.
//!
//! Lines starting with `/` are commands; anything else is sent to the open
//! chat.

use std::sync::Arc;

use parley_client::ChatBackend;
use parley_core::{Chat, Message, Sender};
use parley_session::{ExchangeController, ListView, SessionController, SessionError};

pub const HELP: &str = "\
Commands:
  /login <email>   sign in (creates the user if needed)
  /chats           show the chat list (or current search results)
  /search <query>  search your chats
  /clear           drop search results and show all chats
  /new <name>      create a chat
  /open <n|id>     open a chat by list number or id
  /close, /back    close the open chat
  /help            show this help
  /quit            exit
Any other text is sent to the open chat.";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(String),
    Chats,
    Search(String),
    Clear,
    New(String),
    Open(String),
    Close,
    Send(String),
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Command> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Some(Command::Send(line.trim_end_matches(['\r', '\n']).to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim().to_string()),
            None => (rest, String::new()),
        };
        let command = match name.to_ascii_lowercase().as_str() {
            "login" => Command::Login(arg),
            "chats" | "list" => Command::Chats,
            "search" => Command::Search(arg),
            "clear" => Command::Clear,
            "new" => Command::New(arg),
            "open" => Command::Open(arg),
            "close" | "back" => Command::Close,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }
}

/// What the caller should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Print(Vec<String>),
    Quit,
}

pub struct Repl<B: ChatBackend> {
    session: SessionController<B>,
    exchange: ExchangeController<B>,
}

impl<B: ChatBackend> Repl<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            session: SessionController::new(Arc::clone(&backend)),
            exchange: ExchangeController::new(backend),
        }
    }

    pub fn prompt(&self) -> String {
        let chat = self.exchange.with_state(|s| s.chat_id().map(str::to_string));
        let user = self
            .session
            .with_state(|s| s.user().map(|u| u.display_name().to_string()));
        match (user, chat) {
            (Some(user), Some(chat_id)) => format!("{user} [{}]> ", self.chat_label(&chat_id)),
            (Some(user), None) => format!("{user}> "),
            (None, _) => "> ".to_string(),
        }
    }

    pub async fn handle(&self, command: Command) -> Reply {
        let lines = match command {
            Command::Quit => return Reply::Quit,
            Command::Help => HELP.lines().map(str::to_string).collect(),
            Command::Unknown(name) => vec![format!("Unknown command: /{name}. Try /help.")],
            Command::Login(email) => self.login(&email).await,
            Command::Chats => self.list(),
            Command::Search(query) => match self.session.search(&query).await {
                Ok(_) => self.list(),
                Err(err) => failure(err),
            },
            Command::Clear => {
                self.session.clear_search();
                self.list()
            }
            Command::New(name) => match self.session.create_chat(Some(&name)).await {
                Ok(chat) => vec![format!("Created \"{}\".", chat.display_name())],
                Err(err) => failure(err),
            },
            Command::Open(target) => self.open(&target).await,
            Command::Close => {
                self.exchange.close();
                self.list()
            }
            Command::Send(text) => self.send(&text).await,
        };
        Reply::Print(lines)
    }

    async fn login(&self, email: &str) -> Vec<String> {
        self.exchange.close();
        match self.session.resolve(email).await {
            Ok(user) => {
                let mut lines = vec![format!("Signed in as {}.", user.display_name())];
                lines.extend(self.list());
                lines
            }
            Err(err) => failure(err),
        }
    }

    fn list(&self) -> Vec<String> {
        self.session.with_state(|state| match state.list_view() {
            ListView::SignedOut => vec!["Not signed in. Use /login <email>.".to_string()],
            ListView::Chats([]) => vec!["No chats yet. Use /new <name>.".to_string()],
            ListView::Chats(chats) => rows(chats),
            ListView::SearchResults { query, chats } => {
                let mut lines = vec![format!("Results for \"{query}\" (/clear for all chats):")];
                lines.extend(rows(chats));
                lines
            }
            ListView::NoSearchResults { query } => vec![format!(
                "No chats match \"{query}\". Use /clear to load all chats."
            )],
        })
    }

    /// Look up a chat by 1-based position in the displayed list, or by id.
    fn resolve_target(&self, target: &str) -> Option<String> {
        let chats = self.session.displayed_chats();
        if let Ok(n) = target.parse::<usize>() {
            return n
                .checked_sub(1)
                .and_then(|i| chats.get(i))
                .map(|chat| chat.chat_id.clone());
        }
        (!target.is_empty()).then(|| target.to_string())
    }

    fn chat_label(&self, chat_id: &str) -> String {
        self.session.with_state(|state| {
            state
                .chats()
                .iter()
                .chain(state.displayed_chats())
                .find(|chat| chat.chat_id == chat_id)
                .map(|chat| chat.display_name().to_string())
                .unwrap_or_else(|| chat_id.to_string())
        })
    }

    async fn open(&self, target: &str) -> Vec<String> {
        let Some(chat_id) = self.resolve_target(target) else {
            return vec![format!("No chat \"{target}\" in the list.")];
        };
        match self.exchange.open(&chat_id).await {
            Ok(_) => {
                let mut lines = vec![format!("== {} ==", self.chat_label(&chat_id))];
                let log = self.exchange.log();
                if log.is_empty() {
                    lines.push("(no messages yet)".to_string());
                }
                lines.extend(log.iter().map(format_message));
                lines
            }
            Err(err) => failure(err),
        }
    }

    async fn send(&self, text: &str) -> Vec<String> {
        if self.exchange.with_state(|s| s.chat_id().is_none()) {
            return vec!["Open a chat first (/open <n>).".to_string()];
        }
        let before = self.exchange.log().len();
        self.exchange.set_input(text);
        match self.exchange.submit().await {
            Ok(outcome) => vec![format_message(&outcome.agent_message)],
            Err(err) if err.is_superseded() => Vec::new(),
            Err(err) => {
                // Whatever was stored before the failure stays in the log.
                let mut lines: Vec<String> = self
                    .exchange
                    .log()
                    .iter()
                    .skip(before)
                    .map(format_message)
                    .collect();
                lines.extend(failure(err));
                lines
            }
        }
    }
}

fn rows(chats: &[Chat]) -> Vec<String> {
    chats
        .iter()
        .enumerate()
        .map(|(i, chat)| format!("{:>3}. {}: {}", i + 1, chat.display_name(), chat.preview()))
        .collect()
}

fn format_message(message: &Message) -> String {
    let who = match message.sender {
        Some(Sender::User) => "you",
        Some(Sender::Agent) => "agent",
        None => "unknown",
    };
    format!("[{who}] {}", message.content)
}

fn failure(err: SessionError) -> Vec<String> {
    if err.is_superseded() {
        return Vec::new();
    }
    vec![format!("Error: {err}")]
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_client::{MockBackend, OperationKind};

    fn lines(reply: Reply) -> Vec<String> {
        match reply {
            Reply::Print(lines) => lines,
            Reply::Quit => panic!("unexpected quit"),
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("/login ada@x.com"),
            Some(Command::Login("ada@x.com".to_string()))
        );
        assert_eq!(
            Command::parse("/search  paris trip "),
            Some(Command::Search("paris trip".to_string()))
        );
        assert_eq!(Command::parse("/back"), Some(Command::Close));
        assert_eq!(Command::parse("/QUIT"), Some(Command::Quit));
        assert_eq!(
            Command::parse("/frobnicate"),
            Some(Command::Unknown("frobnicate".to_string()))
        );
    }

    #[test]
    fn test_parse_plain_text_and_blank() {
        assert_eq!(
            Command::parse("what is the capital of France?\n"),
            Some(Command::Send("what is the capital of France?".to_string()))
        );
        assert_eq!(Command::parse("   "), None);
    }

    #[tokio::test]
    async fn test_login_lists_chats() {
        let backend = MockBackend::new();
        backend.seed_chat("ada@x.com", "Trip", vec![]);
        let repl = Repl::new(Arc::new(backend));

        let out = lines(repl.handle(Command::Login("ada@x.com".into())).await);
        assert_eq!(out[0], "Signed in as ada@x.com.");
        assert_eq!(out[1], "  1. Trip: No messages yet");
        assert_eq!(repl.prompt(), "ada@x.com> ");
    }

    #[tokio::test]
    async fn test_signed_out_list() {
        let repl = Repl::new(Arc::new(MockBackend::new()));
        let out = lines(repl.handle(Command::Chats).await);
        assert_eq!(out, vec!["Not signed in. Use /login <email>."]);
    }

    #[tokio::test]
    async fn test_search_without_hits_offers_clear() {
        let backend = MockBackend::new();
        backend.seed_chat("ada@x.com", "Trip", vec![]);
        let repl = Repl::new(Arc::new(backend));
        repl.handle(Command::Login("ada@x.com".into())).await;

        let out = lines(repl.handle(Command::Search("rome".into())).await);
        assert_eq!(
            out,
            vec!["No chats match \"rome\". Use /clear to load all chats."]
        );
        let out = lines(repl.handle(Command::Clear).await);
        assert_eq!(out, vec!["  1. Trip: No messages yet"]);
    }

    #[tokio::test]
    async fn test_open_by_number_and_send() {
        let backend = MockBackend::new();
        backend.seed_chat("ada@x.com", "Trip", vec![]);
        let backend = Arc::new(backend);
        let repl = Repl::new(Arc::clone(&backend));
        repl.handle(Command::Login("ada@x.com".into())).await;

        let out = lines(repl.handle(Command::Open("1".into())).await);
        assert_eq!(out, vec!["== Trip ==", "(no messages yet)"]);
        assert_eq!(repl.prompt(), "ada@x.com [Trip]> ");

        let out = lines(repl.handle(Command::Send("hello".into())).await);
        assert_eq!(out, vec!["[agent] Done: hello"]);
        assert_eq!(backend.call_count(OperationKind::PostAgentMessage), 1);
    }

    #[tokio::test]
    async fn test_send_without_open_chat() {
        let repl = Repl::new(Arc::new(MockBackend::new()));
        let out = lines(repl.handle(Command::Send("hello".into())).await);
        assert_eq!(out, vec!["Open a chat first (/open <n>)."]);
    }

    #[tokio::test]
    async fn test_failures_are_printed() {
        let backend = MockBackend::new();
        backend.seed_chat("ada@x.com", "Trip", vec![]);
        let backend = Arc::new(backend);
        let repl = Repl::new(Arc::clone(&backend));
        repl.handle(Command::Login("ada@x.com".into())).await;
        repl.handle(Command::Open("1".into())).await;

        backend.fail_next(OperationKind::RunAgent);
        let out = lines(repl.handle(Command::Send("hi".into())).await);
        assert_eq!(out, vec!["[you] hi", "Error: Failed to call the agent."]);

        let out = lines(repl.handle(Command::New("  ".into())).await);
        assert_eq!(out, vec!["Error: User must be logged in to create a chat."]);
    }

    #[tokio::test]
    async fn test_failed_user_post_prints_only_error() {
        let backend = MockBackend::new();
        backend.seed_chat("ada@x.com", "Trip", vec![]);
        let backend = Arc::new(backend);
        let repl = Repl::new(Arc::clone(&backend));
        repl.handle(Command::Login("ada@x.com".into())).await;
        repl.handle(Command::Open("1".into())).await;

        backend.fail_next(OperationKind::PostUserMessage);
        let out = lines(repl.handle(Command::Send("hi".into())).await);
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_failed_agent_post_prints_user_message() {
        let backend = MockBackend::new();
        backend.seed_chat("ada@x.com", "Trip", vec![]);
        let backend = Arc::new(backend);
        let repl = Repl::new(Arc::clone(&backend));
        repl.handle(Command::Login("ada@x.com".into())).await;
        repl.handle(Command::Open("1".into())).await;

        backend.fail_next(OperationKind::PostAgentMessage);
        let out = lines(repl.handle(Command::Send("hello".into())).await);
        assert_eq!(out, vec!["[you] hello", "Error: Failed to post agent message."]);
    }

    #[test]
    fn test_format_message_without_sender() {
        let message = Message {
            content: "legacy".to_string(),
            sender: None,
            timestamp: String::new(),
        };
        assert_eq!(format_message(&message), "[unknown] legacy");
    }

    #[tokio::test]
    async fn test_open_out_of_range() {
        let repl = Repl::new(Arc::new(MockBackend::new()));
        let out = lines(repl.handle(Command::Open("3".into())).await);
        assert_eq!(out, vec!["No chat \"3\" in the list."]);
    }

    #[tokio::test]
    async fn test_quit() {
        let repl = Repl::new(Arc::new(MockBackend::new()));
        assert_eq!(repl.handle(Command::Quit).await, Reply::Quit);
    }
}
