//! Interactive terminal front-end.
//!
//! rustyline runs on its own thread and hands lines over a channel; a display
//! task watches the session's signals and prints what changed.

use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use rustyline::{
    Cmd, ConditionalEventHandler, DefaultEditor, Event, EventContext, EventHandler, KeyCode,
    KeyEvent, RepeatCount, error::ReadlineError,
};
use tayori_shared::time::{Clock, SystemClock};
use tokio::sync::mpsc;

use crate::{
    domain::{
        ConversationId, CreateConversationRequest, MessageId, MessageKind, PresenceStatus,
        UserId, event::MessageSendData,
    },
    error::ClientError,
    usecase::Session,
};

use super::formatter::MessageFormatter;

/// Prompt text shared between the readline thread and the display task.
#[derive(Clone, Default)]
struct Prompt(Arc<Mutex<String>>);

impl Prompt {
    fn set(&self, text: String) {
        *self.0.lock().unwrap_or_else(|p| p.into_inner()) = text;
    }

    fn get(&self) -> String {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Redisplay the prompt after printing asynchronously
    fn redisplay(&self) {
        print!("{}", self.get());
        std::io::stdout().flush().ok();
    }
}

/// A parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Login { username: String, password: String },
    Logout,
    List,
    Open(String),
    Close,
    NewDirect(String),
    NewGroup { name: String, members: Vec<String> },
    Search(String),
    Delete(String),
    Online,
    Status(PresenceStatus),
    Profile,
    Contacts,
    Help,
    Quit,
    Say(String),
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();
    let one = |usage: &str| match args.as_slice() {
        [arg] => Ok(arg.to_string()),
        _ => Err(format!("usage: {}", usage)),
    };

    match name {
        "login" => match args.as_slice() {
            [username, password] => Ok(Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err("usage: /login <username> <password>".to_string()),
        },
        "logout" => Ok(Command::Logout),
        "list" => Ok(Command::List),
        "open" => one("/open <n|id>").map(Command::Open),
        "close" => Ok(Command::Close),
        "new" => one("/new <userId>").map(Command::NewDirect),
        "group" => match args.as_slice() {
            [name, members @ ..] if !members.is_empty() => Ok(Command::NewGroup {
                name: name.to_string(),
                members: members.iter().map(|m| m.to_string()).collect(),
            }),
            _ => Err("usage: /group <name> <userId>...".to_string()),
        },
        "search" if !args.is_empty() => Ok(Command::Search(args.join(" "))),
        "search" => Err("usage: /search <query>".to_string()),
        "delete" => one("/delete <messageId>").map(Command::Delete),
        "online" => Ok(Command::Online),
        "status" => match args.as_slice() {
            ["online"] => Ok(Command::Status(PresenceStatus::Online)),
            ["offline"] => Ok(Command::Status(PresenceStatus::Offline)),
            _ => Err("usage: /status <online|offline>".to_string()),
        },
        "profile" => Ok(Command::Profile),
        "contacts" => Ok(Command::Contacts),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '/{}' (try /help)", other)),
    }
}

/// Whether typing `c` into `line` is composing a message rather than a `/command`.
fn counts_as_typing(line: &str, c: char) -> bool {
    match line.chars().next() {
        Some(first) => first != '/',
        None => c != '/',
    }
}

/// Reports characters typed into a message line.
struct KeystrokeHandler {
    keystrokes: mpsc::UnboundedSender<()>,
}

impl ConditionalEventHandler for KeystrokeHandler {
    fn handle(
        &self,
        event: &Event,
        _: RepeatCount,
        _: bool,
        ctx: &EventContext,
    ) -> Option<Cmd> {
        if let Some(KeyEvent(KeyCode::Char(c), _)) = event.get(0) {
            if counts_as_typing(ctx.line(), *c) {
                let _ = self.keystrokes.send(());
            }
        }
        // fall through to the default binding
        None
    }
}

/// Input lines plus a tick per typed character, for the typing indicator.
struct Input {
    lines: mpsc::UnboundedReceiver<String>,
    keystrokes: mpsc::UnboundedReceiver<()>,
}

fn spawn_readline(prompt: Prompt) -> Input {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();
    let (keystroke_tx, keystroke_rx) = mpsc::unbounded_channel::<()>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };
        rl.bind_sequence(
            Event::Any,
            EventHandler::Conditional(Box::new(KeystrokeHandler {
                keystrokes: keystroke_tx,
            })),
        );

        loop {
            match rl.readline(&prompt.get()) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    Input {
        lines: input_rx,
        keystrokes: keystroke_rx,
    }
}

/// Print whatever the session's signals report, until the session goes away.
fn spawn_display(session: &Session, prompt: Prompt) -> tokio::task::JoinHandle<()> {
    let store = session.store().clone();
    let presence = session.presence().clone();
    let router_message = session.router().message();
    let router_error = session.router().message_error();
    let router_typing = session.router().typing_start();
    let router_online = session.router().user_online();
    let router_offline = session.router().user_offline();
    let status = session.connection().status();
    let token = session.auth().tokens().token();

    let mut message_rx = router_message.subscribe();
    let mut error_rx = router_error.subscribe();
    let mut typing_rx = router_typing.subscribe();
    let mut online_rx = router_online.subscribe();
    let mut offline_rx = router_offline.subscribe();
    let mut status_rx = status.subscribe();
    let mut token_rx = token.subscribe();

    tokio::spawn(async move {
        let clock = SystemClock;
        loop {
            let output = tokio::select! {
                Ok(()) = message_rx.changed() => {
                    let Some(data) = message_rx.borrow_and_update().clone() else { continue };
                    let message: crate::domain::Message = data.into();
                    let me = store.current_user().get().map(|u| u.id);
                    if store.selected_id().get().as_ref() == Some(&message.conversation_id) {
                        MessageFormatter::format_message(&message, me.as_ref(), clock.now())
                    } else if me.as_ref() == Some(&message.sender.id) {
                        continue;
                    } else {
                        let conversation = store.conversations().with(|list| {
                            crate::domain::conversation::find(list, &message.conversation_id).cloned()
                        });
                        MessageFormatter::format_incoming_elsewhere(conversation.as_ref(), &message)
                    }
                }
                Ok(()) = error_rx.changed() => {
                    let Some(error) = error_rx.borrow_and_update().clone() else { continue };
                    MessageFormatter::format_message_error(&error)
                }
                Ok(()) = typing_rx.changed() => {
                    let Some(event) = typing_rx.borrow_and_update().clone() else { continue };
                    let open = store.selected_id().get();
                    if open.as_ref() != Some(&event.conversation_id) {
                        continue;
                    }
                    let Some(text) = store.typing_text(&event.conversation_id) else { continue };
                    MessageFormatter::format_typing(&text)
                }
                Ok(()) = online_rx.changed() => {
                    let Some(event) = online_rx.borrow_and_update().clone() else { continue };
                    let Some(entry) = presence.entry(&event.user_id) else { continue };
                    MessageFormatter::format_presence(&event.user_id, &entry, clock.now())
                }
                Ok(()) = offline_rx.changed() => {
                    let Some(event) = offline_rx.borrow_and_update().clone() else { continue };
                    let Some(entry) = presence.entry(&event.user_id) else { continue };
                    MessageFormatter::format_presence(&event.user_id, &entry, clock.now())
                }
                Ok(()) = status_rx.changed() => {
                    let connected = *status_rx.borrow_and_update();
                    MessageFormatter::format_connection_status(connected)
                }
                Ok(()) = token_rx.changed() => {
                    if token_rx.borrow_and_update().is_some() {
                        continue;
                    }
                    "\nSigned out. Use /login <username> <password>\n".to_string()
                }
                else => break,
            };
            print!("{}", output);
            prompt.redisplay();
        }
    })
}

fn prompt_text(session: &Session) -> String {
    let user = session
        .profile()
        .current_user()
        .get()
        .map(|u| u.username)
        .unwrap_or_else(|| "guest".to_string());
    match session.store().selected_conversation() {
        Some(conversation) => format!("{}@{}> ", user, conversation.title()),
        None => format!("{}> ", user),
    }
}

/// Resolve `/open` arguments: a 1-based list position or a conversation id.
fn resolve_conversation(session: &Session, arg: &str) -> Result<ConversationId, ClientError> {
    if let Ok(position) = arg.parse::<usize>() {
        return session
            .store()
            .conversations()
            .with(|list| {
                position
                    .checked_sub(1)
                    .and_then(|i| list.get(i))
                    .map(|c| c.id.clone())
            })
            .ok_or_else(|| ClientError::InvalidInput(format!("no conversation #{}", position)));
    }
    ConversationId::new(arg).map_err(|e| ClientError::InvalidInput(e.to_string()))
}

fn user_id(arg: &str) -> Result<UserId, ClientError> {
    UserId::new(arg).map_err(|e| ClientError::InvalidInput(e.to_string()))
}

/// Returns `false` when the user asked to quit.
async fn execute(session: &Session, command: Command) -> Result<bool, ClientError> {
    let now = SystemClock.now();
    match command {
        Command::Login { username, password } => {
            session.auth().login(&username, &password).await?;
            session.enter_messaging().await?;
            print!(
                "{}",
                MessageFormatter::format_conversation_list(
                    &session.store().conversations().get(),
                    None,
                    now
                )
            );
        }
        Command::Logout => {
            session.logout().await;
        }
        Command::List => {
            let selected = session.store().selected_id().get();
            print!(
                "{}",
                MessageFormatter::format_conversation_list(
                    &session.store().conversations().get(),
                    selected.as_ref(),
                    now
                )
            );
        }
        Command::Open(arg) => {
            let id = resolve_conversation(session, &arg)?;
            session.typing().force_stop();
            let known = session
                .store()
                .conversations()
                .with(|list| crate::domain::conversation::find(list, &id).is_some());
            if known {
                session.store().select_conversation(Some(id)).await?;
            } else {
                session.store().open_conversation(id).await?;
            }
            if let Some(conversation) = session.store().selected_conversation() {
                let me = session.profile().current_user().get().map(|u| u.id);
                print!(
                    "{}",
                    MessageFormatter::format_history(
                        &conversation,
                        &session.store().messages().get(),
                        me.as_ref(),
                        now
                    )
                );
            }
        }
        Command::Close => {
            session.typing().force_stop();
            session.store().select_conversation(None).await?;
        }
        Command::NewDirect(user) => {
            let created = session
                .store()
                .create_conversation(CreateConversationRequest::direct(user_id(&user)?))
                .await?;
            session.store().select_conversation(Some(created.id)).await?;
        }
        Command::NewGroup { name, members } => {
            let members = members
                .iter()
                .map(|m| user_id(m))
                .collect::<Result<Vec<_>, _>>()?;
            let created = session
                .store()
                .create_conversation(CreateConversationRequest::group(name, members))
                .await?;
            session.store().select_conversation(Some(created.id)).await?;
        }
        Command::Search(query) => {
            let results = session.store().search_conversations(&query).await?;
            print!(
                "{}",
                MessageFormatter::format_conversation_list(&results, None, now)
            );
        }
        Command::Delete(message_id) => {
            let Some(conversation_id) = session.store().selected_id().get() else {
                return Err(ClientError::InvalidInput("no conversation is open".to_string()));
            };
            let message_id =
                MessageId::new(message_id).map_err(|e| ClientError::InvalidInput(e.to_string()))?;
            session.store().delete_message(conversation_id, message_id);
        }
        Command::Online => {
            session.connection().request_online_users();
            print!(
                "{}",
                MessageFormatter::format_online_users(&session.presence().online_users())
            );
        }
        Command::Status(status) => {
            session.connection().update_status(status);
        }
        Command::Profile => {
            let user = session.profile().load_profile().await?;
            print!("{}", MessageFormatter::format_profile(&user));
        }
        Command::Contacts => {
            for contact in session.profile().contacts().await? {
                print!("{}", MessageFormatter::format_profile(&contact));
            }
        }
        Command::Help => println!("{}", MessageFormatter::format_help()),
        Command::Quit => return Ok(false),
        Command::Say(content) => {
            let Some(conversation_id) = session.store().selected_id().get() else {
                return Err(ClientError::InvalidInput(
                    "open a conversation first (/list, /open <n>)".to_string(),
                ));
            };
            session.typing().force_stop();
            let sent = session.store().send_message(MessageSendData {
                conversation_id,
                content,
                kind: MessageKind::Text,
                reply_to: None,
            });
            if !sent {
                println!("(not connected; message not sent)");
            }
        }
    }
    Ok(true)
}

/// Run the interactive session until `/quit`, Ctrl+C or Ctrl+D.
pub async fn run(session: Session) -> Result<(), ClientError> {
    let prompt = Prompt::default();
    prompt.set(prompt_text(&session));

    if session.auth().tokens().is_authenticated() {
        if let Err(e) = session.enter_messaging().await {
            tracing::warn!("Failed to load messaging state: {}", e);
        }
        prompt.set(prompt_text(&session));
    } else {
        println!("\nNot signed in. Use /login <username> <password>");
    }
    println!("Type /help for commands.\n");

    let display = spawn_display(&session, prompt.clone());
    let mut input = spawn_readline(prompt.clone());

    loop {
        let line = tokio::select! {
            line = input.lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
            Some(()) = input.keystrokes.recv() => {
                if let Some(conversation_id) = session.store().selected_id().get() {
                    session.typing().on_input(&conversation_id);
                }
                continue;
            }
        };
        let outcome = match parse_command(&line) {
            Ok(command) => execute(&session, command).await,
            Err(usage) => {
                println!("{}", usage);
                Ok(true)
            }
        };
        match outcome {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("error: {}", e),
        }
        prompt.set(prompt_text(&session));
    }

    display.abort();
    session.leave_messaging();
    tracing::info!("Client session ended");
    Ok(())
}
