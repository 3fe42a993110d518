//! Line-oriented chat client.
//!
//! ```text
//! CHAT_URL=ws://127.0.0.1:8080/ws CHAT_TOKEN=secret \
//!     cargo run -p chat-cli -- alice general
//! ```
//!
//! Plain lines are posted to the current conversation. Commands:
//! `/join <id>`, `/typing`, `/who`, `/quit`.

use chatwire::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Say(&'a str),
    Join(&'a str),
    Typing,
    Who,
    Quit,
    Unknown(&'a str),
    Empty,
}

fn parse(line: &str) -> Input<'_> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return if line.is_empty() { Input::Empty } else { Input::Say(line) };
    };
    let (cmd, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    match (cmd, arg.trim()) {
        ("join", id) if !id.is_empty() => Input::Join(id),
        ("typing", _) => Input::Typing,
        ("who", _) => Input::Who,
        ("quit", _) => Input::Quit,
        _ => Input::Unknown(line),
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn render(update: &Update) -> Option<String> {
    let line = match update {
        Update::Event(InboundEvent::MessagePosted {
            username, content, ..
        }) => format!("<{username}> {content}"),
        Update::Event(InboundEvent::MessageEdited { id, content, .. }) => {
            format!("* {id} edited: {content}")
        }
        Update::Event(InboundEvent::MessageDeleted { id, .. }) => format!("* {id} deleted"),
        Update::Event(InboundEvent::UserJoined { username, .. }) => {
            format!("-> {username} joined")
        }
        Update::Event(InboundEvent::UserLeft { username, .. }) => format!("<- {username} left"),
        Update::Event(InboundEvent::FriendRequestReceived { sender_username }) => {
            format!("! friend request from {sender_username}")
        }
        Update::Event(InboundEvent::FriendRequestAccepted { accepter_username }) => {
            format!("! {accepter_username} accepted your friend request")
        }
        Update::TypingChanged { typing, .. } if !typing.is_empty() => {
            let names: Vec<_> = typing.iter().map(Username::as_str).collect();
            format!("({} typing)", names.join(", "))
        }
        Update::ConversationSwitched { to, .. } => format!("== now in {to} =="),
        _ => return None,
    };
    Some(line)
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let username = args.next().ok_or("usage: chat-cli <username> [conversation]")?;
    let conversation = args.next().unwrap_or_else(|| "general".into());
    let url = std::env::var("CHAT_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080/ws".into());
    let token = std::env::var("CHAT_TOKEN").map_err(|_| "CHAT_TOKEN is not set")?;

    let client = ChatClient::builder()
        .url(url)
        .username(username)
        .token(token)
        .conversation(conversation)
        .build(WebSocketConnector, OpenMembership)
        .await?;

    let mut updates = client.subscribe(EventFilter::all()).await?;
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            if let Some(line) = render(&update) {
                println!("{line}");
            }
        }
    });

    let mut status = client.watch_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            tracing::info!(state = %current.state, fault = ?current.fault, "connection");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let result = match parse(&line) {
            Input::Say(body) => client.send(body, None).await.map(drop),
            Input::Join(id) => client.switch_conversation(id).await.map(drop),
            Input::Typing => client.send_typing().await,
            Input::Who => {
                let snapshot = client.snapshot().await?;
                let names: Vec<_> = snapshot.presence.iter().map(Username::as_str).collect();
                println!("{} [{}]: {}", snapshot.conversation, snapshot.status.state, names.join(", "));
                Ok(())
            }
            Input::Quit => break,
            Input::Unknown(cmd) => {
                eprintln!("unknown command: {cmd}");
                Ok(())
            }
            Input::Empty => Ok(()),
        };
        if let Err(e) = result {
            eprintln!("error: {e}");
        }
    }

    client.shutdown().await?;
    Ok(())
}
