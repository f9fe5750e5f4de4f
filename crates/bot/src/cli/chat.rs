//! `chatbridge chat`: interactive REPL command.
//!
//! Each line goes through the same gate and orchestrator a chat front end
//! would use. Slash commands manage the current user's prompt, history,
//! and platform.

use std::sync::Arc;

use cb_domain::config::Config;
use cb_domain::Platform;

use crate::bootstrap;
use crate::gate::ChatKind;
use crate::state::{BotState, Reply};

/// REPL session settings, changed by slash commands.
struct Session {
    user: String,
    platform: Platform,
    kind: ChatKind,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(
    config: Arc<Config>,
    user: String,
    platform: Option<Platform>,
    group: bool,
) -> anyhow::Result<()> {
    let mut session = Session {
        user,
        platform: platform.unwrap_or(config.history.default_platform),
        kind: if group { ChatKind::Group } else { ChatKind::Private },
    };
    let state = bootstrap::build_state(config)?;

    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".chatbridge")
        .join("repl_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("chatbridge interactive chat");
    eprintln!(
        "User: {}  |  Platform: {}  |  Type /help for commands, Ctrl+D to exit",
        session.user, session.platform
    );
    eprintln!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if handle_slash_command(&state, &mut session, trimmed) {
                        break;
                    }
                    continue;
                }

                match state
                    .handle(session.kind, &session.user, session.platform, trimmed)
                    .await
                {
                    Ok(reply) => print_reply(reply),
                    Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

fn print_reply(reply: Reply) {
    match reply {
        Reply::Answered { text } => println!("bot> {text}\n"),
        Reply::Ignored => eprintln!("\x1b[2m(ignored: not addressed to the bot)\x1b[0m"),
        Reply::Refused { reason } => eprintln!("\x1b[33mrefused: {reason}\x1b[0m"),
        Reply::Withheld { word } => {
            eprintln!("\x1b[33mreply withheld (contains '{word}')\x1b[0m")
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash command handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process a slash command. Returns `true` if the REPL should exit.
fn handle_slash_command(state: &BotState, session: &mut Session, input: &str) -> bool {
    let (cmd, arg) = match input.split_once(' ') {
        Some((cmd, rest)) => (cmd, Some(rest.trim()).filter(|s| !s.is_empty())),
        None => (input, None),
    };

    match cmd {
        "/exit" | "/quit" => return true,

        "/prompt" => match arg {
            Some(prompt) => {
                state.service.set_prompt(&session.user, prompt);
                eprintln!("System prompt updated for {}", session.user);
            }
            None => {
                let user = state.service.user(&session.user);
                match user.history.first().filter(|m| m.is_system()) {
                    Some(m) => eprintln!("Current prompt: {}", m.content),
                    None => eprintln!("Platform {} has no system prompt", user.platform),
                }
                eprintln!("Usage: /prompt <text>");
            }
        },

        "/clear" => {
            state.service.clear(&session.user);
            eprintln!("History cleared for {}", session.user);
        }

        "/platform" => match arg.map(str::parse::<Platform>) {
            Some(Ok(platform)) => {
                session.platform = platform;
                eprintln!("Platform set to {platform} (history resets on the next message)");
            }
            Some(Err(e)) => eprintln!("{e}"),
            None => {
                let available: Vec<String> =
                    state.service.platforms().iter().map(|p| p.to_string()).collect();
                eprintln!("Current platform: {}", session.platform);
                eprintln!("Available: {}", available.join(", "));
            }
        },

        "/user" => match arg {
            Some(key) => {
                session.user = key.to_string();
                eprintln!("Now chatting as {key}");
            }
            None => eprintln!("Current user: {}\nUsage: /user <key>", session.user),
        },

        "/group" => {
            session.kind = match session.kind {
                ChatKind::Private => ChatKind::Group,
                ChatKind::Group => ChatKind::Private,
            };
            eprintln!("Message kind: {:?}", session.kind);
        }

        "/users" => {
            for user in state.service.list_users() {
                eprintln!(
                    "{:<16} {:<8} {:>3} msgs  id={}  updated={}",
                    user.key,
                    user.platform,
                    user.history.len(),
                    user.id,
                    user.updated_at.format("%Y-%m-%d %H:%M:%S"),
                );
            }
        }

        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /prompt [text]      Show or replace the system prompt");
            eprintln!("  /clear              Reset the conversation history");
            eprintln!("  /platform [name]    Show or switch platform (chatgpt, xunfei)");
            eprintln!("  /user [key]         Show or switch the user key");
            eprintln!("  /group              Toggle private/group message kind");
            eprintln!("  /users              List every known user");
            eprintln!("  /exit, /quit        Exit the chat");
            eprintln!("  /help               Show this help");
        }

        other => eprintln!("Unknown command: {other}  (type /help for a list)"),
    }

    false
}
