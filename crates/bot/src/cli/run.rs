//! `chatbridge run`: one message in, one reply out.

use std::sync::Arc;

use cb_domain::config::Config;
use cb_domain::Platform;

use crate::bootstrap;
use crate::gate::ChatKind;
use crate::state::Reply;

/// Gate and answer `message`, printing the reply to stdout.
///
/// Exits with code 1 when the turn fails.
pub async fn run(
    config: Arc<Config>,
    message: String,
    user: String,
    platform: Option<Platform>,
    group: bool,
    json_output: bool,
) -> anyhow::Result<()> {
    let platform = platform.unwrap_or(config.history.default_platform);
    let state = bootstrap::build_state(config)?;
    let kind = if group { ChatKind::Group } else { ChatKind::Private };

    let reply = match state.handle(kind, &user, platform, &message).await {
        Ok(reply) => reply,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    if json_output {
        let json = serde_json::to_string_pretty(&reply)
            .map_err(|e| anyhow::anyhow!("serializing reply: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    match reply {
        Reply::Answered { text } => println!("{text}"),
        Reply::Ignored => eprintln!("(message not addressed to the bot)"),
        Reply::Refused { reason } => eprintln!("refused: {reason}"),
        Reply::Withheld { word } => eprintln!("reply withheld (contains '{word}')"),
    }
    Ok(())
}
