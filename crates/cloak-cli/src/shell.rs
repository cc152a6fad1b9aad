//! Line-driven stand-in for the calculator screen.
//!
//! Plain lines are key presses. Lines starting with `:` are presentation
//! actions. While locked, every `:` action except lifecycle and `:quit`
//! answers like a bad key so the harness keeps the disguise too.

use anyhow::Result;
use cloak_core::{CloakError, Gateway, Lifecycle};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const BAD_INPUT: &str = "Error";

enum Flow {
    Continue,
    Quit,
}

pub async fn run(gateway: Arc<Gateway>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Flow::Quit = dispatch(&gateway, line).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    gateway.on_lifecycle(Lifecycle::Background).await;
    Ok(())
}

async fn dispatch(gateway: &Gateway, line: &str) -> Flow {
    let Some(action) = line.strip_prefix(':') else {
        match gateway.press_str(line).await {
            Ok(outcome) => {
                println!("{}", outcome.display);
                if outcome.unlocked_now {
                    println!("[unlocked]");
                }
            }
            Err(_) => println!("{BAD_INPUT}"),
        }
        return Flow::Continue;
    };

    let (verb, arg) = match action.split_once(' ') {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (action, ""),
    };
    match verb {
        "quit" | "q" => return Flow::Quit,
        "background" => {
            gateway.on_lifecycle(Lifecycle::Background).await;
            return Flow::Continue;
        }
        "inactive" => {
            gateway.on_lifecycle(Lifecycle::Inactive).await;
            return Flow::Continue;
        }
        "foreground" => {
            gateway.on_lifecycle(Lifecycle::Foreground).await;
            return Flow::Continue;
        }
        _ => {}
    }

    let session = gateway.session();
    if !session.is_unlocked() {
        println!("{BAD_INPUT}");
        return Flow::Continue;
    }

    let result: Result<(), CloakError> = async {
        match verb {
            "lock" => {
                session.lock();
                println!("[locked]");
            }
            "status" => {
                let state = session.snapshot();
                println!(
                    "phase={:?} paired_with={} messages={}",
                    state.phase(),
                    state.paired_with.as_deref().unwrap_or("-"),
                    state.messages.len()
                );
            }
            "pair" => {
                let code = session.generate_pairing_code().await?;
                println!("pairing code: {code}");
            }
            "join" => {
                session.join_with_code(arg).await?;
                println!("paired");
            }
            "unpair" => {
                session.unpair().await?;
                println!("unpaired");
            }
            "send" => {
                let message = session.send_message(arg).await?;
                println!("sent {}", message.id);
            }
            "messages" => {
                session.refresh_messages().await?;
                for message in session.messages() {
                    println!(
                        "[{}] {:?} {}",
                        message.timestamp, message.status, message.text
                    );
                }
            }
            "read" => {
                let count = session.mark_read().await?;
                println!("{count} marked read");
            }
            "code" => {
                session.change_code(arg).await?;
                println!("code changed");
            }
            "reset" => {
                gateway.reset().await?;
                println!("reset");
            }
            other => println!("unknown action ':{other}'"),
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        warn!(error = %e, action = verb, "action failed");
        println!("{e}");
    }
    Flow::Continue
}
