//! Line-oriented shell bound to the dispatcher's observable state.
//!
//! Presentation only: reads lines, forwards them as control commands, and
//! mirrors every observed state change to the terminal.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use aide_auth::AuthGateway;
use aide_dispatch::DispatcherHandle;
use aide_foundation::{DispatchError, ShutdownToken};

pub async fn run(
    handle: DispatcherHandle,
    auth: Arc<dyn AuthGateway>,
    greeting_name: &str,
    shutdown: ShutdownToken,
) -> anyhow::Result<()> {
    println!("Welcome back, {greeting_name}");
    println!("Type a command, /talk to toggle listening, /commands for history, /quit to exit.");
    println!("[status] {}", handle.status());

    let printer = tokio::spawn(print_changes(handle.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "/quit" => break,
                    "/talk" => {
                        handle.toggle_listening().await?;
                    }
                    "/commands" => {
                        let commands = handle.commands();
                        if commands.is_empty() {
                            println!("(no commands yet)");
                        }
                        for (i, command) in commands.iter().enumerate() {
                            println!("{:>3}. {}", i + 1, command);
                        }
                    }
                    "/signout" => match auth.sign_out().await {
                        Ok(()) => println!("Signed out."),
                        Err(e) => println!("{e}"),
                    },
                    _ => {
                        if let Err(e) = handle.submit(&line).await {
                            match e {
                                DispatchError::EmptyInput => println!("Please enter a command."),
                                other => println!("{other}"),
                            }
                        }
                    }
                }
            }
        }
    }

    printer.abort();
    Ok(())
}

/// Mirror status, response, and live-transcript changes to stdout.
async fn print_changes(handle: DispatcherHandle) {
    let mut status = handle.subscribe_status();
    let mut response = handle.subscribe_response_text();
    let mut pending = handle.subscribe_pending_input();

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("[status] {}", *status.borrow_and_update());
            }
            changed = response.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", *response.borrow_and_update());
            }
            changed = pending.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = pending.borrow_and_update().clone();
                if !text.is_empty() {
                    println!("[heard] {text}");
                }
            }
        }
    }
}
