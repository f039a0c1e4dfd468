use rust_decimal::Decimal;
use std::io::BufRead;
use std::str::FromStr;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::error::InputError;
use crate::market_data::types::HubEvent;
use crate::metrics::prometheus;
use crate::state::alerts::validate_target;
use crate::state::feed::FeedFilter;
use crate::state::hub::normalize_id;
use crate::state::view::DashboardView;

pub const HELP: &str = "commands: add <id> | remove <id> | alert <id> <price> | unalert <id> | \
hold <id> <delta> | feed <all|youtube|twitter|news> | source <handle> | show | help | quit";

/// A user action, already validated at the input boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(String),
    Remove(String),
    Alert { asset_id: String, target: f64 },
    Unalert(String),
    Hold { asset_id: String, delta: Decimal },
    Feed(FeedFilter),
    Source(String),
    Show,
    Help,
    Quit,
}

/// Inline feedback for one command.
pub type CommandReply = Result<String, InputError>;

impl FromStr for Command {
    type Err = InputError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        match (verb.to_lowercase().as_str(), args.as_slice()) {
            ("add", [id]) => Ok(Command::Add(normalize_id(id)?)),
            ("add", _) => Err(InputError::Usage("add <asset-id>")),
            ("remove", [id]) => Ok(Command::Remove(normalize_id(id)?)),
            ("remove", _) => Err(InputError::Usage("remove <asset-id>")),
            ("alert", [id, price]) => Ok(Command::Alert {
                asset_id: normalize_id(id)?,
                target: parse_target(price)?,
            }),
            ("alert", _) => Err(InputError::Usage("alert <asset-id> <price>")),
            ("unalert", [id]) => Ok(Command::Unalert(normalize_id(id)?)),
            ("unalert", _) => Err(InputError::Usage("unalert <asset-id>")),
            ("hold", [id, delta]) => Ok(Command::Hold {
                asset_id: normalize_id(id)?,
                delta: Decimal::from_str(delta)
                    .map_err(|_| InputError::InvalidQuantity(delta.to_string()))?,
            }),
            ("hold", _) => Err(InputError::Usage("hold <asset-id> <delta>")),
            ("feed", [filter]) => Ok(Command::Feed(filter.parse()?)),
            ("feed", _) => Err(InputError::Usage("feed <all|youtube|twitter|news>")),
            // Source handles may contain spaces ("The Block").
            ("source", _) if !rest.is_empty() => Ok(Command::Source(rest.to_string())),
            ("source", _) => Err(InputError::EmptyFeedSource),
            ("show", []) => Ok(Command::Show),
            ("help", _) => Ok(Command::Help),
            ("quit" | "exit", []) => Ok(Command::Quit),
            _ => Err(InputError::UnknownCommand(line.to_string())),
        }
    }
}

fn parse_target(raw: &str) -> Result<f64, InputError> {
    let target = raw
        .parse::<f64>()
        .map_err(|_| InputError::InvalidAlertPrice(raw.to_string()))?;
    validate_target(target).map_err(|_| InputError::InvalidAlertPrice(raw.to_string()))?;
    Ok(target)
}

/// Reads stdin on a dedicated thread so a pending read never holds up
/// runtime shutdown.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(64);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

/// Handles input lines until `quit` or end of input. Invalid input is
/// rejected here and never reaches the router.
pub async fn run_command_loop(
    mut lines: mpsc::Receiver<String>,
    tx: mpsc::Sender<HubEvent>,
    view_rx: watch::Receiver<DashboardView>,
) -> anyhow::Result<()> {
    println!("{HELP}");

    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                prometheus::record_input_rejected(err.kind());
                println!("error: {err}");
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Show => {
                let view = view_rx.borrow().clone();
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
            command => match submit(&tx, command).await {
                Some(Ok(message)) => println!("{message}"),
                Some(Err(err)) => {
                    prometheus::record_input_rejected(err.kind());
                    println!("error: {err}");
                }
                None => {
                    debug!("router gone, command loop stopping");
                    break;
                }
            },
        }
    }

    Ok(())
}

/// Sends a command to the router and waits for its reply. `None` means the
/// router has shut down.
pub async fn submit(tx: &mpsc::Sender<HubEvent>, command: Command) -> Option<CommandReply> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(HubEvent::Command {
        command,
        reply: Some(reply_tx),
    })
    .await
    .ok()?;
    reply_rx.await.ok()
}
