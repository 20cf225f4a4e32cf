use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread;

use jobsync_core::{HostTrigger, Msg};

#[derive(Debug, Clone, PartialEq)]
pub enum InputCommand {
    Dispatch(Msg),
    Quit,
    Help,
}

pub const HELP: &str = "commands: n | p | g <page> | f (refresh) | r (reconnect) | \
d <job id> | visible | online | offline | q";

/// Parses one stdin line. `None` for blank lines; `Err` carries a hint.
pub fn parse_command(line: &str) -> Option<Result<InputCommand, String>> {
    let mut words = line.split_whitespace();
    let head = words.next()?;
    let arg = words.next();

    let command = match (head, arg) {
        ("n" | "next", None) => InputCommand::Dispatch(Msg::NextPage),
        ("p" | "prev", None) => InputCommand::Dispatch(Msg::PreviousPage),
        ("g" | "goto", Some(page)) => match page.parse::<u32>() {
            Ok(page) => InputCommand::Dispatch(Msg::PageRequested(page)),
            Err(_) => return Some(Err(format!("not a page number: {page}"))),
        },
        ("d" | "deleted", Some(id)) => match id.parse() {
            Ok(id) => InputCommand::Dispatch(Msg::JobDeleted(id)),
            Err(_) => return Some(Err(format!("not a job id: {id}"))),
        },
        ("f" | "refresh", None) => InputCommand::Dispatch(Msg::RefreshRequested),
        ("r" | "reconnect", None) => InputCommand::Dispatch(Msg::ReconnectClicked),
        ("visible", None) => InputCommand::Dispatch(Msg::Trigger(HostTrigger::Visible)),
        ("online", None) => InputCommand::Dispatch(Msg::Trigger(HostTrigger::Online)),
        ("offline", None) => InputCommand::Dispatch(Msg::Trigger(HostTrigger::Offline)),
        ("q" | "quit", None) => InputCommand::Quit,
        ("h" | "help" | "?", None) => InputCommand::Help,
        _ => return Some(Err(format!("unknown command: {}", line.trim()))),
    };
    Some(Ok(command))
}

/// Reads stdin on its own thread. End of input counts as quit.
pub fn spawn_stdin_reader(tx: mpsc::Sender<Result<InputCommand, String>>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Some(parsed) = parse_command(&line) {
                if tx.send(parsed).is_err() {
                    return;
                }
            }
        }
        let _ = tx.send(Ok(InputCommand::Quit));
    });
}
