//! Line commands read from stdin.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join(String),
    Talk,
    Stop,
    Status,
    RetryMic,
    Help,
    Quit,
}

pub const HELP: &str = "commands: join <channel> | talk | stop | status | mic | help | quit";

pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "join" | "j" => match words.next() {
            Some(channel) => Command::Join(channel.to_string()),
            None => return Err("usage: join <channel>".to_string()),
        },
        "talk" | "t" => Command::Talk,
        "stop" | "s" => Command::Stop,
        "status" => Command::Status,
        "mic" => Command::RetryMic,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(command)
}
