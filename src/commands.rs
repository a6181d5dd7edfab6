//! Line-oriented commands read from stdin while tailing.

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::Sender;
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Follow another file
    Switch(PathBuf),
    /// Follow the newest log of another channel
    Channel(String),
    Reset,
    State,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let words = shell_words::split(line)
            .with_context(|| format!("Invalid command: {}", line.trim()))?;

        let Some((name, args)) = words.split_first() else {
            return Ok(None);
        };

        let command = match (name.as_str(), args) {
            ("switch", [path]) => Command::Switch(PathBuf::from(path)),
            ("channel", [channel]) => Command::Channel(channel.clone()),
            ("reset", []) => Command::Reset,
            ("state", []) => Command::State,
            ("quit" | "exit", []) => Command::Quit,
            ("switch", _) => bail!("usage: switch <path>"),
            ("channel", _) => bail!("usage: channel <name>"),
            (other, _) => return Err(anyhow!("Unknown command '{}'", other)),
        };
        Ok(Some(command))
    }
}

/// Read commands until EOF. Malformed lines come through as errors so the
/// caller can report them.
pub fn spawn_command_reader<R>(reader: R, sender: Sender<Result<Command>>) -> thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        for line in reader.lines() {
            let parsed = match line {
                Ok(line) => Command::parse(&line).transpose(),
                Err(e) => Some(Err(anyhow!("Failed to read command: {}", e))),
            };
            if let Some(parsed) = parsed {
                if sender.send(parsed).is_err() {
                    break;
                }
            }
        }
        tracing::debug!("command input closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::io::Cursor;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("switch '/logs/My Fleet.txt'").unwrap(),
            Some(Command::Switch(PathBuf::from("/logs/My Fleet.txt")))
        );
        assert_eq!(
            Command::parse("channel corp").unwrap(),
            Some(Command::Channel("corp".to_string()))
        );
        assert_eq!(Command::parse("  reset ").unwrap(), Some(Command::Reset));
        assert_eq!(Command::parse("state").unwrap(), Some(Command::State));
        assert_eq!(Command::parse("quit").unwrap(), Some(Command::Quit));
        assert_eq!(Command::parse("").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse("switch").is_err());
        assert!(Command::parse("reset now").is_err());
        assert!(Command::parse("launch").unwrap_err().to_string().contains("Unknown command"));
        assert!(Command::parse("switch 'open").is_err());
    }

    #[test]
    fn test_reader_forwards_until_eof() {
        let (tx, rx) = unbounded();
        let input = Cursor::new("reset\n\nbogus\nquit\n");
        spawn_command_reader(input, tx).join().unwrap();

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 3);
        assert_eq!(received[0].as_ref().unwrap(), &Command::Reset);
        assert!(received[1].is_err());
        assert_eq!(received[2].as_ref().unwrap(), &Command::Quit);
    }
}
