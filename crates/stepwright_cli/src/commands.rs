use std::path::PathBuf;

use crate::replay::DEFAULT_CHUNK_SIZE;

pub const USAGE: &str = "\
usage:
  stepwright replay [--accept] [--chunk-size N] <capture.ndjson> <message...>
  stepwright send [--accept] <message...>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Feed a captured NDJSON stream through the engine without a network.
    Replay {
        capture: PathBuf,
        message: String,
        chunk_size: usize,
        accept: bool,
    },
    /// Send one message to the live backend.
    Send { message: String, accept: bool },
    Help,
}

pub fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(name) = args.next() else {
        return Ok(Command::Help);
    };

    let mut accept = false;
    let mut chunk_size = DEFAULT_CHUNK_SIZE;
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--accept" => accept = true,
            "--chunk-size" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--chunk-size needs a value".to_owned())?;
                chunk_size = value
                    .parse()
                    .ok()
                    .filter(|size| *size > 0)
                    .ok_or_else(|| format!("invalid chunk size '{value}'"))?;
            }
            _ => positional.push(arg),
        }
    }

    match name.as_str() {
        "help" | "--help" | "-h" => Ok(Command::Help),
        "replay" => {
            if positional.len() < 2 {
                return Err("replay needs a capture file and a message".to_owned());
            }
            let capture = PathBuf::from(positional.remove(0));
            Ok(Command::Replay {
                capture,
                message: positional.join(" "),
                chunk_size,
                accept,
            })
        }
        "send" => {
            if positional.is_empty() {
                return Err("send needs a message".to_owned());
            }
            Ok(Command::Send {
                message: positional.join(" "),
                accept,
            })
        }
        other => Err(format!("unknown command '{other}'")),
    }
}
