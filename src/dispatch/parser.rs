//! Request line parser.
//!
//! Turns one line of the text protocol into a [`Command`]. Parsing never
//! touches hardware or state, so every grammar rule can be tested without a
//! session.
//!
//! ```text
//! OUTPUT <board> <channel> [0|1]
//! FREQ   <board> <channel> [<number>|?] <HZ|KHZ|MHZ>
//! AMPL   <board> <channel> [<integer>]
//! PHASE  <board> <channel> [<number>|?]
//! RESET  <board> <channel>
//! MIN|MAX FREQ|AMPL|PHASE
//! ```

use crate::dds::{BoardId, ChannelId, DeviceKey};
use crate::error::{Error, Result};
use std::str::FromStr;

pub const QUERY_PLACEHOLDER: &str = "?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreqUnit {
    Hz,
    KHz,
    MHz,
}

impl FreqUnit {
    pub fn hz_per_unit(self) -> f64 {
        match self {
            FreqUnit::Hz => 1.0,
            FreqUnit::KHz => 1e3,
            FreqUnit::MHz => 1e6,
        }
    }
}

impl FromStr for FreqUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "HZ" => Ok(FreqUnit::Hz),
            "KHZ" => Ok(FreqUnit::KHz),
            "MHZ" => Ok(FreqUnit::MHz),
            _ => Err(Error::InvalidArgument(format!("unknown frequency unit '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Frequency,
    Amplitude,
    Phase,
}

/// One parsed request. `None` values mean "query only".
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Output { key: DeviceKey, enable: Option<bool> },
    Freq { key: DeviceKey, value: Option<f64>, unit: FreqUnit },
    Ampl { key: DeviceKey, value: Option<i64> },
    Phase { key: DeviceKey, value: Option<f64> },
    Reset { key: DeviceKey },
    Limit { bound: Bound, quantity: Quantity },
}

fn parse_key(board: &str, channel: &str) -> Result<DeviceKey> {
    Ok(DeviceKey::new(board.parse::<BoardId>()?, channel.parse::<ChannelId>()?))
}

fn parse_real(token: &str, what: &str) -> Result<Option<f64>> {
    if token == QUERY_PLACEHOLDER {
        return Ok(None);
    }
    token
        .parse::<f64>()
        .map(Some)
        .map_err(|_| Error::InvalidArgument(format!("{} '{}' is not a number", what, token)))
}

fn arity(keyword: &str, tokens: &[&str], allowed: std::ops::RangeInclusive<usize>) -> Result<()> {
    if allowed.contains(&tokens.len()) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "{} takes {} to {} arguments, got {}",
            keyword,
            allowed.start() - 1,
            allowed.end() - 1,
            tokens.len() - 1
        )))
    }
}

/// Parse one request line (already stripped of its terminator).
pub fn parse(line: &str) -> Result<Command> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = tokens.first() else {
        return Err(Error::InvalidArgument("empty command".to_string()));
    };
    let keyword = first.to_ascii_uppercase();

    match keyword.as_str() {
        "OUTPUT" => {
            arity(&keyword, &tokens, 3..=4)?;
            let key = parse_key(tokens[1], tokens[2])?;
            let enable = match tokens.get(3).copied() {
                Some("0") => Some(false),
                Some("1") => Some(true),
                _ => None,
            };
            Ok(Command::Output { key, enable })
        }
        "FREQ" => {
            arity(&keyword, &tokens, 4..=5)?;
            let key = parse_key(tokens[1], tokens[2])?;
            let (value, unit) = if tokens.len() == 5 {
                (parse_real(tokens[3], "frequency")?, tokens[4].parse::<FreqUnit>()?)
            } else {
                (None, tokens[3].parse::<FreqUnit>()?)
            };
            Ok(Command::Freq { key, value, unit })
        }
        "AMPL" => {
            arity(&keyword, &tokens, 3..=4)?;
            let key = parse_key(tokens[1], tokens[2])?;
            let value = tokens.get(3).and_then(|t| t.parse::<i64>().ok());
            Ok(Command::Ampl { key, value })
        }
        "PHASE" => {
            arity(&keyword, &tokens, 3..=4)?;
            let key = parse_key(tokens[1], tokens[2])?;
            let value = match tokens.get(3) {
                Some(token) => parse_real(token, "phase")?,
                None => None,
            };
            Ok(Command::Phase { key, value })
        }
        "RESET" => {
            arity(&keyword, &tokens, 3..=3)?;
            Ok(Command::Reset { key: parse_key(tokens[1], tokens[2])? })
        }
        "MIN" | "MAX" => {
            arity(&keyword, &tokens, 2..=2)?;
            let bound = if keyword == "MIN" { Bound::Min } else { Bound::Max };
            let quantity = match tokens[1].to_ascii_uppercase().as_str() {
                "FREQ" => Quantity::Frequency,
                "AMPL" => Quantity::Amplitude,
                "PHASE" => Quantity::Phase,
                other => {
                    return Err(Error::InvalidArgument(format!("{} has no limit '{}'", keyword, other)));
                }
            };
            Ok(Command::Limit { bound, quantity })
        }
        _ => Err(Error::UnknownCommand(first.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(board: u8, channel: u8) -> DeviceKey {
        DeviceKey::new(BoardId::new(board).unwrap(), ChannelId::new(channel).unwrap())
    }

    #[test]
    fn test_output_values() {
        assert_eq!(parse("OUTPUT 1 1 1").unwrap(), Command::Output { key: key(1, 1), enable: Some(true) });
        assert_eq!(parse("output 1 2 0").unwrap(), Command::Output { key: key(1, 2), enable: Some(false) });
        assert_eq!(parse("OUTPUT 1 1 ?").unwrap(), Command::Output { key: key(1, 1), enable: None });
        assert_eq!(parse("OUTPUT 1 1 7").unwrap(), Command::Output { key: key(1, 1), enable: None });
        assert_eq!(parse("OUTPUT 3 2").unwrap(), Command::Output { key: key(3, 2), enable: None });
    }

    #[test]
    fn test_freq_forms() {
        assert_eq!(
            parse("FREQ 2 1 100 MHz").unwrap(),
            Command::Freq { key: key(2, 1), value: Some(100.0), unit: FreqUnit::MHz }
        );
        assert_eq!(
            parse("FREQ 2 1 ? KHZ").unwrap(),
            Command::Freq { key: key(2, 1), value: None, unit: FreqUnit::KHz }
        );
        assert_eq!(
            parse("freq 1 2 hz").unwrap(),
            Command::Freq { key: key(1, 2), value: None, unit: FreqUnit::Hz }
        );
        assert!(matches!(parse("FREQ 2 1 100"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse("FREQ 2 1 abc MHZ"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse("FREQ 2 1 100 GHZ"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_ampl_non_integer_is_query() {
        assert_eq!(parse("AMPL 3 2 512").unwrap(), Command::Ampl { key: key(3, 2), value: Some(512) });
        assert_eq!(parse("AMPL 3 2 -1").unwrap(), Command::Ampl { key: key(3, 2), value: Some(-1) });
        assert_eq!(parse("AMPL 3 2 ?").unwrap(), Command::Ampl { key: key(3, 2), value: None });
        assert_eq!(parse("AMPL 3 2 1.5").unwrap(), Command::Ampl { key: key(3, 2), value: None });
    }

    #[test]
    fn test_phase() {
        assert_eq!(parse("PHASE 1 1 45.5").unwrap(), Command::Phase { key: key(1, 1), value: Some(45.5) });
        assert_eq!(parse("PHASE 1 1 ?").unwrap(), Command::Phase { key: key(1, 1), value: None });
        assert_eq!(parse("PHASE 1 1").unwrap(), Command::Phase { key: key(1, 1), value: None });
        assert!(matches!(parse("PHASE 1 1 ninety"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_limits() {
        assert_eq!(
            parse("MIN FREQ").unwrap(),
            Command::Limit { bound: Bound::Min, quantity: Quantity::Frequency }
        );
        assert_eq!(
            parse("max phase").unwrap(),
            Command::Limit { bound: Bound::Max, quantity: Quantity::Phase }
        );
        assert!(matches!(parse("MAX POWER"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse("MIN"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_addressing_errors() {
        assert!(matches!(parse("OUTPUT 4 1 1"), Err(Error::InvalidBoard(_))));
        assert!(matches!(parse("OUTPUT 1 3 1"), Err(Error::InvalidChannel(_))));
        assert!(matches!(parse("AMPL x 1"), Err(Error::InvalidBoard(_))));
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert!(matches!(parse("SWEEP 1 1"), Err(Error::UnknownCommand(_))));
        assert!(matches!(parse(""), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse("OUTPUT 1"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse("RESET 1 1 1"), Err(Error::InvalidArgument(_))));
    }
}
