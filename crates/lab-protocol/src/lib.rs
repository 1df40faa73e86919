#![deny(warnings)]

//! Line protocol between the game referee and the bot.
//!
//! The referee sends an initial block of science projects, then one record
//! per turn: both robots, the molecules left at the station and every
//! sample in play. The bot answers each record with one command line.

use lab_core::{
    validate_snapshot, ChemicalSet, Command, CoreError, Health, Holder, Molecule, Rank, RobotState,
    Sample, Snapshot, Station,
};
use std::io::{self, BufRead, Write};
use std::str::{FromStr, SplitWhitespace};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Errors raised while reading protocol records.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Input ended in the middle of a record.
    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),
    /// A line had fewer tokens than its record requires.
    #[error("line {line}: missing field {field}")]
    MissingField { line: usize, field: &'static str },
    /// A token that should be an integer is not.
    #[error("line {line}: invalid value {value:?} for {field}")]
    InvalidInteger {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The record parsed but breaks a domain invariant.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ProtocolError {
    /// The offending token when the record named a station we do not know.
    pub fn unknown_station(&self) -> Option<&str> {
        match self {
            ProtocolError::Core(CoreError::UnknownStation(token)) => Some(token.as_str()),
            _ => None,
        }
    }
}

/// One fully read turn record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    /// What the policy engine gets to see.
    pub snapshot: Snapshot,
    /// The opponent's robot, kept for logging only.
    pub opponent: Opponent,
}

/// Visible state of the opponent's robot. Never reaches the policy engine,
/// so a station token we do not recognise is kept as `None` instead of
/// failing the turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Opponent {
    pub station: Option<Station>,
    pub eta: u32,
    pub score: i32,
}

struct Fields<'a> {
    tokens: SplitWhitespace<'a>,
    line: usize,
}

impl<'a> Fields<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        Self {
            tokens: text.split_whitespace(),
            line,
        }
    }

    fn token(&mut self, field: &'static str) -> Result<&'a str, ProtocolError> {
        self.tokens.next().ok_or(ProtocolError::MissingField {
            line: self.line,
            field,
        })
    }

    fn int<T: FromStr>(&mut self, field: &'static str) -> Result<T, ProtocolError> {
        let token = self.token(field)?;
        token.parse().map_err(|_| ProtocolError::InvalidInteger {
            line: self.line,
            field,
            value: token.to_string(),
        })
    }

    fn chemicals(&mut self, field: &'static str) -> Result<ChemicalSet, ProtocolError> {
        Ok(ChemicalSet::new(
            self.int(field)?,
            self.int(field)?,
            self.int(field)?,
            self.int(field)?,
            self.int(field)?,
        ))
    }
}

/// Robot line with its station still unchecked, so a bad token does not
/// stop the rest of the record from being consumed.
struct RawRobot {
    station: String,
    eta: u32,
    score: i32,
    storage: ChemicalSet,
    expertise: ChemicalSet,
}

impl RawRobot {
    fn parse(line: &str, line_no: usize) -> Result<Self, ProtocolError> {
        let mut fields = Fields::new(line, line_no);
        Ok(RawRobot {
            station: fields.token("target")?.to_string(),
            eta: fields.int("eta")?,
            score: fields.int("score")?,
            storage: fields.chemicals("storage")?,
            expertise: fields.chemicals("expertise")?,
        })
    }

    fn into_opponent(self) -> Opponent {
        let station = self.station.parse::<Station>().ok();
        if station.is_none() {
            warn!(token = %self.station, "unknown opponent station");
        }
        Opponent {
            station,
            eta: self.eta,
            score: self.score,
        }
    }

    fn into_state(self) -> Result<RobotState, CoreError> {
        Ok(RobotState {
            station: self.station.parse::<Station>()?,
            eta: self.eta,
            score: self.score,
            storage: self.storage,
            expertise: self.expertise,
        })
    }
}

/// Reads protocol records from any buffered input.
pub struct ProtocolReader<R> {
    input: R,
    line_no: usize,
}

impl<R: BufRead> ProtocolReader<R> {
    pub fn new(input: R) -> Self {
        Self { input, line_no: 0 }
    }

    /// Next line, or `None` at end of input.
    fn next_line(&mut self) -> Result<Option<String>, ProtocolError> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        trace!(line_no = self.line_no, line = line.trim_end(), "read");
        Ok(Some(line))
    }

    fn require_line(&mut self, what: &'static str) -> Result<String, ProtocolError> {
        self.next_line()?.ok_or(ProtocolError::UnexpectedEof(what))
    }

    /// Initial block: a count, then one line of five expertise targets per
    /// science project.
    pub fn read_projects(&mut self) -> Result<Vec<ChemicalSet>, ProtocolError> {
        let line = self.require_line("project count")?;
        let count: usize = Fields::new(&line, self.line_no).int("project count")?;
        let mut projects = Vec::with_capacity(count);
        for _ in 0..count {
            let line = self.require_line("project")?;
            projects.push(Fields::new(&line, self.line_no).chemicals("project")?);
        }
        Ok(projects)
    }

    fn read_robot(&mut self, what: &'static str) -> Result<RawRobot, ProtocolError> {
        let line = self.require_line(what)?;
        RawRobot::parse(&line, self.line_no)
    }

    fn read_sample(&mut self) -> Result<Sample, ProtocolError> {
        let line = self.require_line("sample")?;
        let mut fields = Fields::new(&line, self.line_no);
        let id = fields.int("sample id")?;
        let holder = Holder::from_wire(fields.int("carried by")?)?;
        let rank = Rank::from_tier(fields.int("rank")?)?;
        let expertise_gain = fields
            .token("expertise gain")?
            .chars()
            .next()
            .and_then(Molecule::from_char);
        let health = Health::from_wire(fields.int("health")?);
        let cost = fields.chemicals("cost")?;
        Ok(Sample {
            id,
            holder,
            rank,
            expertise_gain,
            health,
            cost,
        })
    }

    /// Read one turn record. `Ok(None)` means input ended cleanly between
    /// turns.
    ///
    /// The whole record is consumed before our station token is checked,
    /// so an unknown station leaves the reader positioned at the next turn.
    /// The opponent's station is only logged when unknown.
    pub fn read_turn(&mut self) -> Result<Option<Turn>, ProtocolError> {
        let line = loop {
            match self.next_line()? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line,
            }
        };
        let me = RawRobot::parse(&line, self.line_no)?;
        let opponent = self.read_robot("opponent robot")?;

        let line = self.require_line("available molecules")?;
        let available = Fields::new(&line, self.line_no).chemicals("available")?;

        let line = self.require_line("sample count")?;
        let count: usize = Fields::new(&line, self.line_no).int("sample count")?;
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            samples.push(self.read_sample()?);
        }

        let snapshot = Snapshot {
            robot: me.into_state()?,
            available,
            samples,
        };
        let opponent = opponent.into_opponent();
        validate_snapshot(&snapshot)?;
        debug!(
            station = %snapshot.robot.station,
            eta = snapshot.robot.eta,
            score = snapshot.robot.score,
            opponent_score = opponent.score,
            samples = snapshot.samples.len(),
            "turn read"
        );
        Ok(Some(Turn { snapshot, opponent }))
    }
}

/// Write one command line and flush it to the referee.
pub fn write_command<W: Write>(out: &mut W, command: &Command) -> io::Result<()> {
    writeln!(out, "{}", command)?;
    out.flush()
}
