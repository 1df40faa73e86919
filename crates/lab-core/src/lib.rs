#![deny(warnings)]

//! Core domain models and invariants for the laboratory bot.
//!
//! This crate defines the value types shared by the policy engine and the
//! transport layer: molecule sets, samples, stations, per-turn snapshots and
//! the commands a robot can issue, with validation helpers for the basic
//! invariants of a well-formed turn.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of samples a robot can carry at once.
pub const SAMPLE_CARRY_LIMIT: usize = 3;
/// Maximum number of molecules a robot can carry at once.
pub const MOLECULE_CAPACITY: i32 = 10;

/// Errors raised when wire values or snapshots break domain invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Station token outside the fixed set of stations.
    #[error("unknown station: {0}")]
    UnknownStation(String),
    /// Holder code other than 0, 1 or -1.
    #[error("unknown sample holder code: {0}")]
    UnknownHolder(i32),
    /// Rank tier outside [1, 3].
    #[error("unknown sample rank: {0}")]
    UnknownRank(i32),
    /// Inventory-like quantities must never be negative.
    #[error("negative quantity in {0}")]
    NegativeQuantity(&'static str),
    /// Two samples in one snapshot share an id.
    #[error("duplicate sample id: {0}")]
    DuplicateSample(u32),
}

/// One of the five molecule kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Molecule {
    A,
    B,
    C,
    D,
    E,
}

impl Molecule {
    /// All kinds in wire order.
    pub const ALL: [Molecule; 5] = [Molecule::A, Molecule::B, Molecule::C, Molecule::D, Molecule::E];

    pub fn as_char(self) -> char {
        match self {
            Molecule::A => 'A',
            Molecule::B => 'B',
            Molecule::C => 'C',
            Molecule::D => 'D',
            Molecule::E => 'E',
        }
    }

    /// Parse a molecule letter; anything else (the game sends `0` for
    /// "no expertise gain") yields `None`.
    pub fn from_char(letter: char) -> Option<Self> {
        match letter {
            'A' => Some(Molecule::A),
            'B' => Some(Molecule::B),
            'C' => Some(Molecule::C),
            'D' => Some(Molecule::D),
            'E' => Some(Molecule::E),
            _ => None,
        }
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Quantities of the five molecule kinds.
///
/// Fields are signed: subtracting a cost from an inventory leaves negative
/// fields for the units still missing. Nothing is clamped. The type is
/// `Copy`, so every operation works on its own value and scratch
/// computations never leak into a caller's inventory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChemicalSet {
    pub a: i32,
    pub b: i32,
    pub c: i32,
    pub d: i32,
    pub e: i32,
}

impl ChemicalSet {
    pub const ZERO: ChemicalSet = ChemicalSet::new(0, 0, 0, 0, 0);

    pub const fn new(a: i32, b: i32, c: i32, d: i32, e: i32) -> Self {
        Self { a, b, c, d, e }
    }

    /// A set holding one unit of `letter`, or the empty set for an unknown letter.
    pub fn from_letter(letter: char) -> Self {
        let mut set = Self::ZERO;
        if let Some(molecule) = Molecule::from_char(letter) {
            *set.field_mut(molecule) = 1;
        }
        set
    }

    pub fn get(&self, molecule: Molecule) -> i32 {
        match molecule {
            Molecule::A => self.a,
            Molecule::B => self.b,
            Molecule::C => self.c,
            Molecule::D => self.d,
            Molecule::E => self.e,
        }
    }

    fn field_mut(&mut self, molecule: Molecule) -> &mut i32 {
        match molecule {
            Molecule::A => &mut self.a,
            Molecule::B => &mut self.b,
            Molecule::C => &mut self.c,
            Molecule::D => &mut self.d,
            Molecule::E => &mut self.e,
        }
    }

    /// Sum of all fields. Negative when the set describes a deficit.
    pub fn count(&self) -> i32 {
        self.a + self.b + self.c + self.d + self.e
    }

    /// True iff every field is <= 0.
    pub fn is_not_positive(&self) -> bool {
        Molecule::ALL.iter().all(|&m| self.get(m) <= 0)
    }

    /// True iff some field is < 0.
    pub fn has_deficit(&self) -> bool {
        Molecule::ALL.iter().any(|&m| self.get(m) < 0)
    }

    /// Walk every negative field up to zero, emitting one marker per unit.
    ///
    /// Markers come out grouped in A..E order, so all missing `A` units
    /// precede any `B`. Leaves `self` with no negative field.
    pub fn list_missing(&mut self) -> Vec<Molecule> {
        let mut missing = Vec::new();
        for molecule in Molecule::ALL {
            let field = self.field_mut(molecule);
            while *field < 0 {
                missing.push(molecule);
                *field += 1;
            }
        }
        missing
    }

    /// Whether `inventory` has enough free slots to absorb the draws still
    /// needed to cover this cost.
    ///
    /// Free space is measured against the inventory as it is now, not as it
    /// would be after paying the cost.
    pub fn can_be_finished_with(&self, inventory: ChemicalSet, capacity: i32) -> bool {
        let mut scratch = inventory - *self;
        let missing = scratch.list_missing().len();
        let free = capacity - inventory.count();
        i32::try_from(missing).is_ok_and(|missing| missing <= free)
    }
}

impl Add for ChemicalSet {
    type Output = ChemicalSet;

    fn add(self, other: ChemicalSet) -> ChemicalSet {
        ChemicalSet {
            a: self.a + other.a,
            b: self.b + other.b,
            c: self.c + other.c,
            d: self.d + other.d,
            e: self.e + other.e,
        }
    }
}

impl Sub for ChemicalSet {
    type Output = ChemicalSet;

    fn sub(self, other: ChemicalSet) -> ChemicalSet {
        ChemicalSet {
            a: self.a - other.a,
            b: self.b - other.b,
            c: self.c - other.c,
            d: self.d - other.d,
            e: self.e - other.e,
        }
    }
}

impl fmt::Display for ChemicalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A:{} B:{} C:{} D:{} E:{}",
            self.a, self.b, self.c, self.d, self.e
        )
    }
}

/// Fixed locations a robot can stand at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Station {
    /// Initial spawn point; the robot only leaves it.
    Start,
    /// Hands out undiagnosed samples by rank.
    Samples,
    /// Diagnoses held samples, trades samples with the cloud.
    Diagnosis,
    /// Dispenses molecules one unit at a time.
    Molecules,
    /// Turns a held sample plus its molecules into score.
    Laboratory,
}

impl Station {
    pub fn token(self) -> &'static str {
        match self {
            Station::Start => "START_POS",
            Station::Samples => "SAMPLES",
            Station::Diagnosis => "DIAGNOSIS",
            Station::Molecules => "MOLECULES",
            Station::Laboratory => "LABORATORY",
        }
    }
}

impl FromStr for Station {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START_POS" => Ok(Station::Start),
            "SAMPLES" => Ok(Station::Samples),
            "DIAGNOSIS" => Ok(Station::Diagnosis),
            "MOLECULES" => Ok(Station::Molecules),
            "LABORATORY" => Ok(Station::Laboratory),
            other => Err(CoreError::UnknownStation(other.to_string())),
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Who currently holds a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Holder {
    /// Carried by our robot.
    Me,
    /// Carried by the opponent.
    Opponent,
    /// Unclaimed, stored in the cloud.
    Cloud,
}

impl Holder {
    pub fn from_wire(code: i32) -> Result<Self, CoreError> {
        match code {
            0 => Ok(Holder::Me),
            1 => Ok(Holder::Opponent),
            -1 => Ok(Holder::Cloud),
            other => Err(CoreError::UnknownHolder(other)),
        }
    }
}

/// Value class of a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Low,
    Medium,
    High,
}

impl Rank {
    pub fn tier(self) -> u8 {
        match self {
            Rank::Low => 1,
            Rank::Medium => 2,
            Rank::High => 3,
        }
    }

    pub fn from_tier(tier: i32) -> Result<Self, CoreError> {
        match tier {
            1 => Ok(Rank::Low),
            2 => Ok(Rank::Medium),
            3 => Ok(Rank::High),
            other => Err(CoreError::UnknownRank(other)),
        }
    }
}

/// Health reward of a sample; only revealed by diagnosis.
///
/// `Undiagnosed` orders below every diagnosed value, so sorting by
/// descending health puts undiagnosed samples last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Health {
    Undiagnosed,
    Diagnosed(u32),
}

impl Health {
    /// The game sends -1 for an undiagnosed sample.
    pub fn from_wire(value: i32) -> Self {
        u32::try_from(value).map_or(Health::Undiagnosed, Health::Diagnosed)
    }

    pub fn is_diagnosed(self) -> bool {
        matches!(self, Health::Diagnosed(_))
    }
}

/// A diagnostic task: cure it with the right molecules to earn its health.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Stable id, used to target the sample in `CONNECT`.
    pub id: u32,
    /// Current holder.
    pub holder: Holder,
    /// Rank tier.
    pub rank: Rank,
    /// Expertise granted once cured, if any.
    pub expertise_gain: Option<Molecule>,
    /// Health reward.
    pub health: Health,
    /// Molecules required to cure. Meaningful once diagnosed.
    pub cost: ChemicalSet,
}

/// Visible state of one robot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotState {
    /// Station the robot is at or travelling to.
    pub station: Station,
    /// Turns until arrival; 0 once there.
    pub eta: u32,
    /// Health points scored so far.
    pub score: i32,
    /// Molecules carried.
    pub storage: ChemicalSet,
    /// Expertise accumulated from cured samples.
    pub expertise: ChemicalSet,
}

/// Everything the policy engine sees on one turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Our robot.
    pub robot: RobotState,
    /// Molecules left at the molecule station.
    pub available: ChemicalSet,
    /// Every sample in play, whatever its holder.
    pub samples: Vec<Sample>,
}

impl Snapshot {
    /// Samples carried by our robot.
    pub fn held(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter().filter(|s| s.holder == Holder::Me)
    }

    /// Unclaimed samples waiting in the cloud.
    pub fn cloud(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter().filter(|s| s.holder == Holder::Cloud)
    }
}

/// What a `CONNECT` addresses at the current station.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectTarget {
    /// Ask the sample station for a fresh sample of this rank.
    ClaimByRank(Rank),
    /// A specific sample, by id.
    TargetById(u32),
    /// One unit of a molecule.
    Molecule(Molecule),
}

/// The single command issued per turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Goto(Station),
    Connect(ConnectTarget),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Goto(station) => write!(f, "GOTO {}", station),
            Command::Connect(ConnectTarget::ClaimByRank(rank)) => {
                write!(f, "CONNECT {}", rank.tier())
            }
            Command::Connect(ConnectTarget::TargetById(id)) => write!(f, "CONNECT {}", id),
            Command::Connect(ConnectTarget::Molecule(molecule)) => {
                write!(f, "CONNECT {}", molecule)
            }
        }
    }
}

fn validate_quantities(set: &ChemicalSet, what: &'static str) -> Result<(), CoreError> {
    if set.has_deficit() {
        return Err(CoreError::NegativeQuantity(what));
    }
    Ok(())
}

/// Validate a snapshot before it reaches the policy engine.
pub fn validate_snapshot(snapshot: &Snapshot) -> Result<(), CoreError> {
    validate_quantities(&snapshot.robot.storage, "storage")?;
    validate_quantities(&snapshot.robot.expertise, "expertise")?;
    validate_quantities(&snapshot.available, "available")?;
    let mut ids = BTreeSet::new();
    for sample in &snapshot.samples {
        if !ids.insert(sample.id) {
            return Err(CoreError::DuplicateSample(sample.id));
        }
    }
    Ok(())
}
