#![deny(warnings)]

//! Greedy per-station policy for the laboratory bot.
//!
//! [`decide`] maps one turn's [`Snapshot`] to exactly one [`Command`]. It
//! keeps no state between turns: the station the robot stands at selects a
//! handler and the handler reads everything else from the snapshot.

use lab_core::{
    ChemicalSet, Command, ConnectTarget, Rank, Sample, Snapshot, Station, MOLECULE_CAPACITY,
    SAMPLE_CARRY_LIMIT,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Tunables of the policy. Defaults are the game's own limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Samples the robot may carry at once.
    pub sample_carry_limit: usize,
    /// Molecules the robot may carry at once.
    pub molecule_capacity: i32,
    /// Rank requested at the sample station and sought in the cloud.
    pub target_rank: Rank,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            sample_carry_limit: SAMPLE_CARRY_LIMIT,
            molecule_capacity: MOLECULE_CAPACITY,
            target_rank: Rank::High,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid policy config: {0}")]
    Invalid(String),
}

impl PolicyConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PolicyConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_carry_limit == 0 {
            return Err(ConfigError::Invalid(
                "sample_carry_limit must be > 0".to_string(),
            ));
        }
        if self.molecule_capacity <= 0 {
            return Err(ConfigError::Invalid(
                "molecule_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Choose this turn's command.
pub fn decide(snapshot: &Snapshot, config: &PolicyConfig) -> Command {
    let command = match snapshot.robot.station {
        Station::Start => Command::Goto(Station::Samples),
        Station::Samples => sample_station(snapshot, config),
        Station::Diagnosis => diagnosis_station(snapshot, config),
        Station::Molecules => molecule_station(snapshot, config),
        Station::Laboratory => laboratory_station(snapshot, config),
    };
    debug!(station = %snapshot.robot.station, %command, "decided");
    command
}

/// Stable sort, best health first; undiagnosed samples end up last.
fn by_descending_health<'a>(samples: impl Iterator<Item = &'a Sample>) -> Vec<&'a Sample> {
    let mut sorted: Vec<&Sample> = samples.collect();
    sorted.sort_by(|a, b| b.health.cmp(&a.health));
    sorted
}

fn worth_claiming(sample: &Sample, config: &PolicyConfig) -> bool {
    sample.rank == config.target_rank && sample.cost.count() <= config.molecule_capacity
}

fn sample_station(snapshot: &Snapshot, config: &PolicyConfig) -> Command {
    let held = snapshot.held().count();
    let claimable = snapshot
        .cloud()
        .filter(|s| worth_claiming(s, config))
        .count();
    debug!(held, claimable, "sample station");
    if held == config.sample_carry_limit || held + claimable >= config.sample_carry_limit {
        return Command::Goto(Station::Diagnosis);
    }
    Command::Connect(ConnectTarget::ClaimByRank(config.target_rank))
}

fn diagnosis_station(snapshot: &Snapshot, config: &PolicyConfig) -> Command {
    let held: Vec<&Sample> = snapshot.held().collect();

    if held.len() < config.sample_carry_limit {
        let cloud = by_descending_health(snapshot.cloud().filter(|s| worth_claiming(s, config)));
        if let Some(best) = cloud.first() {
            debug!(id = best.id, "claiming from cloud");
            return Command::Connect(ConnectTarget::TargetById(best.id));
        }
    }

    // Impossible samples go back before anything new is diagnosed.
    if let Some(impossible) = held
        .iter()
        .find(|s| s.health.is_diagnosed() && s.cost.count() > config.molecule_capacity)
    {
        debug!(id = impossible.id, cost = %impossible.cost, "dropping impossible sample");
        return Command::Connect(ConnectTarget::TargetById(impossible.id));
    }

    if let Some(undiagnosed) = held.iter().find(|s| !s.health.is_diagnosed()) {
        return Command::Connect(ConnectTarget::TargetById(undiagnosed.id));
    }

    if held.len() <= config.sample_carry_limit / 3 {
        Command::Goto(Station::Samples)
    } else {
        Command::Goto(Station::Molecules)
    }
}

fn molecule_station(snapshot: &Snapshot, config: &PolicyConfig) -> Command {
    let storage = snapshot.robot.storage;
    let mut scratch = storage;
    let mut missing = Vec::new();
    for sample in by_descending_health(snapshot.held()) {
        if !sample
            .cost
            .can_be_finished_with(scratch, config.molecule_capacity)
        {
            continue;
        }
        scratch = scratch - sample.cost;
        missing.extend(scratch.list_missing());
    }
    debug!(held = storage.count(), missing = missing.len(), "molecule station");

    if storage.count() >= config.molecule_capacity {
        return Command::Goto(Station::Laboratory);
    }
    match missing.first() {
        Some(&molecule) => Command::Connect(ConnectTarget::Molecule(molecule)),
        None => Command::Goto(Station::Laboratory),
    }
}

fn laboratory_station(snapshot: &Snapshot, _config: &PolicyConfig) -> Command {
    let storage: ChemicalSet = snapshot.robot.storage;
    let held = by_descending_health(snapshot.held());
    if let Some(ready) = held.iter().find(|s| (s.cost - storage).is_not_positive()) {
        return Command::Connect(ConnectTarget::TargetById(ready.id));
    }
    if held.is_empty() {
        Command::Goto(Station::Samples)
    } else {
        Command::Goto(Station::Molecules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_core::{Health, Holder, RobotState};
    use proptest::prelude::*;

    fn sample(id: u32, holder: Holder, health: i32, cost: ChemicalSet) -> Sample {
        Sample {
            id,
            holder,
            rank: Rank::High,
            expertise_gain: None,
            health: Health::from_wire(health),
            cost,
        }
    }

    fn at(station: Station, storage: ChemicalSet, samples: Vec<Sample>) -> Snapshot {
        Snapshot {
            robot: RobotState {
                station,
                eta: 0,
                score: 0,
                storage,
                expertise: ChemicalSet::ZERO,
            },
            available: ChemicalSet::new(6, 6, 6, 6, 6),
            samples,
        }
    }

    fn cheap() -> ChemicalSet {
        ChemicalSet::new(2, 2, 0, 0, 1)
    }

    fn decide_default(snapshot: &Snapshot) -> String {
        decide(snapshot, &PolicyConfig::default()).to_string()
    }

    #[test]
    fn spawn_heads_to_samples() {
        let snap = at(Station::Start, ChemicalSet::ZERO, vec![]);
        assert_eq!(decide_default(&snap), "GOTO SAMPLES");
    }

    #[test]
    fn sample_station_requests_top_rank() {
        let snap = at(Station::Samples, ChemicalSet::ZERO, vec![]);
        assert_eq!(decide_default(&snap), "CONNECT 3");
    }

    #[test]
    fn sample_station_is_pure() {
        let snap = at(
            Station::Samples,
            ChemicalSet::ZERO,
            vec![sample(1, Holder::Me, -1, cheap())],
        );
        let config = PolicyConfig::default();
        assert_eq!(decide(&snap, &config), decide(&snap, &config));
    }

    #[test]
    fn sample_station_leaves_when_full() {
        let held = (0..3).map(|id| sample(id, Holder::Me, -1, cheap())).collect();
        let snap = at(Station::Samples, ChemicalSet::ZERO, held);
        assert_eq!(decide_default(&snap), "GOTO DIAGNOSIS");
    }

    #[test]
    fn sample_station_leaves_when_cloud_fills_the_gap() {
        let snap = at(
            Station::Samples,
            ChemicalSet::ZERO,
            vec![
                sample(1, Holder::Me, -1, cheap()),
                sample(2, Holder::Cloud, 30, cheap()),
                sample(3, Holder::Cloud, 40, cheap()),
            ],
        );
        assert_eq!(decide_default(&snap), "GOTO DIAGNOSIS");
    }

    #[test]
    fn sample_station_ignores_weak_or_expensive_cloud() {
        let mut weak = sample(2, Holder::Cloud, 10, cheap());
        weak.rank = Rank::Medium;
        let expensive = sample(3, Holder::Cloud, 50, ChemicalSet::new(7, 0, 0, 0, 4));
        let snap = at(
            Station::Samples,
            ChemicalSet::ZERO,
            vec![sample(1, Holder::Me, -1, cheap()), weak, expensive],
        );
        assert_eq!(decide_default(&snap), "CONNECT 3");
    }

    #[test]
    fn diagnosis_diagnoses_held_sample() {
        let snap = at(
            Station::Diagnosis,
            ChemicalSet::ZERO,
            vec![sample(7, Holder::Me, -1, ChemicalSet::new(-1, -1, -1, -1, -1))],
        );
        assert_eq!(decide_default(&snap), "CONNECT 7");
    }

    #[test]
    fn diagnosis_claims_best_cloud_sample_first() {
        let snap = at(
            Station::Diagnosis,
            ChemicalSet::ZERO,
            vec![
                sample(1, Holder::Me, -1, cheap()),
                sample(4, Holder::Cloud, 10, cheap()),
                sample(5, Holder::Cloud, 30, cheap()),
                sample(6, Holder::Opponent, 50, cheap()),
            ],
        );
        assert_eq!(decide_default(&snap), "CONNECT 5");
    }

    #[test]
    fn diagnosis_drops_impossible_before_diagnosing() {
        let snap = at(
            Station::Diagnosis,
            ChemicalSet::ZERO,
            vec![
                sample(1, Holder::Me, 20, cheap()),
                sample(2, Holder::Me, 40, ChemicalSet::new(5, 0, 0, 6, 0)),
                sample(3, Holder::Me, -1, cheap()),
                sample(9, Holder::Cloud, 30, cheap()),
            ],
        );
        assert_eq!(decide_default(&snap), "CONNECT 2");
    }

    #[test]
    fn diagnosis_moves_on_once_everything_is_known() {
        let one = at(
            Station::Diagnosis,
            ChemicalSet::ZERO,
            vec![sample(1, Holder::Me, 20, cheap())],
        );
        assert_eq!(decide_default(&one), "GOTO SAMPLES");

        let two = at(
            Station::Diagnosis,
            ChemicalSet::ZERO,
            vec![
                sample(1, Holder::Me, 20, cheap()),
                sample(2, Holder::Me, 10, cheap()),
            ],
        );
        assert_eq!(decide_default(&two), "GOTO MOLECULES");
    }

    #[test]
    fn molecules_full_storage_goes_to_lab() {
        let snap = at(
            Station::Molecules,
            ChemicalSet::new(2, 2, 2, 2, 2),
            vec![sample(1, Holder::Me, 20, ChemicalSet::new(0, 0, 0, 0, 5))],
        );
        assert_eq!(decide_default(&snap), "GOTO LABORATORY");
    }

    #[test]
    fn molecules_draws_first_missing_unit() {
        let snap = at(
            Station::Molecules,
            ChemicalSet::new(1, 0, 0, 0, 0),
            vec![sample(1, Holder::Me, 20, ChemicalSet::new(2, 0, 1, 0, 0))],
        );
        assert_eq!(decide_default(&snap), "CONNECT A");
    }

    #[test]
    fn molecules_serves_healthiest_sample_first() {
        let snap = at(
            Station::Molecules,
            ChemicalSet::ZERO,
            vec![
                sample(1, Holder::Me, 10, ChemicalSet::new(0, 2, 0, 0, 0)),
                sample(2, Holder::Me, 30, ChemicalSet::new(0, 0, 0, 0, 1)),
            ],
        );
        assert_eq!(decide_default(&snap), "CONNECT E");
    }

    #[test]
    fn molecules_moves_on_when_covered() {
        let snap = at(
            Station::Molecules,
            ChemicalSet::new(2, 2, 0, 0, 1),
            vec![sample(1, Holder::Me, 20, cheap())],
        );
        assert_eq!(decide_default(&snap), "GOTO LABORATORY");
    }

    #[test]
    fn molecules_running_scratch_counts_units_already_spoken_for() {
        let snap = at(
            Station::Molecules,
            ChemicalSet::new(2, 0, 0, 0, 0),
            vec![
                sample(1, Holder::Me, 30, ChemicalSet::new(2, 0, 0, 0, 0)),
                sample(2, Holder::Me, 10, ChemicalSet::new(2, 0, 0, 0, 0)),
            ],
        );
        assert_eq!(decide_default(&snap), "CONNECT A");
    }

    #[test]
    fn molecules_skips_samples_that_cannot_fit() {
        let snap = at(
            Station::Molecules,
            ChemicalSet::new(0, 3, 0, 0, 0),
            vec![
                sample(1, Holder::Me, 50, ChemicalSet::new(0, 0, 0, 0, 9)),
                sample(2, Holder::Me, 10, ChemicalSet::new(0, 3, 1, 0, 0)),
            ],
        );
        assert_eq!(decide_default(&snap), "CONNECT C");
    }

    #[test]
    fn laboratory_cures_affordable_sample() {
        let snap = at(
            Station::Laboratory,
            ChemicalSet::new(2, 1, 0, 0, 0),
            vec![sample(8, Holder::Me, 10, ChemicalSet::new(2, 0, 0, 0, 0))],
        );
        assert_eq!(decide_default(&snap), "CONNECT 8");
    }

    #[test]
    fn laboratory_prefers_healthier_sample() {
        let snap = at(
            Station::Laboratory,
            ChemicalSet::new(2, 2, 0, 0, 0),
            vec![
                sample(1, Holder::Me, 10, ChemicalSet::new(1, 0, 0, 0, 0)),
                sample(2, Holder::Me, 40, ChemicalSet::new(0, 2, 0, 0, 0)),
            ],
        );
        assert_eq!(decide_default(&snap), "CONNECT 2");
    }

    #[test]
    fn laboratory_falls_back_by_holdings() {
        let short = at(
            Station::Laboratory,
            ChemicalSet::ZERO,
            vec![sample(1, Holder::Me, 10, cheap())],
        );
        assert_eq!(decide_default(&short), "GOTO MOLECULES");

        let empty = at(Station::Laboratory, ChemicalSet::ZERO, vec![]);
        assert_eq!(decide_default(&empty), "GOTO SAMPLES");
    }

    #[test]
    fn config_from_partial_yaml_keeps_defaults() {
        let config = PolicyConfig::from_yaml_str("target_rank: Medium\n").unwrap();
        assert_eq!(config.target_rank, Rank::Medium);
        assert_eq!(config.sample_carry_limit, SAMPLE_CARRY_LIMIT);
        assert_eq!(config.molecule_capacity, MOLECULE_CAPACITY);

        let snap = at(Station::Samples, ChemicalSet::ZERO, vec![]);
        assert_eq!(decide(&snap, &config).to_string(), "CONNECT 2");
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config =
            PolicyConfig::from_yaml_str(include_str!("../../../apps/bot/policy.yaml")).unwrap();
        assert_eq!(config, PolicyConfig::default());
    }

    #[test]
    fn config_rejects_zero_limits() {
        assert!(PolicyConfig::from_yaml_str("sample_carry_limit: 0\n").is_err());
        assert!(PolicyConfig::from_yaml_str("molecule_capacity: 0\n").is_err());
    }

    proptest! {
        #[test]
        fn full_storage_always_heads_to_lab(a in 0i32..=10, health in -1i32..90) {
            let storage = ChemicalSet::new(a, 10 - a, 0, 0, 0);
            let snap = at(
                Station::Molecules,
                storage,
                vec![sample(1, Holder::Me, health, ChemicalSet::new(0, 0, 3, 3, 0))],
            );
            prop_assert_eq!(decide_default(&snap), "GOTO LABORATORY");
        }

        #[test]
        fn molecule_draws_target_a_real_deficit(c in 0i32..=4, d in 0i32..=4, e in 0i32..=2) {
            let cost = ChemicalSet::new(0, 0, c, d, e);
            let snap = at(Station::Molecules, ChemicalSet::ZERO, vec![sample(1, Holder::Me, 20, cost)]);
            match decide(&snap, &PolicyConfig::default()) {
                Command::Connect(ConnectTarget::Molecule(m)) => prop_assert!(cost.get(m) > 0),
                Command::Goto(station) => {
                    prop_assert_eq!(station, Station::Laboratory);
                    prop_assert_eq!(cost.count(), 0);
                }
                other => prop_assert!(false, "unexpected command {:?}", other),
            }
        }
    }
}
