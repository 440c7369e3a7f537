//! Replay sequence catalog
//!
//! Sequences are fixed at startup: the built-in set plus any defined in the
//! config file. Nothing mutates the catalog afterwards.

use crate::config::ReplaySequenceConfig;
use crate::core::types::Coords;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::time::Duration;

/// One move and the pause that follows it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayStep {
    pub coords: Coords,
    pub delay: Duration,
}

/// Named, ordered list of steps
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySequence {
    pub name: String,
    pub steps: Vec<ReplayStep>,
}

impl ReplaySequence {
    fn from_table(name: &str, table: &[(Coords, u64)]) -> Self {
        Self {
            name: name.to_string(),
            steps: table
                .iter()
                .map(|&(coords, delay_ms)| ReplayStep {
                    coords,
                    delay: Duration::from_millis(delay_ms),
                })
                .collect(),
        }
    }

    /// Sum of all step delays
    pub fn total_delay(&self) -> Duration {
        self.steps.iter().map(|s| s.delay).sum()
    }
}

/// Pick three fruits off the vine and drop each in the basket
const HARVEST: [(Coords, u64); 22] = [
    // Fruit 1
    ([16.5, 20.5, 3.5, 45.0], 500),
    ([20.0, 24.0, 2.5, 45.0], 400),
    ([19.0, 23.0, 2.5, 40.0], 200),
    ([17.0, 23.0, 6.0, 45.0], 200),
    ([25.5, -16.0, 8.0, 45.0], 800),
    ([25.5, -16.0, 8.0, 90.0], 200),
    ([25.5, -16.0, 10.0, 90.0], 200),
    // Fruit 2
    ([16.5, 20.5, 3.5, 45.0], 500),
    ([20.0, 24.0, 2.5, 45.0], 400),
    ([19.0, 23.0, 2.5, 35.0], 200),
    ([16.0, 22.0, 6.0, 45.0], 200),
    ([28.5, -12.5, 8.0, 45.0], 800),
    ([28.5, -12.5, 8.0, 90.0], 200),
    ([28.5, -12.5, 12.0, 90.0], 200),
    // Fruit 3
    ([16.5, 20.5, 6.0, 45.0], 500),
    ([21.0, 25.0, 5.5, 45.0], 400),
    ([21.0, 25.0, 5.5, 50.0], 200),
    ([16.0, 21.0, 6.0, 45.0], 200),
    ([31.5, -9.5, 6.0, 45.0], 800),
    ([31.5, -9.5, 6.0, 90.0], 200),
    ([31.5, -9.5, 10.0, 90.0], 200),
    // Park
    ([25.0, 0.0, 10.0, 90.0], 200),
];

/// Side-to-side greeting
const WAVE: [(Coords, u64); 8] = [
    ([28.0, -10.0, 15.0, 45.0], 200),
    ([28.0, 0.0, 10.0, 40.0], 200),
    ([28.0, 10.0, 15.0, 45.0], 200),
    ([28.0, 0.0, 10.0, 40.0], 200),
    ([28.0, -10.0, 15.0, 45.0], 200),
    ([28.0, 0.0, 10.0, 40.0], 200),
    ([28.0, 10.0, 15.0, 45.0], 200),
    ([28.0, 0.0, 15.0, 40.0], 200),
];

/// Immutable index → sequence lookup
#[derive(Debug, Clone)]
pub struct ReplayCatalog {
    sequences: BTreeMap<u32, ReplaySequence>,
}

impl ReplayCatalog {
    /// Sequences shipped with the firmware
    pub fn builtin() -> Self {
        let mut sequences = BTreeMap::new();
        sequences.insert(0, ReplaySequence::from_table("harvest", &HARVEST));
        sequences.insert(1, ReplaySequence::from_table("wave", &WAVE));
        Self { sequences }
    }

    /// Built-in sequences plus those from the config file
    ///
    /// A configured index that collides with a built-in one is rejected.
    pub fn with_extra(extra: &[ReplaySequenceConfig]) -> Result<Self> {
        let mut catalog = Self::builtin();
        for seq in extra {
            if catalog.sequences.contains_key(&seq.index) {
                return Err(Error::Config(format!(
                    "replay index {} is reserved by a built-in sequence",
                    seq.index
                )));
            }
            let steps = seq
                .steps
                .iter()
                .map(|step| ReplayStep {
                    coords: step.coords,
                    delay: Duration::from_millis(step.delay_ms),
                })
                .collect();
            catalog.sequences.insert(
                seq.index,
                ReplaySequence {
                    name: seq.name.clone(),
                    steps,
                },
            );
        }
        Ok(catalog)
    }

    pub fn get(&self, index: u32) -> Option<&ReplaySequence> {
        self.sequences.get(&index)
    }

    /// `(index, sequence)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ReplaySequence)> {
        self.sequences.iter().map(|(&i, s)| (i, s))
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

impl Default for ReplayCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplayStepConfig;

    #[test]
    fn test_builtin_harvest() {
        let catalog = ReplayCatalog::builtin();
        let harvest = catalog.get(0).unwrap();
        assert_eq!(harvest.name, "harvest");
        assert_eq!(harvest.steps.len(), 22);
        assert_eq!(harvest.steps[0].coords, [16.5, 20.5, 3.5, 45.0]);
        assert_eq!(harvest.steps[0].delay, Duration::from_millis(500));
        assert_eq!(harvest.steps[21].coords, [25.0, 0.0, 10.0, 90.0]);
        assert_eq!(harvest.total_delay(), Duration::from_millis(7700));
    }

    #[test]
    fn test_unknown_index() {
        let catalog = ReplayCatalog::builtin();
        assert!(catalog.get(99).is_none());
    }

    #[test]
    fn test_effector_within_range() {
        let catalog = ReplayCatalog::builtin();
        for (_, seq) in catalog.iter() {
            for step in &seq.steps {
                assert!((0.0..=90.0).contains(&step.coords[3]));
            }
        }
    }

    #[test]
    fn test_extra_sequences() {
        let extra = vec![ReplaySequenceConfig {
            index: 5,
            name: "nudge".to_string(),
            steps: vec![ReplayStepConfig {
                coords: [1.0, 2.0, 3.0, 4.0],
                delay_ms: 10,
            }],
        }];
        let catalog = ReplayCatalog::with_extra(&extra).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(5).unwrap().steps.len(), 1);
        let indices: Vec<u32> = catalog.iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1, 5]);
    }

    #[test]
    fn test_extra_cannot_replace_builtin() {
        let extra = vec![ReplaySequenceConfig {
            index: 0,
            name: "override".to_string(),
            steps: vec![],
        }];
        assert!(matches!(
            ReplayCatalog::with_extra(&extra),
            Err(Error::Config(_))
        ));
    }
}
