use std::collections::HashMap;

use rand::Rng;
use tracing::trace;

/// Opaque identity of a candidate, shaped like a license plate (`AB-123-CD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::From)]
pub struct CandidateId(String);

impl CandidateId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Draws a random plate: two letters, three digits, two letters.
    pub fn random<R>(rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut plate = String::with_capacity(9);
        push_letters(&mut plate, rng);
        plate.push('-');
        plate.push_str(&format!("{:03}", rng.random_range(0..1000)));
        plate.push('-');
        push_letters(&mut plate, rng);
        Self(plate)
    }
}

fn push_letters<R>(plate: &mut String, rng: &mut R)
where
    R: Rng + ?Sized,
{
    for _ in 0..2 {
        plate.push(char::from(rng.random_range(b'A'..=b'Z')));
    }
}

impl From<&str> for CandidateId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LossEntry {
    pub id: CandidateId,
    pub genome_index: usize,
    /// `None` until the simulator reports a loss
    pub loss: Option<f64>,
}

/// Losses of one generation, ordered by genome index.
///
/// Every genome has exactly one entry and every candidate ID is unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossMap {
    entries: Vec<LossEntry>,
    index: HashMap<CandidateId, usize>,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("candidate {id} is already registered")]
pub struct DuplicateCandidateError {
    pub id: CandidateId,
}

impl LossMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map with a fresh unique ID for each of `size` genomes.
    pub fn for_generation<R>(size: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut map = Self::new();
        while map.len() < size {
            if let Err(DuplicateCandidateError { id }) = map.insert(CandidateId::random(rng)) {
                trace!(%id, "plate already taken, redrawing");
            }
        }
        map
    }

    /// Appends an entry for the next genome index.
    pub fn insert(&mut self, id: CandidateId) -> Result<usize, DuplicateCandidateError> {
        if self.index.contains_key(&id) {
            return Err(DuplicateCandidateError { id });
        }
        let genome_index = self.entries.len();
        self.index.insert(id.clone(), genome_index);
        self.entries.push(LossEntry {
            id,
            genome_index,
            loss: None,
        });
        Ok(genome_index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LossEntry> + '_ {
        self.entries.iter()
    }

    #[must_use]
    pub fn get(&self, id: &CandidateId) -> Option<&LossEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    #[must_use]
    pub fn loss_of_genome(&self, genome_index: usize) -> Option<f64> {
        self.entries.get(genome_index)?.loss
    }

    /// Stores the latest loss of a candidate. Returns its genome index, or `None` for
    /// an unknown ID.
    pub fn record(&mut self, id: &CandidateId, loss: f64) -> Option<usize> {
        let i = *self.index.get(id)?;
        self.entries[i].loss = Some(loss);
        Some(i)
    }

    /// All reported losses, in genome order.
    pub fn resolved_losses(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().filter_map(|entry| entry.loss)
    }

    #[must_use]
    pub fn is_fully_resolved(&self) -> bool {
        self.entries.iter().all(|entry| entry.loss.is_some())
    }

    /// Forgets every reported loss while keeping the IDs.
    pub fn clear_losses(&mut self) {
        for entry in &mut self.entries {
            entry.loss = None;
        }
    }

    /// The two entries with the lowest losses, best first.
    ///
    /// Unreported entries are skipped. Equal losses keep genome order.
    #[must_use]
    pub fn best_two(&self) -> (Option<&LossEntry>, Option<&LossEntry>) {
        let mut best: Option<(&LossEntry, f64)> = None;
        let mut second: Option<(&LossEntry, f64)> = None;
        for entry in &self.entries {
            let Some(loss) = entry.loss else { continue };
            match best {
                Some((_, best_loss)) if loss >= best_loss => {
                    if second.is_none_or(|(_, second_loss)| loss < second_loss) {
                        second = Some((entry, loss));
                    }
                }
                _ => {
                    second = best;
                    best = Some((entry, loss));
                }
            }
        }
        (best.map(|(e, _)| e), second.map(|(e, _)| e))
    }
}
