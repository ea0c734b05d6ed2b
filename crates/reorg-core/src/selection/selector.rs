//! Artifact selection and the per-identity "latest wins" state.
//!
//! [`select`] is pure: it takes the state accumulated so far by value and
//! returns the updated state alongside the run's picks.
//!
//! Ordering rule, used both inside a run and across runs: a candidate
//! replaces the current one only if its modification time is strictly
//! later. Within a run, artifacts are visited in file-name order, so ties
//! keep the lexicographically first name; across runs, ties keep the
//! first-seen run.

use super::artifact::{Artifact, ArtifactRole};
use crate::identity::Identity;
use std::collections::BTreeMap;

/// Which checkpoints a run contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Every checkpoint file, best-flagged or not.
    AllArtifacts,
    /// The most recent best-flagged encoder and decoder.
    #[default]
    BestOnly,
}

/// Result of offering a candidate to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// First candidate for this identity and role.
    Recorded,
    /// Strictly newer than the previous candidate.
    Replaced,
    /// Not newer; the previous candidate stays.
    Kept,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RoleSlots {
    encoder: Option<Artifact>,
    decoder: Option<Artifact>,
}

impl RoleSlots {
    fn slot_mut(&mut self, role: ArtifactRole) -> Option<&mut Option<Artifact>> {
        match role {
            ArtifactRole::Encoder => Some(&mut self.encoder),
            ArtifactRole::Decoder => Some(&mut self.decoder),
            ArtifactRole::Unclassified => None,
        }
    }

    fn slot(&self, role: ArtifactRole) -> Option<&Artifact> {
        match role {
            ArtifactRole::Encoder => self.encoder.as_ref(),
            ArtifactRole::Decoder => self.decoder.as_ref(),
            ArtifactRole::Unclassified => None,
        }
    }
}

/// Most recent best artifact per identity and role seen during a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    entries: BTreeMap<Identity, RoleSlots>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: Identity, role: ArtifactRole) -> Option<&Artifact> {
        self.entries.get(&identity).and_then(|slots| slots.slot(role))
    }

    /// Record `candidate` if it is strictly newer than the current holder.
    ///
    /// Unclassified artifacts are never recorded.
    pub fn offer(&mut self, identity: Identity, candidate: &Artifact) -> Offer {
        if candidate.role == ArtifactRole::Unclassified {
            return Offer::Kept;
        }
        let slots = self.entries.entry(identity).or_default();
        let Some(slot) = slots.slot_mut(candidate.role) else {
            return Offer::Kept;
        };
        let offer = match slot.as_ref() {
            None => Offer::Recorded,
            Some(current) if candidate.modified > current.modified => Offer::Replaced,
            Some(_) => Offer::Kept,
        };
        if offer != Offer::Kept {
            *slot = Some(candidate.clone());
        }
        offer
    }

    /// Recorded artifacts, ordered by identity then role.
    pub fn iter(&self) -> impl Iterator<Item = (Identity, ArtifactRole, &Artifact)> + '_ {
        self.entries.iter().flat_map(|(identity, slots)| {
            ArtifactRole::PAIRED
                .into_iter()
                .filter_map(move |role| slots.slot(role).map(|a| (*identity, role, a)))
        })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of selecting one run's artifacts.
#[derive(Debug, Clone)]
pub struct Selection {
    /// The run's picks, in role order for best-only mode and file-name order
    /// otherwise.
    pub picks: Vec<Artifact>,
    /// How each best-only pick was received by the state.
    pub offers: Vec<(ArtifactRole, Offer)>,
    pub state: SelectionState,
}

/// The latest best-flagged artifact of `role`.
pub fn latest_best(artifacts: &[Artifact], role: ArtifactRole) -> Option<&Artifact> {
    let mut sorted: Vec<&Artifact> = artifacts
        .iter()
        .filter(|a| a.role == role && a.is_best)
        .collect();
    sorted.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    sorted.into_iter().fold(None, |current, candidate| match current {
        Some(c) if candidate.modified <= c.modified => Some(c),
        _ => Some(candidate),
    })
}

/// Choose the artifacts one run contributes and fold them into `state`.
pub fn select(
    artifacts: &[Artifact],
    identity: Identity,
    mode: SelectionMode,
    mut state: SelectionState,
) -> Selection {
    match mode {
        SelectionMode::AllArtifacts => {
            let mut picks = artifacts.to_vec();
            picks.sort_by(|a, b| a.file_name.cmp(&b.file_name));
            Selection {
                picks,
                offers: Vec::new(),
                state,
            }
        }
        SelectionMode::BestOnly => {
            let mut picks = Vec::new();
            let mut offers = Vec::new();
            for role in ArtifactRole::PAIRED {
                if let Some(candidate) = latest_best(artifacts, role) {
                    offers.push((role, state.offer(identity, candidate)));
                    picks.push(candidate.clone());
                }
            }
            Selection {
                picks,
                offers,
                state,
            }
        }
    }
}
