//! Side/digit identity extraction from free-form run paths.
//!
//! Training jobs are launched with ad-hoc directory names such as
//! `run_right-index-v2` or `2025.08.17/left_pinky/seed3`. The identity is
//! recovered with an ordered chain of [`IdentityStrategy`] tiers:
//!
//! 1. [`ComponentStrategy`]: each path component, deepest first
//! 2. [`WholePathStrategy`]: the whole lower-cased path string
//!
//! The first tier returning a match wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// `<side><separator?><digit>`, separator absent, `-` or `_`.
static SIDE_DIGIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(left|right)[-_]?(index|middle|ring|pinky|thumb)").unwrap()
});

/// Hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl std::str::FromStr for Side {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            _ => Err(()),
        }
    }
}

/// Finger label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Digit {
    Index,
    Middle,
    Ring,
    Pinky,
    Thumb,
}

impl Digit {
    pub const ALL: [Digit; 5] = [
        Digit::Index,
        Digit::Middle,
        Digit::Ring,
        Digit::Pinky,
        Digit::Thumb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Digit::Index => "index",
            Digit::Middle => "middle",
            Digit::Ring => "ring",
            Digit::Pinky => "pinky",
            Digit::Thumb => "thumb",
        }
    }
}

impl std::str::FromStr for Digit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "index" => Ok(Digit::Index),
            "middle" => Ok(Digit::Middle),
            "ring" => Ok(Digit::Ring),
            "pinky" => Ok(Digit::Pinky),
            "thumb" => Ok(Digit::Thumb),
            _ => Err(()),
        }
    }
}

/// The `(side, digit)` pair a run was trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub side: Side,
    pub digit: Digit,
}

impl Identity {
    pub fn new(side: Side, digit: Digit) -> Self {
        Self { side, digit }
    }

    /// Destination subdirectory name, e.g. `right_index`.
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.side.as_str(), self.digit.as_str())
    }

    /// Find the first side/digit pattern in `text`.
    pub fn find_in(text: &str) -> Option<Identity> {
        let caps = SIDE_DIGIT.captures(text)?;
        let side = caps.get(1)?.as_str().parse().ok()?;
        let digit = caps.get(2)?.as_str().parse().ok()?;
        Some(Identity { side, digit })
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.side.as_str(), self.digit.as_str())
    }
}

/// One tier of the extraction chain.
pub trait IdentityStrategy: Send + Sync {
    /// Short name used in debug logs.
    fn name(&self) -> &'static str;

    fn extract(&self, path: &Path) -> Option<Identity>;
}

/// Match each path component, deepest first.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComponentStrategy;

impl IdentityStrategy for ComponentStrategy {
    fn name(&self) -> &'static str {
        "component"
    }

    fn extract(&self, path: &Path) -> Option<Identity> {
        path.iter()
            .rev()
            .find_map(|part| Identity::find_in(&part.to_string_lossy()))
    }
}

/// Match the whole lower-cased path string.
#[derive(Debug, Default, Clone, Copy)]
pub struct WholePathStrategy;

impl IdentityStrategy for WholePathStrategy {
    fn name(&self) -> &'static str {
        "whole-path"
    }

    fn extract(&self, path: &Path) -> Option<Identity> {
        Identity::find_in(&path.to_string_lossy().to_lowercase())
    }
}

/// Ordered chain of extraction strategies.
pub struct IdentityExtractor {
    strategies: Vec<Box<dyn IdentityStrategy>>,
}

impl IdentityExtractor {
    /// Build an extractor with a custom strategy order.
    pub fn with_strategies(strategies: Vec<Box<dyn IdentityStrategy>>) -> Self {
        Self { strategies }
    }

    /// Extract the identity of `path`, or `None` if no tier matches.
    pub fn extract(&self, path: &Path) -> Option<Identity> {
        for strategy in &self.strategies {
            if let Some(identity) = strategy.extract(path) {
                debug!(
                    "Identity {} from {} via {}",
                    identity,
                    path.display(),
                    strategy.name()
                );
                return Some(identity);
            }
        }
        None
    }
}

impl Default for IdentityExtractor {
    fn default() -> Self {
        Self::with_strategies(vec![
            Box::new(ComponentStrategy),
            Box::new(WholePathStrategy),
        ])
    }
}

impl std::fmt::Debug for IdentityExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("IdentityExtractor")
            .field("strategies", &names)
            .finish()
    }
}
