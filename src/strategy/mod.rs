//! Staking configuration.
//!
//! A staking document is read from disk as a [`RawStakingConfig`] (every
//! field optional), checked by [`validate`], and only then turned into the
//! immutable [`StakingConfig`] the engine runs on. Validation reports every
//! violation in one pass.

pub mod sources;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Keys every staking document must carry.
pub const REQUIRED_FIELDS: &[&str] = &[
    "initial_stake",
    "stake_ladder",
    "martingale_multiplier",
    "take_profit",
    "stop_loss",
    "ticks",
];

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

/// Validated staking parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakingConfig {
    initial_stake: Decimal,
    stake_ladder: Vec<Decimal>,
    martingale_multiplier: Decimal,
    take_profit: Decimal,
    stop_loss: Decimal,
    ticks: i64,
}

impl StakingConfig {
    pub fn initial_stake(&self) -> Decimal {
        self.initial_stake
    }

    /// Never empty.
    pub fn stake_ladder(&self) -> &[Decimal] {
        &self.stake_ladder
    }

    pub fn martingale_multiplier(&self) -> Decimal {
        self.martingale_multiplier
    }

    pub fn take_profit(&self) -> Decimal {
        self.take_profit
    }

    pub fn stop_loss(&self) -> Decimal {
        self.stop_loss
    }

    /// Reserved. Carried through unchanged; the engine does not read it.
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Highest valid ladder index.
    pub fn last_rung(&self) -> usize {
        self.stake_ladder.len() - 1
    }

    /// Stake to use after a loss that left the streak at `rung`.
    /// `rung` is clamped to the last ladder entry. `None` if the product
    /// does not fit in a `Decimal`.
    pub fn stake_after_loss(&self, rung: usize) -> Option<Decimal> {
        self.stake_ladder[rung.min(self.last_rung())].checked_mul(self.martingale_multiplier)
    }

    /// Back to the all-optional form (for saving or merging).
    pub fn to_raw(&self) -> RawStakingConfig {
        RawStakingConfig {
            initial_stake: Some(self.initial_stake),
            stake_ladder: Some(self.stake_ladder.clone()),
            martingale_multiplier: Some(self.martingale_multiplier),
            take_profit: Some(self.take_profit),
            stop_loss: Some(self.stop_loss),
            ticks: Some(self.ticks),
        }
    }
}

impl fmt::Display for StakingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stake={} ladder={} rungs x{} | take_profit={} stop_loss={}",
            self.initial_stake,
            self.stake_ladder.len(),
            self.martingale_multiplier,
            self.take_profit,
            self.stop_loss,
        )
    }
}

// ---------------------------------------------------------------------------
// Raw (unvalidated) document
// ---------------------------------------------------------------------------

/// A staking document as found on disk. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStakingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_stake: Option<Decimal>,
    #[serde(default, alias = "stake_list", skip_serializing_if = "Option::is_none")]
    pub stake_ladder: Option<Vec<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub martingale_multiplier: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticks: Option<i64>,
}

impl RawStakingConfig {
    /// The hardcoded defaults used when no document exists anywhere.
    pub fn builtin() -> Self {
        Self {
            initial_stake: Some(dec!(0.35)),
            stake_ladder: Some(vec![
                dec!(0.35),
                dec!(0.43),
                dec!(0.85),
                dec!(1.74),
                dec!(3.55),
                dec!(7.3),
                dec!(15),
                dec!(31),
                dec!(65),
                dec!(130),
                dec!(260),
            ]),
            martingale_multiplier: Some(dec!(2)),
            take_profit: Some(dec!(20)),
            stop_loss: Some(dec!(20)),
            ticks: Some(1),
        }
    }

    /// Validate and freeze. Returns every violation on failure.
    pub fn validated(&self) -> Result<StakingConfig, Vec<Violation>> {
        let violations = validate(self);
        let (
            Some(initial_stake),
            Some(stake_ladder),
            Some(martingale_multiplier),
            Some(take_profit),
            Some(stop_loss),
            Some(ticks),
        ) = (
            self.initial_stake,
            self.stake_ladder.clone(),
            self.martingale_multiplier,
            self.take_profit,
            self.stop_loss,
            self.ticks,
        )
        else {
            return Err(violations);
        };
        if !violations.is_empty() {
            return Err(violations);
        }
        Ok(StakingConfig {
            initial_stake,
            stake_ladder,
            martingale_multiplier,
            take_profit,
            stop_loss,
            ticks,
        })
    }

    /// Whether the named key is present.
    pub fn has_field(&self, field: &str) -> bool {
        match field {
            "initial_stake" => self.initial_stake.is_some(),
            "stake_ladder" | "stake_list" => self.stake_ladder.is_some(),
            "martingale_multiplier" => self.martingale_multiplier.is_some(),
            "take_profit" => self.take_profit.is_some(),
            "stop_loss" => self.stop_loss.is_some(),
            "ticks" => self.ticks.is_some(),
            _ => false,
        }
    }

    /// Fill any missing field from `defaults`. Present fields win.
    pub fn merge_with(&self, defaults: &RawStakingConfig) -> RawStakingConfig {
        RawStakingConfig {
            initial_stake: self.initial_stake.or(defaults.initial_stake),
            stake_ladder: self.stake_ladder.clone().or_else(|| defaults.stake_ladder.clone()),
            martingale_multiplier: self.martingale_multiplier.or(defaults.martingale_multiplier),
            take_profit: self.take_profit.or(defaults.take_profit),
            stop_loss: self.stop_loss.or(defaults.stop_loss),
            ticks: self.ticks.or(defaults.ticks),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// What is wrong with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Missing,
    NotPositive,
    Empty,
}

/// One validation failure, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub kind: ViolationKind,
}

impl Violation {
    fn missing(field: &'static str) -> Self {
        Self { field, kind: ViolationKind::Missing }
    }

    fn not_positive(field: &'static str) -> Self {
        Self { field, kind: ViolationKind::NotPositive }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.field) {
            (ViolationKind::Missing, field) => write!(f, "missing required field: {field}"),
            (ViolationKind::NotPositive, "stake_ladder") => {
                write!(f, "all values in stake_ladder must be greater than 0")
            }
            (ViolationKind::NotPositive, field) => write!(f, "{field} must be greater than 0"),
            (ViolationKind::Empty, field) => write!(f, "{field} must not be empty"),
        }
    }
}

impl std::error::Error for Violation {}

/// Check a staking document. An empty result means it is valid.
///
/// Every rule is evaluated independently; nothing short-circuits.
pub fn validate(raw: &RawStakingConfig) -> Vec<Violation> {
    let mut violations: Vec<Violation> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| !raw.has_field(f))
        .map(Violation::missing)
        .collect();

    let positive = |value: Option<Decimal>, field: &'static str, out: &mut Vec<Violation>| {
        if matches!(value, Some(v) if v <= Decimal::ZERO) {
            out.push(Violation::not_positive(field));
        }
    };

    positive(raw.initial_stake, "initial_stake", &mut violations);

    if let Some(ladder) = &raw.stake_ladder {
        if ladder.is_empty() {
            violations.push(Violation { field: "stake_ladder", kind: ViolationKind::Empty });
        } else if ladder.iter().any(|s| *s <= Decimal::ZERO) {
            violations.push(Violation::not_positive("stake_ladder"));
        }
    }

    positive(raw.martingale_multiplier, "martingale_multiplier", &mut violations);
    positive(raw.take_profit, "take_profit", &mut violations);
    positive(raw.stop_loss, "stop_loss", &mut violations);

    if matches!(raw.ticks, Some(t) if t <= 0) {
        violations.push(Violation::not_positive("ticks"));
    }

    violations
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
