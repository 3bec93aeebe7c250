//! Shared fixtures.

use martingale::strategy::{RawStakingConfig, StakingConfig};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Valid config with explicit thresholds and a `1, 2, 4` ladder.
pub fn staking_config(take_profit: Decimal, stop_loss: Decimal) -> StakingConfig {
    ladder_config(&[dec!(1), dec!(2), dec!(4)], dec!(1), take_profit, stop_loss)
}

pub fn ladder_config(ladder: &[Decimal], multiplier: Decimal, take_profit: Decimal, stop_loss: Decimal) -> StakingConfig {
    RawStakingConfig {
        initial_stake: Some(dec!(1)),
        stake_ladder: Some(ladder.to_vec()),
        martingale_multiplier: Some(multiplier),
        take_profit: Some(take_profit),
        stop_loss: Some(stop_loss),
        ticks: Some(1),
    }
    .validated()
    .expect("fixture config is valid")
}
