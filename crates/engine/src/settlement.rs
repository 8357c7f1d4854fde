//! Stake settlement hook
//!
//! Invoked once per contest at finalization. The engine treats settlement as
//! a black box: whatever payouts come back are broadcast in the
//! `debate_ended` envelope. A settlement failure never blocks completion.

use agora_core::{Bot, Contest, Payout, Result, Side};
use async_trait::async_trait;

/// Settles the stakes of a completed contest.
#[async_trait]
pub trait StakeSettlement: Send + Sync {
    /// Produce the payouts for a decided contest.
    async fn settle(
        &self,
        contest: &Contest,
        winner: Side,
        winner_bot: &Bot,
        loser_bot: &Bot,
    ) -> Result<Vec<Payout>>;
}

/// No stakes change hands.
pub struct NoSettlement;

#[async_trait]
impl StakeSettlement for NoSettlement {
    async fn settle(
        &self,
        _contest: &Contest,
        _winner: Side,
        _winner_bot: &Bot,
        _loser_bot: &Bot,
    ) -> Result<Vec<Payout>> {
        Ok(Vec::new())
    }
}

/// The winner's owner collects both stakes.
pub struct WinnerTakesAll;

#[async_trait]
impl StakeSettlement for WinnerTakesAll {
    async fn settle(
        &self,
        contest: &Contest,
        _winner: Side,
        winner_bot: &Bot,
        _loser_bot: &Bot,
    ) -> Result<Vec<Payout>> {
        if contest.stake == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Payout {
            user_id: winner_bot.owner,
            amount: contest.stake * 2,
        }])
    }
}
