//! Point-in-time view of a pool contract.

use crate::chain::abi::IPredictionPool;
use crate::chain::RpcClient;
use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Outcome recorded by the pool. `None` means not decided yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinningTeam {
    None,
    TeamA,
    TeamB,
    Draw,
    /// Value outside the known enum range. Treated as decided.
    Other(u8),
}

impl From<u8> for WinningTeam {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::None,
            1 => Self::TeamA,
            2 => Self::TeamB,
            3 => Self::Draw,
            other => Self::Other(other),
        }
    }
}

/// Fields read from one pool in a single pass. Never cached across pools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub address: Address,
    /// Lower-cased league label.
    pub league: String,
    pub team_a_name: String,
    pub team_b_name: String,
    pub team_a_code: String,
    pub team_b_code: String,
    pub is_locked: bool,
    pub request_sent: bool,
    pub winning_team: WinningTeam,
    /// Epoch seconds, `0` if unset.
    pub lock_time: u64,
}

#[async_trait]
pub trait PoolStateReader: Send + Sync {
    async fn read(&self, pool: Address) -> Result<PoolSnapshot>;
}

/// Reads a snapshot with one `eth_call` per accessor, all in flight at once.
pub struct RpcPoolReader {
    rpc: Arc<RpcClient>,
}

impl RpcPoolReader {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }

    async fn view<C: SolCall>(&self, pool: Address, call: C) -> Result<C::Return> {
        let raw = self
            .rpc
            .eth_call(None, pool, &call.abi_encode())
            .await
            .with_context(|| format!("{} on {:#x}", C::SIGNATURE, pool))?;
        C::abi_decode_returns(&raw, true)
            .with_context(|| format!("decoding {} from {:#x}", C::SIGNATURE, pool))
    }
}

#[async_trait]
impl PoolStateReader for RpcPoolReader {
    async fn read(&self, pool: Address) -> Result<PoolSnapshot> {
        use IPredictionPool::*;

        let (
            league,
            team_a_name,
            team_b_name,
            team_a_code,
            team_b_code,
            is_locked,
            request_sent,
            winning_team,
            lock_time,
        ) = tokio::try_join!(
            self.view(pool, leagueCall {}),
            self.view(pool, teamANameCall {}),
            self.view(pool, teamBNameCall {}),
            self.view(pool, teamACodeCall {}),
            self.view(pool, teamBCodeCall {}),
            self.view(pool, isLockedCall {}),
            self.view(pool, requestSentCall {}),
            self.view(pool, winningTeamCall {}),
            self.view(pool, lockTimeCall {}),
        )?;

        Ok(PoolSnapshot {
            address: pool,
            league: league._0.trim().to_lowercase(),
            team_a_name: team_a_name._0,
            team_b_name: team_b_name._0,
            team_a_code: team_a_code._0,
            team_b_code: team_b_code._0,
            is_locked: is_locked._0,
            request_sent: request_sent._0,
            winning_team: WinningTeam::from(winning_team._0),
            lock_time: lock_time._0.saturating_to::<u64>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winning_team_from_u8() {
        assert_eq!(WinningTeam::from(0), WinningTeam::None);
        assert_eq!(WinningTeam::from(1), WinningTeam::TeamA);
        assert_eq!(WinningTeam::from(2), WinningTeam::TeamB);
        assert_eq!(WinningTeam::from(3), WinningTeam::Draw);
        assert_eq!(WinningTeam::from(9), WinningTeam::Other(9));
    }
}
