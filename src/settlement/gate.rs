//! Settlement gate: the single check that decides whether a pool may
//! request settlement now. Every later stage trusts this verdict.

use crate::pool::{PoolSnapshot, WinningTeam};

/// Why a pool was held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    NotLocked,
    RequestAlreadySent,
    WinnerDecided,
    /// Lock time plus gap not reached; carries the epoch second it opens at.
    TooEarly { opens_at: u64 },
}

impl std::fmt::Display for GateRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotLocked => write!(f, "pool not locked"),
            Self::RequestAlreadySent => write!(f, "request already sent"),
            Self::WinnerDecided => write!(f, "winner already decided"),
            Self::TooEarly { opens_at } => write!(f, "too early, eligible at {}", opens_at),
        }
    }
}

/// Rules in order: locked, no request sent, no winner, lock time + gap
/// elapsed. A `lock_time` of 0 skips the timing rule here, but such a pool
/// has no game-day window, so `args::build` rejects it with `NoWindow` and
/// the dispatcher skips it before simulation.
pub fn check(snapshot: &PoolSnapshot, now_epoch: u64, gap_seconds: u64) -> Result<(), GateRejection> {
    if !snapshot.is_locked {
        return Err(GateRejection::NotLocked);
    }
    if snapshot.request_sent {
        return Err(GateRejection::RequestAlreadySent);
    }
    if snapshot.winning_team != WinningTeam::None {
        return Err(GateRejection::WinnerDecided);
    }
    if snapshot.lock_time > 0 {
        let opens_at = snapshot.lock_time.saturating_add(gap_seconds);
        if now_epoch < opens_at {
            return Err(GateRejection::TooEarly { opens_at });
        }
    }
    Ok(())
}

pub fn is_eligible(snapshot: &PoolSnapshot, now_epoch: u64, gap_seconds: u64) -> bool {
    check(snapshot, now_epoch, gap_seconds).is_ok()
}
