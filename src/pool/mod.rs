pub mod snapshot;

pub use snapshot::{PoolSnapshot, PoolStateReader, RpcPoolReader, WinningTeam};
