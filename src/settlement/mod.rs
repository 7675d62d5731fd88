//! Settlement request pipeline: gate, argument builder, simulation,
//! submission and the dispatch pass that ties them together.

pub mod args;
pub mod discovery;
pub mod dispatcher;
pub mod gate;
pub mod secrets;
pub mod simulator;
pub mod submit;

pub use args::{ArgsError, RequestArgs};
pub use dispatcher::{
    DispatchReport, DispatchSettings, Dispatcher, PoolOutcome, PoolState, StopHandle,
};
pub use gate::GateRejection;
pub use secrets::{SecretsPointer, SecretsSettings, SecretsSource};
pub use simulator::{RequestSimulator, RpcSimulator, SimError};
pub use submit::{RequestSubmitter, RpcSubmitter, SubmitError, Submission};
