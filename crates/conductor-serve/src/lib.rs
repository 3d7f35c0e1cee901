// ABOUTME: Session runtime for conductor - supervision, pooling, config swaps
// ABOUTME: Dispatches inbound control messages for one client connection

pub mod channel;
pub mod pool;
pub mod protocol;
pub mod session;
pub mod supervisor;
pub mod swap;

pub use channel::{send_or_log, Channel, ChannelError, LocalChannel};
pub use pool::{JobHandle, PoolError, WorkerPool};
pub use protocol::{
    ControlMessage, Notification, OrchestratorSettings, ResponseBody, SettingsUpdate,
};
pub use session::{Experiment, ExperimentFactory, Session, TaskContext};
pub use supervisor::{TaskState, TaskSupervisor};
pub use swap::ConfigSwapCoordinator;
