mod bus;
mod progress;

pub use bus::{EventBus, EventEmitter, ExecutionEvent, NodeEvent, RunId};
pub use progress::{NodeStatus, ProgressData, ProgressUpdate, RunStatus};
