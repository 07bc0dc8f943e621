use thiserror::Error;

use ms_core::{CoreError, EventId, ProcessId};

#[derive(Debug, Error)]
pub enum SchedError {
    #[error("event {0} was already triggered")]
    AlreadyTriggered(EventId),

    #[error("event {0} does not exist")]
    UnknownEvent(EventId),

    #[error("process {0} does not exist or has finished")]
    UnknownProcess(ProcessId),

    #[error("process {0} suspended on a wait that can never resume")]
    EmptyWait(ProcessId),

    #[error("store holds {items} items but its capacity is {capacity}")]
    StoreOverflow { items: usize, capacity: usize },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SchedResult<T> = Result<T, SchedError>;
