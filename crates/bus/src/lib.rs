use core_types::{RequestId, ResourceKind, SessionId};
use html::{HandleAllocator, OpStage, TreeOpProducer};
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

pub enum ParseCommand {
    /// Begin a parse. Batches for it are staged into `stage` with handles
    /// drawn from `handles` (the consuming executor's allocator).
    Start {
        session_id: SessionId,
        request_id: RequestId,
        stage: Arc<OpStage>,
        handles: HandleAllocator,
        producer: Box<dyn TreeOpProducer>,
    },
    Chunk {
        session_id: SessionId,
        request_id: RequestId,
        bytes: Vec<u8>,
    },
    Done {
        session_id: SessionId,
        request_id: RequestId,
    },
    /// Drop the parse without staging anything further.
    Terminate {
        session_id: SessionId,
        request_id: RequestId,
    },
}

impl fmt::Debug for ParseCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCommand::Start {
                session_id,
                request_id,
                ..
            } => f
                .debug_struct("Start")
                .field("session_id", session_id)
                .field("request_id", request_id)
                .finish_non_exhaustive(),
            ParseCommand::Chunk {
                session_id,
                request_id,
                bytes,
            } => f
                .debug_struct("Chunk")
                .field("session_id", session_id)
                .field("request_id", request_id)
                .field("len", &bytes.len())
                .finish(),
            ParseCommand::Done {
                session_id,
                request_id,
            } => f
                .debug_struct("Done")
                .field("session_id", session_id)
                .field("request_id", request_id)
                .finish(),
            ParseCommand::Terminate {
                session_id,
                request_id,
            } => f
                .debug_struct("Terminate")
                .field("session_id", session_id)
                .field("request_id", request_id)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    // Parser -> executor: a batch is waiting in the session's stage
    OpsStaged {
        session_id: SessionId,
        request_id: RequestId,
        ops: usize,
        loads: usize,
    },
    // Parser -> network: something worth fetching early was seen
    PrefetchHint {
        session_id: SessionId,
        request_id: RequestId,
        kind: ResourceKind,
        url: String,
    },
    Finished {
        session_id: SessionId,
        request_id: RequestId,
    },
}

pub struct Bus {
    pub cmd_tx: Sender<ParseCommand>,
    pub cmd_rx: Receiver<ParseCommand>,
    pub evt_rx: Receiver<ParseEvent>,
    pub evt_tx: Sender<ParseEvent>, // shareable for runtimes
}

impl Bus {
    pub fn new() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (evt_tx, evt_rx) = mpsc::channel();
        Self {
            cmd_tx,
            cmd_rx,
            evt_rx,
            evt_tx,
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
