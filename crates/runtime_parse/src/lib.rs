//! Parser-thread runtime: feeds input to a [`TreeOpProducer`] per session and
//! stages the resulting batches for the executor that owns the document.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use bus::{ParseCommand, ParseEvent};
use core_types::{RequestId, SessionId};
use html::{OpStage, TreeOpBuilder, TreeOpProducer};

const TICK: Duration = Duration::from_millis(180);

/// When a session's pending batch is handed to its stage.
///
/// A batch is staged once `tick` has passed since the previous one or once it
/// holds `op_threshold` ops, whichever comes first. `Done` always stages.
#[derive(Clone, Copy, Debug)]
pub struct StagePolicy {
    pub tick: Duration,
    pub op_threshold: Option<usize>,
}

impl Default for StagePolicy {
    fn default() -> Self {
        Self {
            tick: TICK,
            op_threshold: None,
        }
    }
}

impl StagePolicy {
    fn should_stage(&self, state: &ParseState) -> bool {
        if state.builder.is_empty() {
            return false;
        }
        if let Some(threshold) = self.op_threshold
            && state.builder.len() >= threshold
        {
            return true;
        }
        state.last_stage.elapsed() >= self.tick
    }
}

struct ParseState {
    producer: Box<dyn TreeOpProducer>,
    builder: TreeOpBuilder,
    stage: Arc<OpStage>,
    last_stage: Instant,
}

type Key = (SessionId, RequestId);

pub fn start_parse_runtime(cmd_rx: Receiver<ParseCommand>, evt_tx: Sender<ParseEvent>) {
    start_parse_runtime_with_policy(cmd_rx, evt_tx, StagePolicy::default());
}

pub fn start_parse_runtime_with_policy(
    cmd_rx: Receiver<ParseCommand>,
    evt_tx: Sender<ParseEvent>,
    policy: StagePolicy,
) {
    thread::spawn(move || {
        let mut sessions: HashMap<Key, ParseState> = HashMap::new();

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                ParseCommand::Start {
                    session_id,
                    request_id,
                    stage,
                    handles,
                    producer,
                } => {
                    let state = ParseState {
                        producer,
                        builder: TreeOpBuilder::new(handles),
                        stage,
                        last_stage: Instant::now(),
                    };
                    if sessions.insert((session_id, request_id), state).is_some() {
                        log::warn!(
                            target: "runtime_parse",
                            "restarted parse {session_id}/{request_id}; pending ops dropped"
                        );
                    }
                }
                ParseCommand::Chunk {
                    session_id,
                    request_id,
                    bytes,
                } => {
                    let Some(st) = sessions.get_mut(&(session_id, request_id)) else {
                        log::warn!(
                            target: "runtime_parse",
                            "chunk for unknown parse {session_id}/{request_id}"
                        );
                        continue;
                    };
                    st.producer.push_bytes(&bytes, &mut st.builder);
                    if policy.should_stage(st) {
                        stage_batch((session_id, request_id), st, &evt_tx);
                    }
                }
                ParseCommand::Done {
                    session_id,
                    request_id,
                } => {
                    let Some(mut st) = sessions.remove(&(session_id, request_id)) else {
                        log::warn!(
                            target: "runtime_parse",
                            "done for unknown parse {session_id}/{request_id}"
                        );
                        continue;
                    };
                    st.producer.finish(&mut st.builder);
                    stage_batch((session_id, request_id), &mut st, &evt_tx);
                    let _ = evt_tx.send(ParseEvent::Finished {
                        session_id,
                        request_id,
                    });
                }
                ParseCommand::Terminate {
                    session_id,
                    request_id,
                } => {
                    if let Some(st) = sessions.remove(&(session_id, request_id)) {
                        log::debug!(
                            target: "runtime_parse",
                            "terminated parse {session_id}/{request_id} with {} unstaged ops",
                            st.builder.len()
                        );
                    }
                }
            }
        }
    });
}

/// Hand the session's pending ops and loads to its stage.
fn stage_batch(key: Key, st: &mut ParseState, evt_tx: &Sender<ParseEvent>) {
    if st.builder.is_empty() {
        return;
    }
    let (session_id, request_id) = key;
    let ops = st.builder.len();
    let loads = st.builder.loads().len();
    for load in st.builder.loads() {
        if let Some(kind) = load.resource_kind() {
            let _ = evt_tx.send(ParseEvent::PrefetchHint {
                session_id,
                request_id,
                kind,
                url: load.url().to_string(),
            });
        }
    }
    let mut sink: &OpStage = &st.stage;
    st.builder.flush_to(&mut sink);
    st.last_stage = Instant::now();
    log::trace!(target: "runtime_parse", "staged {ops} ops, {loads} loads for {session_id}/{request_id}");
    let _ = evt_tx.send(ParseEvent::OpsStaged {
        session_id,
        request_id,
        ops,
        loads,
    });
}
