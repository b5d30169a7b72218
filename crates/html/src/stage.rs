//! Handoff points between producers and the executor.
//!
//! A producer always writes into a [`TreeOpSink`]. On the executor's own
//! thread the sink is the executor itself and the batch moves directly into
//! its queue; from a parser thread the sink is an [`OpStage`] the executor
//! drains at the start of each flush.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::speculative_load::SpeculativeLoad;
use crate::tree_op::TreeOperation;

/// Destination for completed batches. Sources are left empty.
pub trait TreeOpSink {
    fn move_ops_from(&mut self, ops: &mut Vec<TreeOperation>);
    fn move_speculative_loads_from(&mut self, loads: &mut Vec<SpeculativeLoad>);
}

/// Plain buffering sink.
#[derive(Debug, Default)]
pub struct VecOpSink {
    pub ops: Vec<TreeOperation>,
    pub loads: Vec<SpeculativeLoad>,
}

impl TreeOpSink for VecOpSink {
    fn move_ops_from(&mut self, ops: &mut Vec<TreeOperation>) {
        self.ops.append(ops);
    }

    fn move_speculative_loads_from(&mut self, loads: &mut Vec<SpeculativeLoad>) {
        self.loads.append(loads);
    }
}

#[derive(Debug, Default)]
struct StageBuffers {
    ops: Vec<TreeOperation>,
    loads: Vec<SpeculativeLoad>,
}

/// Lock-protected staging area shared by one producer and one executor.
#[derive(Debug, Default)]
pub struct OpStage {
    buffers: Mutex<StageBuffers>,
}

impl OpStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append everything staged so far to the consumer's queues.
    pub fn retrieve(&self, ops: &mut VecDeque<TreeOperation>, loads: &mut Vec<SpeculativeLoad>) {
        let mut buffers = self.buffers.lock();
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "html.stage",
            "retrieve {} ops, {} loads",
            buffers.ops.len(),
            buffers.loads.len()
        );
        ops.extend(buffers.ops.drain(..));
        loads.append(&mut buffers.loads);
    }

    pub fn is_empty(&self) -> bool {
        let buffers = self.buffers.lock();
        buffers.ops.is_empty() && buffers.loads.is_empty()
    }

    pub fn staged_op_count(&self) -> usize {
        self.buffers.lock().ops.len()
    }
}

impl TreeOpSink for &OpStage {
    fn move_ops_from(&mut self, ops: &mut Vec<TreeOperation>) {
        let mut buffers = self.buffers.lock();
        if buffers.ops.is_empty() {
            std::mem::swap(&mut buffers.ops, ops);
        } else {
            buffers.ops.append(ops);
        }
    }

    fn move_speculative_loads_from(&mut self, loads: &mut Vec<SpeculativeLoad>) {
        let mut buffers = self.buffers.lock();
        if buffers.loads.is_empty() {
            std::mem::swap(&mut buffers.loads, loads);
        } else {
            buffers.loads.append(loads);
        }
    }
}
