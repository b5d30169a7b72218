//! Flush state machine and the drain loop.
//!
//! `NotFlushing -> InFlush -> InDocUpdate <-> Notifying`, back down to
//! `InFlush` when the update closes and `NotFlushing` when the flush returns.
//! Document updates are opened lazily by the first op that needs one and
//! closed before anything that may run foreign code (scripts, style sheet
//! loads, layout, charset reloads) and before every yield.

use super::{ExecutorHost, TreeOpExecutor};
use crate::builder::DocumentWriter;
use crate::dom::NodeId;
use crate::tree_op::PerformOutcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushState {
    NotFlushing,
    InFlush,
    InDocUpdate,
    Notifying,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The queue is empty.
    Drained,
    /// The flush budget ran out; call again to continue.
    Interrupted,
    /// A script is waiting on a load; see `unblock_parser`.
    BlockedOnScript,
    Terminated,
    Broken,
}

impl<H: ExecutorHost> TreeOpExecutor<H> {
    pub fn begin_doc_update(&mut self) {
        assert_eq!(
            self.flush_state,
            FlushState::InFlush,
            "document update opened outside a flush"
        );
        self.flush_state = FlushState::InDocUpdate;
        self.stats.doc_updates += 1;
        if let Some(doc) = self.document {
            if let Err(err) = self.dom.begin_update(doc) {
                log::warn!(target: "html.executor", "begin_update failed: {err}");
            }
        }
    }

    /// Close the open update, if any, firing pending notifications first.
    pub fn end_doc_update(&mut self) {
        assert_ne!(
            self.flush_state,
            FlushState::Notifying,
            "document update closed while notifying"
        );
        if self.flush_state != FlushState::InDocUpdate {
            return;
        }
        self.flush_pending_append_notifications();
        self.flush_state = FlushState::InFlush;
        if let Some(doc) = self.document {
            if let Err(err) = self.dom.end_update(doc) {
                log::warn!(target: "html.executor", "end_update failed: {err}");
            }
        }
    }

    pub fn flush_pending_append_notifications(&mut self) {
        assert_eq!(
            self.flush_state,
            FlushState::InDocUpdate,
            "notifications flushed outside a document update"
        );
        self.flush_state = FlushState::Notifying;
        let fired = self.pending.flush(&mut self.dom);
        self.stats.notifications_fired += fired as u64;
        self.flush_state = FlushState::InDocUpdate;
    }

    /// Drain staged loads and queued ops against the document.
    pub fn run_flush_loop(&mut self) -> FlushOutcome {
        if self.broken {
            return FlushOutcome::Broken;
        }
        if self.is_terminated() {
            self.tear_down();
            return FlushOutcome::Terminated;
        }
        if self.blocked_on_script {
            return FlushOutcome::BlockedOnScript;
        }
        assert_eq!(
            self.flush_state,
            FlushState::NotFlushing,
            "run_flush_loop re-entered"
        );
        self.flush_state = FlushState::InFlush;
        self.stats.flushes += 1;

        if let Some(stage) = &self.stage {
            stage.retrieve(&mut self.queue, &mut self.speculative_loads);
        }
        let loads = std::mem::take(&mut self.speculative_loads);
        for load in loads {
            self.stats.speculative_loads += 1;
            load.perform(self);
        }

        let outcome = self.drain_queue();

        self.end_doc_update();
        self.run_deferred_tasks();
        self.flush_state = FlushState::NotFlushing;
        if outcome == FlushOutcome::Terminated {
            self.tear_down();
        }
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(target: "html.executor", "flush -> {outcome:?}, {} ops left", self.queue.len());
        outcome
    }

    fn drain_queue(&mut self) -> FlushOutcome {
        let mut performed = 0usize;
        loop {
            if self.is_terminated() {
                return FlushOutcome::Terminated;
            }
            let Some(op) = self.queue.pop_front() else {
                return FlushOutcome::Drained;
            };
            if self.flush_state == FlushState::InFlush {
                self.begin_doc_update();
            }
            #[cfg(any(test, feature = "debug-stats"))]
            log::trace!(target: "html.tree_op", "perform {}", op.name());
            match op.perform(self) {
                Ok(PerformOutcome::Continue) => {}
                Ok(PerformOutcome::RunScript(script)) => {
                    self.stats.ops_performed += 1;
                    if let Some(outcome) = self.run_script(script) {
                        return outcome;
                    }
                    continue;
                }
                Err(err) if err.is_fatal() => {
                    log::warn!(target: "html.executor", "fatal tree op failure: {err}");
                    self.mark_as_broken();
                    return FlushOutcome::Broken;
                }
                Err(err) => {
                    self.stats.op_failures += 1;
                    log::warn!(target: "html.tree_op", "tree op failed: {err}");
                }
            }
            if self.broken {
                return FlushOutcome::Broken;
            }
            self.stats.ops_performed += 1;
            performed += 1;
            if let Some(budget) = self.config.flush_budget {
                if performed >= budget && !self.queue.is_empty() {
                    return FlushOutcome::Interrupted;
                }
            }
        }
    }

    /// Returns `Some` when the loop must stop.
    fn run_script(&mut self, script: NodeId) -> Option<FlushOutcome> {
        self.end_doc_update();
        self.run_deferred_tasks();
        if self.is_terminated() {
            return Some(FlushOutcome::Terminated);
        }
        let Some(state) = self.dom.element_mut(script).and_then(|e| e.script.as_mut()) else {
            log::warn!(target: "html.executor", "RunScript target {script:?} is not a script");
            return None;
        };
        if self.config.fragment_parser {
            state.prevent_execution = true;
            return None;
        }
        if state.prevent_execution {
            return None;
        }
        self.stats.script_pauses += 1;
        let mut writer = DocumentWriter::new(
            self.handle_allocator.clone(),
            self.doc_write_snapshot.clone(),
        );
        let execution = self.host.execute(script, &self.dom, &mut writer);
        let written = self.splice_writer(writer);
        if written > 0 {
            log::debug!(target: "html.executor", "document.write spliced {written} ops");
        }
        match execution {
            super::ScriptExecution::Completed => None,
            super::ScriptExecution::Blocked => {
                self.blocked_on_script = true;
                Some(FlushOutcome::BlockedOnScript)
            }
        }
    }

    fn tear_down(&mut self) {
        if self.document.is_some() {
            log::debug!(target: "html.executor", "parse terminated; dropping {} queued ops", self.queue.len());
            self.did_build_model(true);
            self.document = None;
        }
        self.queue.clear();
        self.speculative_loads.clear();
        self.deferred.clear();
        self.pending = Default::default();
        self.held.clear();
        self.handles.clear();
    }
}
