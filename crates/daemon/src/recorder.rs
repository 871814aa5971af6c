// SPDX-License-Identifier: MIT

//! Execution recorder / replayer (`spec.md` §4.M). Records syscall
//! request/response pairs into a bounded buffer for later byte-identical
//! replay against the live kernel.

use agentkernel_core::AgentId;
use agentkernel_wire::Opcode;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Fixed at record time: any opcode whose reply depends on wall-clock-
/// sensitive or external state. `include_*` flags narrow this per
/// `record_start` request.
fn is_nondeterministic(opcode: Opcode, include_think: bool, include_http: bool, include_exec: bool) -> bool {
    match opcode {
        Opcode::Think => !include_think,
        Opcode::Exec => !include_exec,
        Opcode::Http => !include_http,
        Opcode::MetricsSystem | Opcode::MetricsAgent | Opcode::MetricsCgroup => true,
        Opcode::AsyncPoll => true,
        // Control opcodes for the recorder/replayer itself: re-dispatching
        // them during a replay would mutate recorder state instead of
        // exercising the recorded session, so they never replay.
        Opcode::RecordStart | Opcode::RecordStop | Opcode::RecordStatus | Opcode::ReplayStart | Opcode::ReplayStatus => true,
        _ => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEntry {
    pub seq: u64,
    pub agent_id: AgentId,
    pub opcode: u8,
    pub request: serde_json::Value,
    pub response: serde_json::Value,
    pub success: bool,
    pub skip_on_replay: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub include_think: bool,
    pub include_http: bool,
    pub include_exec: bool,
    pub filter_agents: Vec<AgentId>,
    pub max_entries: usize,
}

enum RecordingState {
    Idle,
    Recording { options: RecordOptions, entries: Vec<RecordedEntry>, next_seq: u64 },
    Stopped { entries: Vec<RecordedEntry> },
}

#[derive(Default)]
pub struct Recorder {
    state: Mutex<RecordingState>,
}

impl Default for RecordingState {
    fn default() -> Self {
        RecordingState::Idle
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, mut options: RecordOptions) {
        if options.max_entries == 0 {
            options.max_entries = 10_000;
        }
        *self.state.lock() = RecordingState::Recording { options, entries: Vec::new(), next_seq: 1 };
    }

    /// Append an observed syscall if recording is active and its opcode (or
    /// agent) is in scope. Returns whether it was recorded.
    pub fn observe(
        &self,
        agent_id: AgentId,
        opcode: Opcode,
        request: serde_json::Value,
        response: serde_json::Value,
        success: bool,
    ) -> bool {
        let mut state = self.state.lock();
        let RecordingState::Recording { options, entries, next_seq } = &mut *state else {
            return false;
        };
        if !options.filter_agents.is_empty() && !options.filter_agents.contains(&agent_id) {
            return false;
        }
        if entries.len() >= options.max_entries {
            return false;
        }
        let skip_on_replay =
            is_nondeterministic(opcode, options.include_think, options.include_http, options.include_exec);
        entries.push(RecordedEntry {
            seq: *next_seq,
            agent_id,
            opcode: opcode as u8,
            request,
            response,
            success,
            skip_on_replay,
        });
        *next_seq += 1;
        true
    }

    pub fn stop(&self) -> usize {
        let mut state = self.state.lock();
        let count = match &*state {
            RecordingState::Recording { entries, .. } => entries.len(),
            _ => 0,
        };
        if let RecordingState::Recording { entries, .. } =
            std::mem::replace(&mut *state, RecordingState::Idle)
        {
            *state = RecordingState::Stopped { entries };
        }
        count
    }

    pub fn is_recording(&self) -> bool {
        matches!(&*self.state.lock(), RecordingState::Recording { .. })
    }

    pub fn export(&self) -> Vec<RecordedEntry> {
        match &*self.state.lock() {
            RecordingState::Recording { entries, .. } => entries.clone(),
            RecordingState::Stopped { entries } => entries.clone(),
            RecordingState::Idle => Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
