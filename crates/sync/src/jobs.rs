//! Job tracking.
//!
//! The backend names jobs; the client names turns. Every `start_ai_job`
//! carries a client request id. When the backend echoes it, a job binds to
//! exactly the turn that sent it. Otherwise a job binds the first time its id
//! is seen, oldest unbound turn first, which matches the order `start_ai_job`
//! messages were sent.
//!
//! A rollback can supersede turns whose job has not reported yet. Those turns
//! keep their place in the send-order queue, so the first unknown job to
//! arrive in that place is recognised as the abandoned one and dropped instead
//! of being handed to a newer turn.
//!
//! Jobs that were cancelled, timed out, failed or superseded are remembered so
//! late batches can be dropped.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::chat::TurnId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEnd {
    Cancelled,
    TimedOut,
    Failed,
    /// A rollback abandoned the turn the job belonged to.
    Superseded,
}

impl JobEnd {
    pub fn label(self) -> &'static str {
        match self {
            JobEnd::Cancelled => "cancelled",
            JobEnd::TimedOut => "timed out",
            JobEnd::Failed => "failed",
            JobEnd::Superseded => "superseded by rollback",
        }
    }
}

/// A sent turn whose job has not been seen yet.
#[derive(Debug)]
struct Waiting {
    turn: TurnId,
    request_id: String,
    superseded: bool,
}

#[derive(Debug, Default)]
pub struct JobTracker {
    bindings: FxHashMap<String, TurnId>,
    ended: FxHashMap<String, JobEnd>,
    unbound: VecDeque<Waiting>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A turn was sent with `request_id` and will eventually be answered by one job.
    pub fn register_turn(&mut self, turn: TurnId, request_id: &str) {
        self.unbound.push_back(Waiting { turn, request_id: request_id.to_string(), superseded: false });
    }

    /// Turn for `job_id`, binding it if the job is new.
    ///
    /// An echoed `request_id` picks the turn directly; a request id this
    /// client never sent means the job is not ours. Without one the job takes
    /// the oldest waiting slot. Returns None for ended jobs, for foreign jobs,
    /// for jobs with no turn to bind to, and for jobs that land on a
    /// superseded slot (those are recorded as superseded).
    pub fn bind(&mut self, job_id: &str, request_id: Option<&str>) -> Option<TurnId> {
        if self.ended.contains_key(job_id) {
            return None;
        }
        if let Some(turn) = self.bindings.get(job_id) {
            return Some(*turn);
        }
        let slot = match request_id {
            Some(request_id) => {
                let pos = self.unbound.iter().position(|w| w.request_id == request_id)?;
                self.unbound.remove(pos)?
            }
            None => self.unbound.pop_front()?,
        };
        if slot.superseded {
            log::debug!("Job {} belongs to {}, which a rollback superseded", job_id, slot.turn);
            self.ended.insert(job_id.to_string(), JobEnd::Superseded);
            return None;
        }
        self.bindings.insert(job_id.to_string(), slot.turn);
        Some(slot.turn)
    }

    pub fn turn_of(&self, job_id: &str) -> Option<TurnId> {
        self.bindings.get(job_id).copied()
    }

    pub fn job_of(&self, turn: TurnId) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, t)| **t == turn)
            .map(|(job, _)| job.as_str())
    }

    pub fn ended(&self, job_id: &str) -> Option<JobEnd> {
        self.ended.get(job_id).copied()
    }

    pub fn is_ended(&self, job_id: &str) -> bool {
        self.ended.contains_key(job_id)
    }

    /// Record that a job will deliver nothing more and return its turn.
    ///
    /// A job never seen before only reaches a turn through an echoed request
    /// id. Without one the end is recorded and no waiting turn is touched,
    /// since the job may belong to another client.
    pub fn end(&mut self, job_id: &str, request_id: Option<&str>, how: JobEnd) -> Option<TurnId> {
        let turn = match (self.turn_of(job_id), request_id) {
            (Some(turn), _) => Some(turn),
            (None, Some(request_id)) => self.bind(job_id, Some(request_id)),
            (None, None) => None,
        };
        self.ended.entry(job_id.to_string()).or_insert(how);
        turn
    }

    /// Oldest slot still waiting for its job, removed from the queue.
    /// Superseded slots are returned too; their turn is already closed.
    pub fn take_oldest_unbound(&mut self) -> Option<TurnId> {
        self.unbound.pop_front().map(|w| w.turn)
    }

    /// Number of sent turns whose job has not been seen.
    pub fn waiting(&self) -> usize {
        self.unbound.iter().filter(|w| !w.superseded).count()
    }

    /// End every job older than `boundary` and mark waiting turns older than
    /// it as superseded. Returns the affected turns.
    pub fn supersede_before(&mut self, boundary: TurnId) -> Vec<TurnId> {
        let mut affected = Vec::new();
        let jobs: Vec<(String, TurnId)> = self
            .bindings
            .iter()
            .filter(|(job, t)| **t < boundary && !self.ended.contains_key(job.as_str()))
            .map(|(job, t)| (job.clone(), *t))
            .collect();
        for (job, turn) in jobs {
            self.ended.insert(job, JobEnd::Superseded);
            affected.push(turn);
        }
        for waiting in self.unbound.iter_mut() {
            if waiting.turn < boundary && !waiting.superseded {
                waiting.superseded = true;
                affected.push(waiting.turn);
            }
        }
        affected.sort();
        affected
    }
}
