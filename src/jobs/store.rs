use std::collections::HashMap;
use std::sync::RwLock;

use super::job::{Job, JobId};

/// Process-lifetime job table shared by submitters, ramp tickers and
/// encoder supervisors. Every mutation goes through `update_if_exists`, so a
/// read-modify-write on one job is atomic with respect to the others.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        // Recover from poisoned lock; a job record is always left consistent
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        jobs.insert(job.id.clone(), job);
    }

    /// Apply `f` to the job under the write lock. Returns `None` for unknown ids.
    pub fn update_if_exists<R>(&self, id: &JobId, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        jobs.get_mut(id).map(f)
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::job::JobStatus;

    #[test]
    fn update_only_touches_known_ids() {
        let store = JobStore::new();
        let id = JobId::from("known");
        store.insert(Job::running(id.clone()));

        assert_eq!(store.update_if_exists(&id, |job| job.advance()), Some(true));
        assert_eq!(store.update_if_exists(&JobId::from("other"), |job| job.advance()), None);
        assert_eq!(store.len(), 1);

        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.progress > 0.0);
    }

    #[test]
    fn get_returns_a_snapshot() {
        let store = JobStore::new();
        let id = JobId::from("snap");
        store.insert(Job::running(id.clone()));

        let before = store.get(&id).unwrap();
        store.update_if_exists(&id, |job| job.fail("x".into()));

        assert_eq!(before.status, JobStatus::Running);
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Failed);
        assert!(store.get(&JobId::from("missing")).is_none());
    }
}
