//! FIFO admission under a concurrency limit.

use std::collections::VecDeque;

use vitrine_engine::surface::SurfaceConfig;

use crate::registry::InFlightRegistry;

/// One queued render, identified by its asset reference.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Job {
    pub key: String,
    /// Options in effect when the job was queued.
    pub config: SurfaceConfig,
    /// Generation of the pending entry this job was queued for.
    pub generation: u64,
}

#[derive(Debug)]
pub(crate) struct Scheduler {
    queue: VecDeque<Job>,
    active: usize,
    max_concurrent: usize,
}

impl Scheduler {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            active: 0,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn enqueue(&mut self, job: Job) {
        self.queue.push_back(job);
    }

    /// Dequeues the next job that may start now and counts it as active.
    ///
    /// Jobs whose pending entry is gone (cancelled), already running, or was
    /// replaced by a later request are dropped on the way.
    pub fn admit(&mut self, registry: &mut InFlightRegistry) -> Option<Job> {
        while self.active < self.max_concurrent {
            let job = self.queue.pop_front()?;
            if !registry.start(&job.key, job.generation) {
                log::debug!("skipping orphaned job for {}", job.key);
                continue;
            }
            self.active += 1;
            log::debug!(
                "admitted {} ({} active, {} queued)",
                job.key,
                self.active,
                self.queue.len()
            );
            return Some(job);
        }
        None
    }

    pub fn finish(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(key: &str, generation: u64) -> Job {
        Job {
            key: key.to_owned(),
            config: SurfaceConfig::default(),
            generation,
        }
    }

    fn register(sched: &mut Scheduler, reg: &mut InFlightRegistry, key: &str) -> u64 {
        let (_, generation) = reg.register(key);
        sched.enqueue(job(key, generation));
        generation
    }

    fn queued(keys: &[&str], max: usize) -> (Scheduler, InFlightRegistry) {
        let mut sched = Scheduler::new(max);
        let mut reg = InFlightRegistry::default();
        for key in keys {
            register(&mut sched, &mut reg, key);
        }
        (sched, reg)
    }

    #[test]
    fn admits_in_fifo_order_up_to_limit() {
        let (mut sched, mut reg) = queued(&["a", "b", "c"], 1);

        assert_eq!(sched.admit(&mut reg).map(|j| j.key), Some("a".into()));
        assert_eq!(sched.admit(&mut reg), None);
        assert_eq!(sched.active(), 1);

        sched.finish();
        assert_eq!(sched.admit(&mut reg).map(|j| j.key), Some("b".into()));
        sched.finish();
        assert_eq!(sched.admit(&mut reg).map(|j| j.key), Some("c".into()));
        assert_eq!(sched.queued(), 0);
    }

    #[test]
    fn higher_limit_admits_several() {
        let (mut sched, mut reg) = queued(&["a", "b", "c"], 2);
        assert!(sched.admit(&mut reg).is_some());
        assert!(sched.admit(&mut reg).is_some());
        assert!(sched.admit(&mut reg).is_none());
        assert_eq!(sched.queued(), 1);
    }

    #[test]
    fn skips_cancelled_jobs() {
        let (mut sched, mut reg) = queued(&["a", "b"], 1);
        assert!(reg.cancel("a"));

        assert_eq!(sched.admit(&mut reg).map(|j| j.key), Some("b".into()));
        assert_eq!(sched.queued(), 0);
    }

    #[test]
    fn skips_duplicate_jobs_for_running_entry() {
        let (mut sched, mut reg) = queued(&["a"], 2);
        sched.enqueue(job("a", 0));

        assert!(sched.admit(&mut reg).is_some());
        assert!(sched.admit(&mut reg).is_none());
        assert_eq!(sched.active(), 1);
    }

    #[test]
    fn re_requested_key_runs_with_its_new_config() {
        let mut sched = Scheduler::new(1);
        let mut reg = InFlightRegistry::default();
        register(&mut sched, &mut reg, "a");
        register(&mut sched, &mut reg, "b");
        assert!(reg.cancel("b"));

        let (_, generation) = reg.register("b");
        let wide = SurfaceConfig {
            width: 256,
            ..SurfaceConfig::default()
        };
        sched.enqueue(Job {
            key: "b".into(),
            config: wide,
            generation,
        });

        assert_eq!(sched.admit(&mut reg).map(|j| j.key), Some("a".into()));
        sched.finish();
        let admitted = sched.admit(&mut reg).expect("re-requested job");
        assert_eq!(admitted.generation, generation);
        assert_eq!(admitted.config, wide);
        assert_eq!(sched.queued(), 0);
    }

    #[test]
    fn zero_limit_still_admits_one() {
        let (mut sched, mut reg) = queued(&["a"], 0);
        assert!(sched.admit(&mut reg).is_some());
    }
}
