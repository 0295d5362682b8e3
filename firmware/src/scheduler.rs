//! Cooperative periodic scheduler.
//!
//! Tasks run to completion in registration order whenever their period
//! has elapsed. There is no preemption: a slow task delays the others.

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use log::debug;

/// Monotonic millisecond tick, wrapping at `u32::MAX`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

pub trait Task {
    fn period_ms(&self) -> u32;

    fn run(&mut self, now_ms: u32);

    fn name(&self) -> &'static str {
        "task"
    }
}

struct Entry<'a> {
    task: &'a mut dyn Task,
    last_run: u32,
}

pub struct Scheduler<'a, const N: usize> {
    tasks: Vec<Entry<'a>, N>,
}

impl<'a, const N: usize> Scheduler<'a, N> {
    pub const fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Register a task; it first runs one period after tick 0.
    /// Hands the task back when the scheduler is full.
    pub fn add(&mut self, task: &'a mut dyn Task) -> Result<(), &'a mut dyn Task> {
        debug!("scheduler: {} every {} ms", task.name(), task.period_ms());
        self.tasks
            .push(Entry { task, last_run: 0 })
            .map_err(|entry| entry.task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every due task once. Returns how many ran.
    pub fn poll(&mut self, now_ms: u32) -> usize {
        let mut ran = 0;
        for entry in self.tasks.iter_mut() {
            if now_ms.wrapping_sub(entry.last_run) >= entry.task.period_ms() {
                entry.last_run = now_ms;
                entry.task.run(now_ms);
                ran += 1;
            }
        }
        ran
    }

    /// Poll forever, idling `idle_ms` between polls.
    pub fn run<C, D>(&mut self, clock: &C, delay: &mut D, idle_ms: u32) -> !
    where
        C: Clock,
        D: DelayNs,
    {
        loop {
            self.poll(clock.now_ms());
            delay.delay_ms(idle_ms);
        }
    }
}

impl<const N: usize> Default for Scheduler<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        period: u32,
        runs: std::vec::Vec<u32>,
    }

    impl Counter {
        fn new(period: u32) -> Self {
            Self {
                period,
                runs: std::vec::Vec::new(),
            }
        }
    }

    impl Task for Counter {
        fn period_ms(&self) -> u32 {
            self.period
        }

        fn run(&mut self, now_ms: u32) {
            self.runs.push(now_ms);
        }
    }

    #[test]
    fn test_runs_when_period_elapsed() {
        let mut fast = Counter::new(10);
        let mut slow = Counter::new(25);
        {
            let mut sched: Scheduler<'_, 2> = Scheduler::new();
            sched.add(&mut fast).unwrap_or_else(|_| panic!("full"));
            sched.add(&mut slow).unwrap_or_else(|_| panic!("full"));
            for now in 0..=50 {
                sched.poll(now);
            }
        }
        assert_eq!(fast.runs, vec![10, 20, 30, 40, 50]);
        assert_eq!(slow.runs, vec![25, 50]);
    }

    #[test]
    fn test_late_poll_runs_once() {
        let mut task = Counter::new(10);
        {
            let mut sched: Scheduler<'_, 1> = Scheduler::new();
            sched.add(&mut task).unwrap_or_else(|_| panic!("full"));
            assert_eq!(sched.poll(35), 1);
            assert_eq!(sched.poll(36), 0);
            assert_eq!(sched.poll(45), 1);
        }
        assert_eq!(task.runs, vec![35, 45]);
    }

    #[test]
    fn test_tick_wraparound() {
        let mut task = Counter::new(10);
        {
            let mut sched: Scheduler<'_, 1> = Scheduler::new();
            sched.add(&mut task).unwrap_or_else(|_| panic!("full"));
            sched.poll(u32::MAX - 4);
            assert_eq!(sched.poll(2), 0);
            assert_eq!(sched.poll(5), 1);
        }
        assert_eq!(task.runs, vec![u32::MAX - 4, 5]);
    }

    #[test]
    fn test_full_scheduler_returns_task() {
        let mut a = Counter::new(1);
        let mut b = Counter::new(1);
        let mut sched: Scheduler<'_, 1> = Scheduler::new();
        assert!(sched.add(&mut a).is_ok());
        assert!(sched.add(&mut b).is_err());
        assert_eq!(sched.len(), 1);
    }
}
