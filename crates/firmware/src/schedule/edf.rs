//! Per-core EDF scheduler.
//!
//! Tasks are kept in a fixed table. Every tick:
//!
//! 1. budgeted tasks get their cycle budget for this systick, capped at one
//!    budget of credit;
//! 2. tasks whose deadline has passed and whose balance is positive are
//!    run in `(deadline, priority, registration)` order;
//! 3. cycles spent are charged to the task, so an overrun eats into the
//!    following systicks;
//! 4. recurring tasks move to their next deadline, one-shot tasks leave.

use platform::CycleCounter;

use super::task::{TaskDesc, TaskStats};
use super::{ScheduleError, TaskDispatch};

struct Task {
    desc: TaskDesc,
    seq: u32,
    deadline: u64,
    balance: i64,
    last_systick: u64,
    done: bool,
    stats: TaskStats,
}

impl Task {
    fn grant(&mut self, systick: u64) {
        if self.desc.budget == 0 || self.last_systick == systick {
            return;
        }
        let budget = i64::from(self.desc.budget);
        self.balance = self.balance.saturating_add(budget).min(budget);
        self.last_systick = systick;
    }

    fn eligible(&self) -> bool {
        self.desc.budget == 0 || self.balance > 0
    }

    fn charge(&mut self, used: u64) {
        if self.desc.budget == 0 {
            return;
        }
        self.balance = self
            .balance
            .saturating_sub(i64::try_from(used).unwrap_or(i64::MAX));
        if used > u64::from(self.desc.budget) {
            self.stats.overruns = self.stats.overruns.saturating_add(1);
            warn!(
                "edf: task {} used {} of {} cycles",
                self.desc.uid, used, self.desc.budget
            );
        }
    }

    /// Move to the deadline after `now`, counting the ones skipped.
    fn rearm(&mut self, now: u64) {
        if self.desc.is_one_shot() {
            self.done = true;
            return;
        }
        let period = self.desc.period;
        self.deadline = self.deadline.saturating_add(period);
        if self.deadline <= now {
            let behind = now.saturating_sub(self.deadline);
            let missed = behind.checked_div(period).unwrap_or(0).saturating_add(1);
            self.deadline = self.deadline.saturating_add(missed.saturating_mul(period));
            self.stats.misses = self
                .stats
                .misses
                .saturating_add(u32::try_from(missed).unwrap_or(u32::MAX));
            warn!("edf: task {} missed {} deadlines", self.desc.uid, missed);
        }
    }
}

/// EDF scheduler for one core holding up to `N` tasks.
pub struct EdfScheduler<'c, const N: usize> {
    core: u32,
    cycles: &'c dyn CycleCounter,
    tasks: heapless::Vec<Task, N>,
    systick: u64,
    next_seq: u32,
}

impl<'c, const N: usize> EdfScheduler<'c, N> {
    /// Empty scheduler for `core`, charging budgets with `cycles`.
    pub fn new(core: u32, cycles: &'c dyn CycleCounter) -> Self {
        Self {
            core,
            cycles,
            tasks: heapless::Vec::new(),
            systick: 0,
            next_seq: 0,
        }
    }

    /// Core this scheduler runs on.
    pub fn core(&self) -> u32 {
        self.core
    }

    /// Ticks processed so far.
    pub fn systick(&self) -> u64 {
        self.systick
    }

    /// Queue a task.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::InvalidArgument`] if the task is pinned to another
    ///   core.
    /// - [`ScheduleError::Busy`] if a task with the same id is queued.
    /// - [`ScheduleError::NoResource`] if the table is full.
    pub fn register(&mut self, desc: TaskDesc) -> Result<(), ScheduleError> {
        if desc.core != self.core {
            error!("edf {}: task {} is pinned to core {}", self.core, desc.uid, desc.core);
            return Err(ScheduleError::InvalidArgument);
        }
        if self.tasks.iter().any(|t| t.desc.uid == desc.uid) {
            return Err(ScheduleError::Busy);
        }
        self.tasks
            .push(Task {
                desc,
                seq: self.next_seq,
                deadline: desc.start,
                balance: 0,
                last_systick: self.systick,
                done: false,
                stats: TaskStats::default(),
            })
            .map_err(|_| ScheduleError::NoResource)?;
        self.next_seq = self.next_seq.wrapping_add(1);
        debug!(
            "edf {}: task {} first deadline {} period {}",
            self.core, desc.uid, desc.start, desc.period
        );
        Ok(())
    }

    /// Remove a task. Returns its final counters.
    pub fn cancel(&mut self, uid: u32) -> Result<TaskStats, ScheduleError> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.desc.uid == uid)
            .ok_or(ScheduleError::NotFound)?;
        let task = self.tasks.remove(idx);
        debug!("edf {}: task {} cancelled", self.core, uid);
        Ok(task.stats)
    }

    /// Counters of task `uid`.
    pub fn stats(&self, uid: u32) -> Option<TaskStats> {
        self.task(uid).map(|t| t.stats)
    }

    /// Remaining cycle credit of task `uid`.
    pub fn balance(&self, uid: u32) -> Option<i64> {
        self.task(uid).map(|t| t.balance)
    }

    /// Current deadline of task `uid`.
    pub fn deadline(&self, uid: u32) -> Option<u64> {
        self.task(uid).map(|t| t.deadline)
    }

    /// Earliest deadline of any queued task.
    pub fn next_deadline(&self) -> Option<u64> {
        self.tasks.iter().map(|t| t.deadline).min()
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// `true` without queued tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every due task once. Returns the number of tasks run.
    pub fn tick(&mut self, now: u64, dispatch: &mut dyn TaskDispatch) -> usize {
        self.systick = self.systick.wrapping_add(1);
        let systick = self.systick;
        for task in &mut self.tasks {
            task.grant(systick);
        }

        let mut due: heapless::Vec<(u64, u8, u32, u32), N> = heapless::Vec::new();
        for t in self.tasks.iter().filter(|t| t.deadline <= now && t.eligible()) {
            // Cannot overflow: at most one entry per task.
            let _ = due.push((t.deadline, t.desc.priority, t.seq, t.desc.uid));
        }
        due.sort_unstable();

        let mut ran = 0usize;
        for &(_, _, _, uid) in &due {
            let Some(task) = self.tasks.iter_mut().find(|t| t.desc.uid == uid) else {
                continue;
            };
            trace!("edf {}: run task {} deadline {}", self.core, uid, task.deadline);

            let start = self.cycles.cycles();
            let result = dispatch.run(task.desc.work);
            let used = self.cycles.cycles().saturating_sub(start);

            task.stats.runs = task.stats.runs.saturating_add(1);
            if let Err(e) = result {
                task.stats.errors = task.stats.errors.saturating_add(1);
                warn!("edf {}: task {} failed: {}", self.core, uid, e);
            }
            task.charge(used);
            task.rearm(now);
            ran = ran.saturating_add(1);
        }

        self.tasks.retain(|t| !t.done);
        ran
    }

    fn task(&self, uid: u32) -> Option<&Task> {
        self.tasks.iter().find(|t| t.desc.uid == uid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use pipeline::CompError;
    use platform::mocks::MockCycleCounter;

    /// Records work items and burns a fixed number of cycles per run.
    struct Recorder<'c> {
        ran: heapless::Vec<u32, 32>,
        cycles: &'c MockCycleCounter,
        cost: u64,
        fail: bool,
    }

    impl<'c> Recorder<'c> {
        fn new(cycles: &'c MockCycleCounter, cost: u64) -> Self {
            Self {
                ran: heapless::Vec::new(),
                cycles,
                cost,
                fail: false,
            }
        }
    }

    impl TaskDispatch for Recorder<'_> {
        fn run(&mut self, work: u32) -> Result<u32, CompError> {
            let _ = self.ran.push(work);
            self.cycles.advance(self.cost);
            if self.fail {
                Err(CompError::Timeout)
            } else {
                Ok(0)
            }
        }
    }

    fn task(uid: u32, start: u64, period: u64) -> TaskDesc {
        TaskDesc {
            uid,
            core: 0,
            priority: 0,
            start,
            period,
            budget: 0,
            work: uid,
        }
    }

    #[test]
    fn due_tasks_run_in_deadline_order() {
        let cycles = MockCycleCounter::new();
        let mut edf: EdfScheduler<'_, 8> = EdfScheduler::new(0, &cycles);
        edf.register(task(1, 300, 1000)).unwrap();
        edf.register(task(2, 100, 1000)).unwrap();
        edf.register(task(3, 200, 1000)).unwrap();
        edf.register(task(4, 900, 1000)).unwrap();

        let mut rec = Recorder::new(&cycles, 0);
        assert_eq!(edf.tick(300, &mut rec), 3);
        assert_eq!(rec.ran.as_slice(), &[2, 3, 1]);
        assert_eq!(edf.deadline(2), Some(1100));
    }

    #[test]
    fn ties_break_on_priority_then_registration() {
        let cycles = MockCycleCounter::new();
        let mut edf: EdfScheduler<'_, 8> = EdfScheduler::new(0, &cycles);
        let mut low = task(1, 100, 1000);
        low.priority = 5;
        edf.register(low).unwrap();
        edf.register(task(2, 100, 1000)).unwrap();
        edf.register(task(3, 100, 1000)).unwrap();

        let mut rec = Recorder::new(&cycles, 0);
        edf.tick(100, &mut rec);
        assert_eq!(rec.ran.as_slice(), &[2, 3, 1]);
    }

    #[test]
    fn overrun_is_charged_against_later_ticks() {
        let cycles = MockCycleCounter::new();
        let mut edf: EdfScheduler<'_, 4> = EdfScheduler::new(0, &cycles);
        let mut t = task(1, 0, 10);
        t.budget = 100;
        edf.register(t).unwrap();

        let mut rec = Recorder::new(&cycles, 250);
        let mut now = 0;
        let mut pattern = heapless::Vec::<usize, 8>::new();
        for _ in 0..6 {
            pattern.push(edf.tick(now, &mut rec)).unwrap();
            now += 10;
        }
        // 100 - 250 = -150, then -50 waits, +50 runs (-200), -100 and 0
        // wait, 100 runs.
        assert_eq!(pattern.as_slice(), &[1, 0, 1, 0, 0, 1]);
        assert_eq!(edf.stats(1).map(|s| s.overruns), Some(3));
        assert!(edf.stats(1).is_some_and(|s| s.misses > 0));
    }

    #[test]
    fn unused_budget_does_not_accumulate() {
        let cycles = MockCycleCounter::new();
        let mut edf: EdfScheduler<'_, 4> = EdfScheduler::new(0, &cycles);
        let mut t = task(1, 1_000_000, 10);
        t.budget = 100;
        edf.register(t).unwrap();

        let mut rec = Recorder::new(&cycles, 0);
        for now in 0..20 {
            edf.tick(now, &mut rec);
        }
        assert_eq!(edf.balance(1), Some(100));
        assert!(rec.ran.is_empty());
    }

    #[test]
    fn one_shot_task_leaves_the_queue() {
        let cycles = MockCycleCounter::new();
        let mut edf: EdfScheduler<'_, 4> = EdfScheduler::new(0, &cycles);
        edf.register(task(7, 50, 0)).unwrap();
        let mut rec = Recorder::new(&cycles, 0);
        assert_eq!(edf.tick(10, &mut rec), 0);
        assert_eq!(edf.tick(50, &mut rec), 1);
        assert!(edf.is_empty());
        assert_eq!(edf.tick(100, &mut rec), 0);
    }

    #[test]
    fn late_tick_counts_missed_deadlines() {
        let cycles = MockCycleCounter::new();
        let mut edf: EdfScheduler<'_, 4> = EdfScheduler::new(0, &cycles);
        edf.register(task(1, 0, 100)).unwrap();
        let mut rec = Recorder::new(&cycles, 0);
        edf.tick(350, &mut rec);
        assert_eq!(edf.deadline(1), Some(400));
        assert_eq!(edf.stats(1).map(|s| s.misses), Some(3));
        assert_eq!(edf.next_deadline(), Some(400));
    }

    #[test]
    fn failures_do_not_change_scheduling() {
        let cycles = MockCycleCounter::new();
        let mut edf: EdfScheduler<'_, 4> = EdfScheduler::new(0, &cycles);
        edf.register(task(1, 0, 100)).unwrap();
        let mut rec = Recorder::new(&cycles, 0);
        rec.fail = true;
        edf.tick(0, &mut rec);
        edf.tick(100, &mut rec);
        assert_eq!(edf.deadline(1), Some(200));
        assert_eq!(edf.stats(1).map(|s| (s.runs, s.errors)), Some((2, 2)));
    }

    #[test]
    fn registration_rules() {
        let cycles = MockCycleCounter::new();
        let mut edf: EdfScheduler<'_, 2> = EdfScheduler::new(1, &cycles);
        assert_eq!(edf.register(task(1, 0, 10)), Err(ScheduleError::InvalidArgument));

        let mut t = task(1, 0, 10);
        t.core = 1;
        edf.register(t).unwrap();
        assert_eq!(edf.register(t), Err(ScheduleError::Busy));
        t.uid = 2;
        edf.register(t).unwrap();
        t.uid = 3;
        assert_eq!(edf.register(t), Err(ScheduleError::NoResource));

        assert_eq!(edf.cancel(9), Err(ScheduleError::NotFound));
        assert!(edf.cancel(1).is_ok());
        assert_eq!(edf.len(), 1);
    }
}
