//! Per-core tick loop.
//!
//! One embassy task per core owns that core's [`EdfScheduler`] and wakes on
//! a fixed-period [`Ticker`]. There is no cross-core traffic: tasks are pinned
//! at registration.

use embassy_time::{Duration, Ticker};
use platform::PlatformTimer;

use super::{EdfScheduler, TaskDispatch};

/// Drive `sched` for `ticks` ticks of length `period`.
///
/// Returns the number of task runs.
pub async fn run_for<const N: usize>(
    sched: &mut EdfScheduler<'_, N>,
    dispatch: &mut dyn TaskDispatch,
    timer: &dyn PlatformTimer,
    period: Duration,
    ticks: u32,
) -> usize {
    let mut ticker = Ticker::every(period);
    let mut ran = 0usize;
    for _ in 0..ticks {
        ticker.next().await;
        ran = ran.saturating_add(sched.tick(timer.now(), dispatch));
    }
    ran
}

/// Drive `sched` until the system resets.
pub async fn run_forever<const N: usize>(
    sched: &mut EdfScheduler<'_, N>,
    dispatch: &mut dyn TaskDispatch,
    timer: &dyn PlatformTimer,
    period: Duration,
) -> ! {
    info!("edf {}: tick loop every {} us", sched.core(), period.as_micros());
    let mut ticker = Ticker::every(period);
    loop {
        ticker.next().await;
        sched.tick(timer.now(), dispatch);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schedule::TaskDesc;
    use pipeline::CompError;
    use platform::mocks::SteppingTimer;
    use platform::{EmbassyCycleCounter, PlatformConfig};

    struct Count(u32);

    impl TaskDispatch for Count {
        fn run(&mut self, _work: u32) -> Result<u32, CompError> {
            self.0 = self.0.saturating_add(1);
            Ok(0)
        }
    }

    #[tokio::test]
    async fn loop_runs_task_every_tick() {
        let cycles = EmbassyCycleCounter::new(&PlatformConfig::default());
        // One platform millisecond per timer read.
        let timer = SteppingTimer::new(0, 38_400);
        let mut edf: EdfScheduler<'_, 2> = EdfScheduler::new(0, &cycles);
        edf.register(TaskDesc {
            uid: 1,
            core: 0,
            priority: 0,
            start: 0,
            period: 38_400,
            budget: 0,
            work: 0,
        })
        .unwrap();

        let mut count = Count(0);
        let ran = run_for(&mut edf, &mut count, &timer, Duration::from_millis(1), 5).await;
        assert_eq!(ran, 5);
        assert_eq!(count.0, 5);
        assert_eq!(edf.systick(), 5);
        assert_eq!(edf.stats(1).map(|s| s.misses), Some(0));
    }
}
