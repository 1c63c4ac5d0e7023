//! Task descriptions.

use pipeline::{CompDesc, StreamParams};
use platform::ClockInfo;

use super::ScheduleError;

/// What to run, on which core, and how often.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskDesc {
    /// Unique task id.
    pub uid: u32,
    /// Core the task is pinned to.
    pub core: u32,
    /// Tie-break between equal deadlines; lower runs first.
    pub priority: u8,
    /// First deadline in timer ticks.
    pub start: u64,
    /// Ticks between deadlines; zero for a one-shot task.
    pub period: u64,
    /// Cycles per systick; zero for an unbudgeted task.
    pub budget: u32,
    /// Opaque work item handed to the dispatcher.
    pub work: u32,
}

impl TaskDesc {
    /// Recurring task running `comp`'s `copy` once per stream period.
    ///
    /// The period is the time one `params.period_bytes` block lasts at the
    /// stream rate, converted to ticks of `clock`.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidArgument`] for a zero rate or frame size, or a
    /// period shorter than one tick.
    pub fn for_stage(
        uid: u32,
        comp: &CompDesc,
        params: &StreamParams,
        clock: &ClockInfo,
        start: u64,
    ) -> Result<Self, ScheduleError> {
        let frame_bytes = u32::from(params.channels).saturating_mul(u32::from(params.container_bytes));
        let frames = params
            .period_bytes
            .checked_div(frame_bytes)
            .ok_or(ScheduleError::InvalidArgument)?;
        let period = u64::from(frames)
            .saturating_mul(clock.ms_to_ticks(1000))
            .checked_div(u64::from(params.rate))
            .filter(|&p| p > 0)
            .ok_or(ScheduleError::InvalidArgument)?;

        Ok(Self {
            uid,
            core: comp.core,
            priority: 0,
            start,
            period,
            budget: 0,
            work: comp.id,
        })
    }

    /// `true` for a task that runs once.
    pub fn is_one_shot(&self) -> bool {
        self.period == 0
    }
}

/// Per-task counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskStats {
    /// Times the task ran.
    pub runs: u32,
    /// Deadlines that passed before the task could run again.
    pub misses: u32,
    /// Runs that used more cycles than one budget.
    pub overruns: u32,
    /// Runs whose work item returned an error.
    pub errors: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pipeline::{CompType, StreamDirection};
    use platform::FreqEntry;

    fn comp() -> CompDesc {
        CompDesc {
            id: 4,
            comp_type: CompType::Host,
            pipeline_id: 1,
            core: 0,
            direction: StreamDirection::Playback,
            dma_id: 0,
        }
    }

    fn params(period_bytes: u32) -> StreamParams {
        StreamParams {
            direction: StreamDirection::Playback,
            rate: 48_000,
            channels: 2,
            container_bytes: 2,
            period_bytes,
        }
    }

    #[test]
    fn one_millisecond_period() {
        let clock = ClockInfo::from_entry(FreqEntry::new(38_400_000));
        let t = TaskDesc::for_stage(1, &comp(), &params(192), &clock, 10).unwrap();
        assert_eq!(t.period, 38_400);
        assert_eq!((t.work, t.start, t.core), (4, 10, 0));
        assert!(!t.is_one_shot());
    }

    #[test]
    fn zero_rate_is_rejected() {
        let clock = ClockInfo::from_entry(FreqEntry::new(38_400_000));
        let mut p = params(192);
        p.rate = 0;
        assert_eq!(TaskDesc::for_stage(1, &comp(), &p, &clock, 0), Err(ScheduleError::InvalidArgument));
        p = params(192);
        p.channels = 0;
        assert_eq!(TaskDesc::for_stage(1, &comp(), &p, &clock, 0), Err(ScheduleError::InvalidArgument));
    }
}
