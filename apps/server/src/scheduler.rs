//! Daily trigger for the subscriber notification.

use chrono::{DateTime, Days, LocalResult, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::future::Future;
use tokio::sync::watch;
use tracing::{error, info};

/// A wall-clock time of day in a fixed timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
    timezone: Tz,
}

impl DailySchedule {
    /// `None` if hour or minute is out of range.
    pub fn new(hour: u32, minute: u32, timezone: Tz) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(|at| Self { at, timezone })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First fire instant strictly after `now`.
    ///
    /// A day on which the local time does not exist (DST gap) is skipped.
    /// When the local time occurs twice, the earlier instant is used.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.with_timezone(&self.timezone).date_naive();

        (0..=7u64).find_map(|offset| {
            let date = today.checked_add_days(Days::new(offset))?;
            let local = match self.timezone.from_local_datetime(&date.and_time(self.at)) {
                LocalResult::Single(t) => t,
                LocalResult::Ambiguous(earliest, _) => earliest,
                LocalResult::None => return None,
            };
            let candidate = local.with_timezone(&Utc);
            (candidate > now).then_some(candidate)
        })
    }
}

/// Run `job` at every fire time of `schedule` until `shutdown` flips.
///
/// Each run is spawned so a slow round never delays the next trigger;
/// overlapping rounds are rejected by the job itself.
pub async fn run_daily<F, Fut>(schedule: DailySchedule, job: F, mut shutdown: watch::Receiver<bool>)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut last_fired: Option<DateTime<Utc>> = None;

    loop {
        let now = last_fired.map_or_else(Utc::now, |fired| Utc::now().max(fired));
        let Some(next) = schedule.next_after(now) else {
            error!("No valid fire time in the next week, scheduler stopping");
            return;
        };

        info!(
            next = %next.with_timezone(&schedule.timezone()).format("%Y-%m-%d %H:%M %Z"),
            "Next daily notification scheduled"
        );
        let wait = (next - Utc::now()).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                info!("Scheduler stopped");
                return;
            }
        }

        last_fired = Some(next);
        tokio::spawn(job());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_next_after_same_day_and_next_day() {
        let schedule = DailySchedule::new(8, 0, chrono_tz::America::Guatemala).unwrap();

        // 07:00 local
        assert_eq!(schedule.next_after(utc(2025, 3, 14, 13, 0)), Some(utc(2025, 3, 14, 14, 0)));
        // 08:00 local exactly fires tomorrow
        assert_eq!(schedule.next_after(utc(2025, 3, 14, 14, 0)), Some(utc(2025, 3, 15, 14, 0)));
        // 23:30 local on the 14th is 05:30 UTC on the 15th
        assert_eq!(schedule.next_after(utc(2025, 3, 15, 5, 30)), Some(utc(2025, 3, 15, 14, 0)));
    }

    #[test]
    fn test_next_after_skips_dst_gap() {
        // 02:30 does not exist in New York on 2025-03-09.
        let schedule = DailySchedule::new(2, 30, chrono_tz::America::New_York).unwrap();
        let now = utc(2025, 3, 9, 5, 0);

        // 02:30 EDT on the 10th
        assert_eq!(schedule.next_after(now), Some(utc(2025, 3, 10, 6, 30)));
    }

    #[test]
    fn test_next_after_ambiguous_time_uses_earliest() {
        // 01:30 happens twice in New York on 2025-11-02.
        let schedule = DailySchedule::new(1, 30, chrono_tz::America::New_York).unwrap();
        let now = utc(2025, 11, 2, 4, 0);

        assert_eq!(schedule.next_after(now), Some(utc(2025, 11, 2, 5, 30)));
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(DailySchedule::new(24, 0, chrono_tz::UTC).is_none());
        assert!(DailySchedule::new(8, 60, chrono_tz::UTC).is_none());
    }

    #[tokio::test]
    async fn test_run_daily_stops_on_shutdown() {
        let schedule = DailySchedule::new(8, 0, chrono_tz::UTC).unwrap();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_daily(schedule, || async {}, rx));
        tx.send(true).unwrap();

        let finished = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(finished.is_ok());
    }
}
