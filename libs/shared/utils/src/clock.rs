use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Source of the current instant. Injected so "now"-dependent rules can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The clinic's wall clock: an instant source plus the clinic's UTC offset.
#[derive(Clone)]
pub struct ClinicClock {
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl ClinicClock {
    pub fn new(clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self { clock, offset }
    }

    pub fn system(offset: FixedOffset) -> Self {
        Self::new(Arc::new(SystemClock), offset)
    }

    /// Pins "now" to a clinic-local wall time, e.g. 19:45 on a given date.
    pub fn fixed_local(local: NaiveDateTime, offset: FixedOffset) -> Self {
        let instant = local - offset;
        Self::new(Arc::new(FixedClock(instant.and_utc())), offset)
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn now_local(&self) -> NaiveDateTime {
        self.clock.now().with_timezone(&self.offset).naive_local()
    }

    pub fn today(&self) -> NaiveDate {
        self.now_local().date()
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl fmt::Debug for ClinicClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClinicClock")
            .field("offset", &self.offset)
            .field("now_local", &self.now_local())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    fn dhaka() -> FixedOffset {
        FixedOffset::east_opt(6 * 3600).unwrap()
    }

    #[test]
    fn local_date_rolls_over_before_utc() {
        // 20:30 UTC is already 02:30 the next day in Dhaka.
        let instant = Utc.with_ymd_and_hms(2026, 3, 1, 20, 30, 0).unwrap();
        let clock = ClinicClock::new(Arc::new(FixedClock(instant)), dhaka());

        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(clock.now_local().time(), NaiveTime::from_hms_opt(2, 30, 0).unwrap());
    }

    #[test]
    fn fixed_local_round_trips_wall_time() {
        let local = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(19, 45, 0).unwrap();
        let clock = ClinicClock::fixed_local(local, dhaka());

        assert_eq!(clock.now_local(), local);
        assert_eq!(clock.now_utc(), Utc.with_ymd_and_hms(2026, 3, 1, 13, 45, 0).unwrap());
    }
}
