use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{ProcflowError, Result};

/// Periodic execution settings of a process.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub frequency: u64,
    pub frequency_unit: String,
}

impl Schedule {
    pub fn new(
        frequency: u64,
        frequency_unit: &str,
    ) -> Self {
        Self {
            frequency,
            frequency_unit: frequency_unit.to_string(),
        }
    }

    /// Interval between two executions.
    ///
    /// Fails when the frequency is zero or the unit is not recognized.
    pub fn period(&self) -> Result<Duration> {
        if self.frequency == 0 {
            return Err(ProcflowError::Config("schedule frequency must be greater than zero".to_string()));
        }

        let unit_secs = match self.frequency_unit.trim().to_lowercase().as_str() {
            "s" | "ss" | "sec" | "second" | "seconds" => 1,
            "min" | "minute" | "minutes" => 60,
            "h" | "hh" | "hour" | "hours" => 3600,
            "d" | "dd" | "day" | "days" => 86_400,
            "w" | "wk" | "week" | "weeks" => 604_800,
            unit => return Err(ProcflowError::Config(format!("invalid schedule frequency unit: '{}'", unit))),
        };

        self.frequency
            .checked_mul(unit_secs)
            .map(Duration::from_secs)
            .ok_or_else(|| ProcflowError::Config(format!("schedule frequency overflow: {} {}", self.frequency, self.frequency_unit)))
    }

    /// Nominal execution dates for a historical reprocessing of `[begin, end]`, one per period.
    ///
    /// The bounds are swapped when given in reverse order.
    pub fn dates_between(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let step = TimeDelta::from_std(self.period()?).map_err(|e| ProcflowError::Convert(e.to_string()))?;
        let (begin, end) = if begin > end {
            (end, begin)
        } else {
            (begin, end)
        };

        let mut dates = Vec::new();
        let mut current = begin;
        while current <= end {
            dates.push(current);
            current = match current.checked_add_signed(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(dates)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::Schedule;

    #[test]
    fn test_period_units() {
        for unit in ["second", "ss", "s", "sec"] {
            assert_eq!(Schedule::new(800, unit).period().unwrap(), Duration::from_secs(800));
        }
        for unit in ["minute", "min", "minutes"] {
            assert_eq!(Schedule::new(35, unit).period().unwrap(), Duration::from_secs(35 * 60));
        }
        for unit in ["hour", "hh", "h"] {
            assert_eq!(Schedule::new(2, unit).period().unwrap(), Duration::from_secs(2 * 3600));
        }
        for unit in ["day", "d", "dd"] {
            assert_eq!(Schedule::new(3, unit).period().unwrap(), Duration::from_secs(3 * 86_400));
        }
        assert_eq!(Schedule::new(1, "Week").period().unwrap(), Duration::from_secs(604_800));
    }

    #[test]
    fn test_invalid_schedule() {
        assert!(Schedule::new(0, "second").period().is_err());
        assert!(Schedule::new(30, "invalid").period().is_err());
        assert!(Schedule::new(u64::MAX, "day").period().is_err());
    }

    #[test]
    fn test_dates_between() {
        let begin = Utc.with_ymd_and_hms(2016, 11, 25, 6, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2016, 11, 25, 12, 0, 0).unwrap();
        let schedule = Schedule::new(3, "h");

        let dates = schedule.dates_between(begin, end).unwrap();
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[0], begin);
        assert_eq!(dates[2], end);

        // reversed bounds give the same dates
        assert_eq!(schedule.dates_between(end, begin).unwrap(), dates);
    }
}
