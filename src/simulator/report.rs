//! Daily report assembly and the end-of-run summary.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::cache::{bytes_to_mb, CacheState, DailyCounters};
use crate::domain::DailyReport;

/// Calendar date of `day` given the date of `start_day`.
pub fn date_of_day(start_date: NaiveDate, start_day: u32, day: u32) -> NaiveDate {
    let offset = u64::from(day.saturating_sub(start_day));
    start_date.checked_add_days(Days::new(offset)).unwrap_or(start_date)
}

/// Build the report row for a finished day from its counters.
pub fn build_daily_report(day: u32, date: NaiveDate, cache: &CacheState, counters: &DailyCounters) -> DailyReport {
    DailyReport {
        day,
        date,
        size: bytes_to_mb(cache.current_size()),
        hit_rate_percent: counters.hit_rate() * 100.0,
        hit_over_miss_percent: counters.hit_over_miss() * 100.0,
        written_data: bytes_to_mb(counters.written),
        read_data: bytes_to_mb(counters.read),
        read_on_hit_data: bytes_to_mb(counters.read_on_hit),
        read_on_miss_data: bytes_to_mb(counters.read_on_miss),
        deleted_data: bytes_to_mb(counters.deleted),
        cpu_efficiency: counters.cpu_efficiency(),
        cpu_efficiency_upper_bound: None,
        cpu_efficiency_lower_bound: None,
        requests: counters.requests(),
        anomalous_samples: counters.anomalous_samples,
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub days: u32,
    pub ticks: u64,
    pub hits: u64,
    pub misses: u64,
    pub admitted_files: u64,
    pub evicted_files: u64,
    /// Keep decisions overridden because the file would not fit
    pub forced_discards: u64,
    /// Misses not admitted because of bandwidth back-pressure
    pub throttled_misses: u64,
    pub anomalous_samples: u64,
    pub eviction_phases: u64,
    pub purged_entries: u64,
    pub admission_experience: u64,
    pub eviction_experience: u64,
}

impl SimulationSummary {
    pub fn hit_rate_percent(&self) -> f64 {
        let requests = self.hits + self.misses;
        if requests == 0 {
            return 0.0;
        }
        self.hits as f64 / requests as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::mb_to_bytes;

    #[test]
    fn test_date_of_day() {
        let start = NaiveDate::from_ymd_opt(2018, 12, 30).unwrap();
        assert_eq!(date_of_day(start, 10, 10), start);
        assert_eq!(date_of_day(start, 10, 13), NaiveDate::from_ymd_opt(2019, 1, 2).unwrap());
    }

    #[test]
    fn test_build_daily_report() {
        let mut cache = CacheState::new(mb_to_bytes(1000.0), 95.0, 0.0);
        cache.admit("a".into(), mb_to_bytes(250.0));
        cache.record_request_outcome(false, mb_to_bytes(250.0));
        cache.record_request_outcome(true, mb_to_bytes(250.0));
        cache.record_request_outcome(true, mb_to_bytes(250.0));
        cache.record_cpu_efficiency(80.0);
        let counters = cache.reset_daily();

        let date = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let report = build_daily_report(0, date, &cache, &counters);
        assert_eq!(report.size, 250.0);
        assert_eq!(report.written_data, 250.0);
        assert_eq!(report.read_data, 750.0);
        assert_eq!(report.read_on_hit_data, 500.0);
        assert_eq!(report.read_on_miss_data, 250.0);
        assert!((report.hit_rate_percent - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.hit_over_miss_percent, 200.0);
        assert_eq!(report.cpu_efficiency, 80.0);
        assert_eq!(report.requests, 3);
        assert_eq!(report.cpu_efficiency_upper_bound, None);
    }

    #[test]
    fn test_summary_hit_rate() {
        let summary = SimulationSummary {
            hits: 1,
            misses: 3,
            ..Default::default()
        };
        assert_eq!(summary.hit_rate_percent(), 25.0);
        assert_eq!(SimulationSummary::default().hit_rate_percent(), 0.0);
    }
}
