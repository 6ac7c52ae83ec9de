//! Report Sink Adapters
//!
//! `CsvReportWriter` produces the two output tables of a run: one row per
//! day and one row per completed eviction phase. `MemoryReportSink` keeps the
//! same rows in memory.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{DailyReport, ReportSink};
use crate::error::Result;

/// Header of the daily statistics table
pub const DAILY_HEADER: &str = "date,size,hitRatePercent,hitOverMissPercent,writtenData,readData,\
readOnHitData,readOnMissData,deletedData,cpuEfficiency,cpuEfficiencyUpperBound,cpuEfficiencyLowerBound";

/// Header of the occupancy trace
pub const OCCUPANCY_HEADER: &str = "occupancyPercent";

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes the daily table and the occupancy trace as CSV.
///
/// Headers are written lazily before the first row of each table.
pub struct CsvReportWriter<W: Write, O: Write> {
    daily: W,
    occupancy: O,
    daily_header_written: bool,
    occupancy_header_written: bool,
    rows: u64,
}

impl CsvReportWriter<BufWriter<File>, BufWriter<File>> {
    /// Create both files, truncating existing ones.
    pub fn create(daily_path: impl AsRef<Path>, occupancy_path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(
            BufWriter::new(File::create(daily_path)?),
            BufWriter::new(File::create(occupancy_path)?),
        ))
    }

    /// Open both files for appending, as when resuming from a checkpoint.
    ///
    /// Headers are only written to files that are still empty.
    pub fn append(daily_path: impl AsRef<Path>, occupancy_path: impl AsRef<Path>) -> Result<Self> {
        let daily = OpenOptions::new().create(true).append(true).open(daily_path)?;
        let occupancy = OpenOptions::new().create(true).append(true).open(occupancy_path)?;
        let daily_header_written = daily.metadata()?.len() > 0;
        let occupancy_header_written = occupancy.metadata()?.len() > 0;

        let mut writer = Self::new(BufWriter::new(daily), BufWriter::new(occupancy));
        writer.daily_header_written = daily_header_written;
        writer.occupancy_header_written = occupancy_header_written;
        Ok(writer)
    }
}

impl<W: Write, O: Write> CsvReportWriter<W, O> {
    pub fn new(daily: W, occupancy: O) -> Self {
        Self {
            daily,
            occupancy,
            daily_header_written: false,
            occupancy_header_written: false,
            rows: 0,
        }
    }

    /// Daily rows written so far
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> (W, O) {
        (self.daily, self.occupancy)
    }
}

impl<W: Write, O: Write> ReportSink for CsvReportWriter<W, O> {
    fn write_daily(&mut self, report: &DailyReport) -> Result<()> {
        if !self.daily_header_written {
            writeln!(self.daily, "{}", DAILY_HEADER)?;
            self.daily_header_written = true;
        }
        writeln!(
            self.daily,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            report.date.format("%Y-%m-%d"),
            report.size,
            report.hit_rate_percent,
            report.hit_over_miss_percent,
            report.written_data,
            report.read_data,
            report.read_on_hit_data,
            report.read_on_miss_data,
            report.deleted_data,
            report.cpu_efficiency,
            optional(report.cpu_efficiency_upper_bound),
            optional(report.cpu_efficiency_lower_bound),
        )?;
        self.rows += 1;
        Ok(())
    }

    fn write_occupancy(&mut self, occupancy_percent: f64) -> Result<()> {
        if !self.occupancy_header_written {
            writeln!(self.occupancy, "{}", OCCUPANCY_HEADER)?;
            self.occupancy_header_written = true;
        }
        writeln!(self.occupancy, "{}", occupancy_percent)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.daily.flush()?;
        self.occupancy.flush()?;
        Ok(())
    }
}

/// Keeps report rows in memory.
///
/// Writing a day twice replaces the earlier row.
#[derive(Debug, Clone, Default)]
pub struct MemoryReportSink {
    daily: BTreeMap<u32, DailyReport>,
    occupancy: Vec<f64>,
    flushes: u32,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// One row per day, in day order
    pub fn daily(&self) -> Vec<&DailyReport> {
        self.daily.values().collect()
    }

    pub fn occupancy(&self) -> &[f64] {
        &self.occupancy
    }

    pub fn flushes(&self) -> u32 {
        self.flushes
    }

    /// Move all rows out of `other` into this sink.
    pub fn extend(&mut self, other: MemoryReportSink) {
        for report in other.daily.into_values() {
            self.daily.insert(report.day, report);
        }
        self.occupancy.extend(other.occupancy);
    }
}

impl ReportSink for MemoryReportSink {
    fn write_daily(&mut self, report: &DailyReport) -> Result<()> {
        self.daily.insert(report.day, report.clone());
        Ok(())
    }

    fn write_occupancy(&mut self, occupancy_percent: f64) -> Result<()> {
        self.occupancy.push(occupancy_percent);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn report(day: u32, size: f64) -> DailyReport {
        DailyReport {
            day,
            date: NaiveDate::from_ymd_opt(2019, 1, 1 + day).unwrap(),
            size,
            hit_rate_percent: 50.0,
            hit_over_miss_percent: 100.0,
            written_data: 10.0,
            read_data: 20.0,
            read_on_hit_data: 10.0,
            read_on_miss_data: 10.0,
            deleted_data: 0.0,
            cpu_efficiency: 72.5,
            cpu_efficiency_upper_bound: None,
            cpu_efficiency_lower_bound: None,
            requests: 2,
            anomalous_samples: 0,
        }
    }

    #[test]
    fn test_csv_layout() {
        let mut writer = CsvReportWriter::new(Vec::new(), Vec::new());
        writer.write_daily(&report(0, 10.0)).unwrap();
        writer.write_daily(&report(1, 12.5)).unwrap();
        writer.write_occupancy(64.25).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.rows(), 2);

        let (daily, occupancy) = writer.into_inner();
        let daily = String::from_utf8(daily).unwrap();
        let lines: Vec<&str> = daily.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], DAILY_HEADER);
        assert_eq!(lines[1], "2019-01-01,10,50,100,10,20,10,10,0,72.5,,");
        assert_eq!(lines[2], "2019-01-02,12.5,50,100,10,20,10,10,0,72.5,,");
        assert_eq!(lines[0].split(',').count(), lines[1].split(',').count());

        assert_eq!(String::from_utf8(occupancy).unwrap(), "occupancyPercent\n64.25\n");
    }

    #[test]
    fn test_occupancy_only_has_no_daily_header() {
        let mut writer = CsvReportWriter::new(Vec::new(), Vec::new());
        writer.write_occupancy(1.0).unwrap();
        let (daily, _) = writer.into_inner();
        assert!(daily.is_empty());
    }

    #[test]
    fn test_append_skips_existing_header() {
        let dir = std::env::temp_dir().join(format!("smartcache-csv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let (daily, occupancy) = (dir.join("daily.csv"), dir.join("occupancy.csv"));

        let mut first = CsvReportWriter::create(&daily, &occupancy).unwrap();
        first.write_daily(&report(0, 1.0)).unwrap();
        first.flush().unwrap();
        drop(first);

        let mut resumed = CsvReportWriter::append(&daily, &occupancy).unwrap();
        resumed.write_daily(&report(1, 2.0)).unwrap();
        resumed.write_occupancy(50.0).unwrap();
        resumed.flush().unwrap();
        drop(resumed);

        let daily_text = std::fs::read_to_string(&daily).unwrap();
        let occupancy_text = std::fs::read_to_string(&occupancy).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(daily_text.lines().count(), 3);
        assert_eq!(daily_text.matches("hitRatePercent").count(), 1);
        assert_eq!(occupancy_text, "occupancyPercent\n50\n");
    }

    #[test]
    fn test_memory_sink_replaces_day() {
        let mut sink = MemoryReportSink::new();
        sink.write_daily(&report(1, 5.0)).unwrap();
        sink.write_daily(&report(0, 1.0)).unwrap();
        sink.write_daily(&report(1, 6.0)).unwrap();
        sink.flush().unwrap();

        let sizes: Vec<f64> = sink.daily().iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![1.0, 6.0]);
        assert_eq!(sink.flushes(), 1);
    }

    #[test]
    fn test_memory_sink_extend() {
        let mut first = MemoryReportSink::new();
        first.write_daily(&report(0, 1.0)).unwrap();
        first.write_occupancy(10.0).unwrap();
        let mut second = MemoryReportSink::new();
        second.write_daily(&report(1, 2.0)).unwrap();
        second.write_occupancy(20.0).unwrap();

        first.extend(second);
        assert_eq!(first.daily().len(), 2);
        assert_eq!(first.occupancy(), &[10.0, 20.0]);
    }
}
