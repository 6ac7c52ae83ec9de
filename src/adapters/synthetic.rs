//! Synthetic Trace Generator
//!
//! Produces day partitions with Zipf-distributed file popularity. The hot
//! set drifts by a fixed number of ranks per day so that yesterday's popular
//! files slowly go cold. Everything is derived from the seed, the day and the
//! file id, so any day can be generated independently and repeatedly.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Zipf};
use serde::{Deserialize, Serialize};

use crate::domain::{DataType, Protocol, TraceRecord, TraceSource};
use crate::error::{Error, Result};

const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Shape of the generated workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyntheticTraceConfig {
    /// Distinct files in the catalogue
    pub files: u64,
    pub requests_per_day: usize,
    /// Zipf exponent of file popularity
    pub zipf_exponent: f64,
    pub min_size_mb: f64,
    pub max_size_mb: f64,
    /// Share of files that are simulated (MC) rather than detector data
    pub mc_fraction: f64,
    /// Share of jobs that read their input remotely
    pub remote_fraction: f64,
    /// Share of jobs that failed and should be ignored
    pub failure_rate: f64,
    /// Popularity ranks the hot set moves per day
    pub drift_per_day: u64,
    /// Files per production campaign
    pub campaign_size: u64,
    pub seed: u64,
}

impl Default for SyntheticTraceConfig {
    fn default() -> Self {
        Self {
            files: 20_000,
            requests_per_day: 10_000,
            zipf_exponent: 1.1,
            min_size_mb: 100.0,
            max_size_mb: 4096.0,
            mc_fraction: 0.4,
            remote_fraction: 0.2,
            failure_rate: 0.01,
            drift_per_day: 250,
            campaign_size: 500,
            seed: 42,
        }
    }
}

/// Deterministic synthetic trace source.
#[derive(Debug, Clone)]
pub struct SyntheticTrace {
    config: SyntheticTraceConfig,
    popularity: Zipf<f64>,
}

impl SyntheticTrace {
    pub fn new(config: SyntheticTraceConfig) -> Result<Self> {
        if config.files == 0 {
            return Err(Error::Config("synthetic trace needs at least one file".to_string()));
        }
        if !(config.min_size_mb > 0.0 && config.min_size_mb <= config.max_size_mb) {
            return Err(Error::Config(format!(
                "invalid synthetic size range {}..={} MB",
                config.min_size_mb, config.max_size_mb
            )));
        }
        for (name, value) in [
            ("mcFraction", config.mc_fraction),
            ("remoteFraction", config.remote_fraction),
            ("failureRate", config.failure_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within 0-1, got {}", name, value)));
            }
        }
        let popularity = Zipf::new(config.files, config.zipf_exponent)
            .map_err(|e| Error::Config(format!("invalid zipf parameters: {}", e)))?;

        Ok(Self { config, popularity })
    }

    pub fn config(&self) -> &SyntheticTraceConfig {
        &self.config
    }

    fn file_rng(&self, id: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.config.seed ^ id.wrapping_add(1).wrapping_mul(SEED_MIX))
    }

    fn day_rng(&self, day: u32) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        rng.set_stream(u64::from(day) + 1);
        rng
    }

    /// The fixed attributes of catalogue file `id`.
    fn file(&self, id: u64) -> (String, f64, DataType, String) {
        let mut rng = self.file_rng(id);
        let data_type = if rng.gen::<f64>() < self.config.mc_fraction {
            DataType::Mc
        } else {
            DataType::Data
        };
        let size_mb = if self.config.max_size_mb > self.config.min_size_mb {
            rng.gen_range(self.config.min_size_mb..=self.config.max_size_mb).round()
        } else {
            self.config.min_size_mb
        };
        let name = format!("/store/{}/file-{:06}.root", data_type, id);
        let campaign = format!("campaign-{:03}", id / self.config.campaign_size.max(1));
        (name, size_mb, data_type, campaign)
    }

    /// Generate one day of requests.
    pub fn generate_day(&self, day: u32) -> Vec<TraceRecord> {
        let mut rng = self.day_rng(day);
        let shift = u64::from(day).wrapping_mul(self.config.drift_per_day);
        let day_start = i64::from(day) * 86_400;

        (0..self.config.requests_per_day)
            .map(|i| {
                let rank = self.popularity.sample(&mut rng) as u64 - 1;
                let id = (rank + shift) % self.config.files;
                let (name, size_mb, data_type, campaign) = self.file(id);

                let wall_time = rng.gen_range(60.0..7200.0);
                let cpu_time = wall_time * rng.gen_range(0.3..1.0);
                let protocol = if rng.gen::<f64>() < self.config.remote_fraction {
                    Protocol::Remote
                } else {
                    Protocol::Local
                };
                let epoch = day_start + (i as i64 * 86_400) / self.config.requests_per_day.max(1) as i64;

                let mut record = TraceRecord::new(name, size_mb, data_type)
                    .with_timing(cpu_time, wall_time)
                    .with_protocol(protocol)
                    .with_epoch(epoch)
                    .with_campaign(campaign);
                record.job_success = rng.gen::<f64>() >= self.config.failure_rate;
                record
            })
            .collect()
    }
}

impl TraceSource for SyntheticTrace {
    fn load_day(&mut self, day: u32) -> Result<Vec<TraceRecord>> {
        Ok(self.generate_day(day))
    }
}
