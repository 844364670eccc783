// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Deterministic sampling decisions.
//!
//! Each qualifying item is admitted with probability `sampling_rate`, but the
//! decision is a pure function of `(run id, item key)`: re-running the same
//! run against the same window reproduces the identical sample set, which is
//! what makes run-level retries safe.

use sha2::{Digest, Sha256};

use crate::domain::run::MonitorRunId;

#[derive(Debug, Clone, Copy)]
pub struct DeterministicSampler {
    run_id: MonitorRunId,
    sampling_rate: f64,
}

impl DeterministicSampler {
    pub fn new(run_id: MonitorRunId, sampling_rate: f64) -> Self {
        Self {
            run_id,
            sampling_rate,
        }
    }

    /// Whether the item identified by `key` is in this run's sample.
    pub fn admits(&self, key: &str) -> bool {
        if self.sampling_rate >= 1.0 {
            return true;
        }
        let mut hasher = Sha256::new();
        hasher.update(self.run_id.0.as_bytes());
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        let word = u64::from_be_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]);
        // Map the hash onto [0, 1) and compare against the rate.
        (word as f64 / u64::MAX as f64) < self.sampling_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_run_and_key_always_agree() {
        let run_id = MonitorRunId::new();
        let a = DeterministicSampler::new(run_id, 0.5);
        let b = DeterministicSampler::new(run_id, 0.5);
        for i in 0..100 {
            let key = format!("trace-{i}");
            assert_eq!(a.admits(&key), b.admits(&key));
        }
    }

    #[test]
    fn different_runs_draw_different_samples() {
        let a = DeterministicSampler::new(MonitorRunId::new(), 0.5);
        let b = DeterministicSampler::new(MonitorRunId::new(), 0.5);
        let disagreements = (0..200)
            .filter(|i| {
                let key = format!("trace-{i}");
                a.admits(&key) != b.admits(&key)
            })
            .count();
        assert!(disagreements > 0);
    }

    #[test]
    fn full_rate_admits_everything() {
        let sampler = DeterministicSampler::new(MonitorRunId::new(), 1.0);
        assert!((0..50).all(|i| sampler.admits(&format!("trace-{i}"))));
    }

    #[test]
    fn rate_roughly_controls_admission_share() {
        let sampler = DeterministicSampler::new(MonitorRunId::new(), 0.25);
        let admitted = (0..2000)
            .filter(|i| sampler.admits(&format!("trace-{i}")))
            .count();
        // 0.25 of 2000 with generous slack for hash variance.
        assert!((300..700).contains(&admitted), "admitted {admitted}");
    }
}
