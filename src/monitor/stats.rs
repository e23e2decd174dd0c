//! Rolling 1/5/15 minute check counts
//!
//! Each statistic keeps fifteen one-minute buckets anchored to program
//! start. When the current bucket moves on, the value it held fifteen
//! minutes earlier is kept in an overflow bucket so the oldest, partially
//! elapsed minute can still be weighted in.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of one-minute buckets per statistic
pub const CHECK_STATS_BUCKETS: usize = 15;

const KIND_COUNT: usize = 10;

/// What kind of check a counter tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatKind {
    ActiveScheduledServiceCheck,
    ActiveOndemandServiceCheck,
    PassiveServiceCheck,
    ActiveScheduledHostCheck,
    ActiveOndemandHostCheck,
    PassiveHostCheck,
    ActiveCachedHostCheck,
    ActiveCachedServiceCheck,
    ParallelHostCheck,
    SerialHostCheck,
}

impl CheckStatKind {
    pub const ALL: [CheckStatKind; KIND_COUNT] = [
        CheckStatKind::ActiveScheduledServiceCheck,
        CheckStatKind::ActiveOndemandServiceCheck,
        CheckStatKind::PassiveServiceCheck,
        CheckStatKind::ActiveScheduledHostCheck,
        CheckStatKind::ActiveOndemandHostCheck,
        CheckStatKind::PassiveHostCheck,
        CheckStatKind::ActiveCachedHostCheck,
        CheckStatKind::ActiveCachedServiceCheck,
        CheckStatKind::ParallelHostCheck,
        CheckStatKind::SerialHostCheck,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CheckStat {
    current_bucket: usize,
    buckets: [u32; CHECK_STATS_BUCKETS],
    overflow_bucket: u32,
    last_update: Option<DateTime<Utc>>,
    minute_stats: [u32; 3],
}

impl CheckStat {
    /// Bring the buckets forward to `new_bucket`, clearing everything when
    /// the counter has been idle for longer than the whole window
    fn advance(&mut self, new_bucket: usize, now: DateTime<Utc>) {
        let idle_minutes = self
            .last_update
            .map(|last| (now - last).num_seconds() / 60)
            .unwrap_or(i64::MAX);

        if idle_minutes > CHECK_STATS_BUCKETS as i64 {
            self.buckets = [0; CHECK_STATS_BUCKETS];
            self.overflow_bucket = 0;
            self.current_bucket = new_bucket;
        } else if new_bucket != self.current_bucket {
            let mut bucket = (self.current_bucket + 1) % CHECK_STATS_BUCKETS;
            while bucket != new_bucket {
                self.buckets[bucket] = 0;
                bucket = (bucket + 1) % CHECK_STATS_BUCKETS;
            }
            self.overflow_bucket = self.buckets[new_bucket];
            self.current_bucket = new_bucket;
            self.buckets[new_bucket] = 0;
        }
    }
}

/// Per-kind check counters for the last 1, 5 and 15 minutes
#[derive(Debug, Clone)]
pub struct CheckStats {
    program_start: DateTime<Utc>,
    stats: [CheckStat; KIND_COUNT],
}

impl CheckStats {
    pub fn new(program_start: DateTime<Utc>) -> Self {
        Self {
            program_start,
            stats: Default::default(),
        }
    }

    fn bucket_for(&self, t: DateTime<Utc>) -> usize {
        let minutes = (t - self.program_start).num_seconds().max(0) / 60;
        minutes as usize % CHECK_STATS_BUCKETS
    }

    /// Count one check of `kind` that ran at `check_time`
    pub fn update(&mut self, kind: CheckStatKind, check_time: DateTime<Utc>, now: DateTime<Utc>) {
        let bucket = self.bucket_for(check_time);
        let stat = &mut self.stats[kind.index()];
        stat.advance(bucket, now);
        stat.buckets[bucket] += 1;
        stat.last_update = Some(now);
    }

    /// Recompute the 1/5/15 minute figures for every kind. The current
    /// bucket counts in full; older minutes are blended with their
    /// predecessor by how far into the current minute `now` is.
    pub fn generate(&mut self, now: DateTime<Utc>) {
        let new_bucket = self.bucket_for(now);
        let elapsed = (now - self.program_start).num_seconds().max(0) % 60;
        let this_weight = elapsed as f64 / 60.0;
        let last_weight = (60 - elapsed) as f64 / 60.0;

        for stat in self.stats.iter_mut() {
            stat.advance(new_bucket, now);
            stat.last_update = Some(now);

            stat.minute_stats = [0; 3];
            for x in 0..CHECK_STATS_BUCKETS {
                let this_bucket = (stat.current_bucket + CHECK_STATS_BUCKETS - x) % CHECK_STATS_BUCKETS;
                let last_bucket = (this_bucket + CHECK_STATS_BUCKETS - 1) % CHECK_STATS_BUCKETS;

                let this_value = stat.buckets[this_bucket] as f64;
                let last_value = if last_bucket == stat.current_bucket {
                    stat.overflow_bucket
                } else {
                    stat.buckets[last_bucket]
                } as f64;

                let value = if x == 0 {
                    this_value + (last_value * last_weight).floor()
                } else {
                    (this_value * this_weight).ceil() + (last_value * last_weight).floor()
                } as u32;

                if x == 0 {
                    stat.minute_stats[0] = value;
                }
                if x < 5 {
                    stat.minute_stats[1] += value;
                }
                stat.minute_stats[2] += value;
            }
        }
    }

    /// Last generated `[1, 5, 15]` minute counts for `kind`
    pub fn rates(&self, kind: CheckStatKind) -> [u32; 3] {
        self.stats[kind.index()].minute_stats
    }

    /// Raw count in the bucket currently being filled
    pub fn current_count(&self, kind: CheckStatKind) -> u32 {
        let stat = &self.stats[kind.index()];
        stat.buckets[stat.current_bucket]
    }
}
