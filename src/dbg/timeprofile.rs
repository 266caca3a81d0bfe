use std::{borrow::Cow, fmt::Display, time::{Duration, Instant}};

use hashbrown::HashMap;

/// Summary of one named stamp across many profiles
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StampStatistics {
    pub count: usize,
    pub average: Duration,
    pub min: Duration,
    pub max: Duration,
    pub stddev: Duration,
}

/// Tracks statistics of multiple time profiles
#[derive(Clone, Debug, Default)]
pub struct TimeProfileStatistics {
    /// Entry information
    values: HashMap<Cow<'static, str>, Vec<Duration>>,
    /// Entry keys, in order
    keys: Vec<Cow<'static, str>>,
    /// Number of profiles added
    profiles: usize,
}

impl TimeProfileStatistics {
    pub fn add(&mut self, tp: &TimeProfile) {
        self.profiles += 1;
        let mut last_time = tp.start();
        for stamp in tp.stamps.iter() {
            let duration = stamp.timestamp.saturating_duration_since(last_time);
            last_time = stamp.timestamp;

            match self.values.get_mut(&stamp.name) {
                Some(durations) => durations.push(duration),
                None => {
                    self.values.insert(stamp.name.clone(), vec![duration]);
                    self.keys.push(stamp.name.clone());
                },
            }
        }
    }

    /// How many profiles were added
    pub fn profiles(&self) -> usize {
        self.profiles
    }

    /// Stamp names, in the order they were first seen
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<StampStatistics> {
        let entry = self.values.get(name)?;
        let mut max = Duration::ZERO;
        let mut min = Duration::MAX;
        let mut sum = 0.;
        let mut sq_sum = 0.;
        for d in entry.iter().copied() {
            let d_s = d.as_secs_f64();
            sum += d_s;
            sq_sum += d_s * d_s;
            max = max.max(d);
            min = min.min(d);
        }
        let len = entry.len().max(1) as f64;
        let avg = sum / len;
        let variance = (sq_sum / len - avg * avg).max(0.);

        Some(StampStatistics {
            count: entry.len(),
            average: Duration::from_secs_f64(avg),
            min: if entry.is_empty() { Duration::ZERO } else { min },
            max,
            stddev: Duration::from_secs_f64(variance.sqrt()),
        })
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.keys.clear();
        self.profiles = 0;
    }
}

impl Display for TimeProfileStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let max_name = self.keys
            .iter()
            .map(|stamp| stamp.len())
            .max()
            .unwrap_or(0)
            .max(4);

        writeln!(f, " # {:width$} {:>15} {:>15} {:>15} {:>15}", "Name", "Average", "Min", "Max", "Std.dev", width=max_name)?;

        for (i, key) in self.keys.iter().enumerate() {
            let Some(stats) = self.get(key) else { continue };
            let ms = |d: Duration| d.as_secs_f64() * 1e3;
            writeln!(f, "{:2} {:width$} {:12.6} ms {:12.6} ms {:12.6} ms {:12.6} ms", i, key, ms(stats.average), ms(stats.min), ms(stats.max), ms(stats.stddev), width=max_name)?;
        }

        Ok(())
    }
}

/// Named timestamps for one pass through some work
#[derive(Clone, Debug)]
pub struct TimeProfile {
    /// Start timestamp
    now: Instant,
    /// Named timestamps
    stamps: Vec<TimeProfileEntry>,
}

impl Default for TimeProfile {
    fn default() -> Self {
        Self {
            now: Instant::now(),
            stamps: Default::default(),
        }
    }
}

#[derive(Clone, Debug)]
struct TimeProfileEntry {
    name: Cow<'static, str>,
    timestamp: Instant,
}

impl TimeProfile {
    /// Get start time
    fn start(&self) -> Instant {
        self.now
    }

    /// Clear all records
    pub fn clear(&mut self) {
        self.stamps.clear();
        self.now = Instant::now();
    }

    /// Record a timestamp right now
    #[inline]
    pub fn stamp(&mut self, name: impl Into<Cow<'static, str>>) {
        self.stamps.push(TimeProfileEntry {
            name: name.into(),
            timestamp: Instant::now(),
        });
    }

    /// Get duration from [start](Self::start) to last recorded timestamp
    pub fn total_duration(&self) -> Duration {
        match self.stamps.last() {
            Some(last) => last.timestamp.saturating_duration_since(self.now),
            None => Duration::ZERO,
        }
    }

    /// Names of the recorded stamps
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stamps.iter().map(|s| s.name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

impl Display for TimeProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stamps = &self.stamps;

        // Find maximums for scaling output
        let max_name_length = stamps.iter()
            .map(|stamp| stamp.name.len())
            .max()
            .unwrap_or(0)
            .max(1);

        let total_time = self.total_duration().as_secs_f64();

        let mut last_time = self.now;
        for (i, stamp) in stamps.iter().enumerate() {
            let cumtime = stamp.timestamp.saturating_duration_since(self.now);
            let parttime = stamp.timestamp.saturating_duration_since(last_time);
            let percent = if total_time > 0. { 100. * parttime.as_secs_f64() / total_time } else { 0. };

            writeln!(f, "{:2} {:width$} {:12.6} ms {:12.6} ms {:3.0}%",
                i,
                stamp.name,
                parttime.as_secs_f64() * 1000.,
                cumtime.as_secs_f64() * 1000.,
                percent,
                width=max_name_length
            )?;

            last_time = stamp.timestamp;
        }
        Ok(())
    }
}
