use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::IntoEnumIterator;

/// Counters maintained by every simulated cache.
#[derive(
    Debug,
    strum::EnumIter,
    strum::AsRefStr,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum Counter {
    HITS,
    MISSES,
    REPLACEMENTS,
    WRITEBACKS,
    INVALIDATIONS,
    PREFETCHES,
}

impl Counter {
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::HITS => "total number of hits",
            Self::MISSES => "total number of misses",
            Self::REPLACEMENTS => "total number of replacements",
            Self::WRITEBACKS => "total number of writebacks",
            Self::INVALIDATIONS => "total number of invalidations",
            Self::PREFETCHES => "total number of prefetches issued",
        }
    }
}

/// Cache access statistics.
///
/// Only demand accesses are counted as hits and misses.
/// Speculative fills are counted in `prefetches`.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cache {
    pub hits: u64,
    pub misses: u64,
    pub replacements: u64,
    pub writebacks: u64,
    pub invalidations: u64,
    pub prefetches: u64,
}

impl std::ops::AddAssign for Cache {
    fn add_assign(&mut self, other: Self) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.replacements += other.replacements;
        self.writebacks += other.writebacks;
        self.invalidations += other.invalidations;
        self.prefetches += other.prefetches;
    }
}

impl Cache {
    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::HITS => self.hits,
            Counter::MISSES => self.misses,
            Counter::REPLACEMENTS => self.replacements,
            Counter::WRITEBACKS => self.writebacks,
            Counter::INVALIDATIONS => self.invalidations,
            Counter::PREFETCHES => self.prefetches,
        }
    }

    /// Total number of demand accesses.
    #[must_use]
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }

    fn rate(&self, count: u64) -> f64 {
        match self.accesses() {
            0 => 0.0,
            accesses => count as f64 / accesses as f64,
        }
    }

    #[must_use]
    pub fn miss_rate(&self) -> f64 {
        self.rate(self.misses)
    }

    #[must_use]
    pub fn replacement_rate(&self) -> f64 {
        self.rate(self.replacements)
    }

    #[must_use]
    pub fn writeback_rate(&self) -> f64 {
        self.rate(self.writebacks)
    }

    #[must_use]
    pub fn invalidation_rate(&self) -> f64 {
        self.rate(self.invalidations)
    }

    /// Text report for the cache named `name`.
    #[must_use]
    pub fn report<'a>(&'a self, name: &'a str) -> Report<'a> {
        Report { name, stats: self }
    }
}

/// Human readable statistics report.
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    name: &'a str,
    stats: &'a Cache,
}

impl std::fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.name;
        writeln!(
            f,
            "{:<30} {:>12} # total number of accesses",
            format!("{name}.accesses"),
            self.stats.accesses()
        )?;
        for counter in Counter::iter() {
            writeln!(
                f,
                "{:<30} {:>12} # {}",
                format!("{name}.{}", counter.as_ref()),
                self.stats.get(counter),
                counter.description()
            )?;
        }
        let rates = [
            ("miss_rate", self.stats.miss_rate(), "miss rate (i.e., misses/ref)"),
            ("repl_rate", self.stats.replacement_rate(), "replacement rate (i.e., repls/ref)"),
            ("wb_rate", self.stats.writeback_rate(), "writeback rate (i.e., wrbks/ref)"),
            ("inv_rate", self.stats.invalidation_rate(), "invalidation rate (i.e., invs/ref)"),
        ];
        for (key, rate, description) in rates {
            writeln!(
                f,
                "{:<30} {:>12.4} # {description}",
                format!("{name}.{key}"),
                rate
            )?;
        }
        Ok(())
    }
}

/// Statistics of multiple caches, keyed by cache name.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerCache(pub HashMap<String, Cache>);

impl PerCache {
    /// Sums the statistics of all caches.
    #[must_use]
    pub fn reduce(&self) -> Cache {
        let mut out = Cache::default();
        for stats in self.0.values() {
            out += *stats;
        }
        out
    }

    #[must_use]
    pub fn total_accesses(&self) -> u64 {
        self.reduce().accesses()
    }
}

impl std::ops::Deref for PerCache {
    type Target = HashMap<String, Cache>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for PerCache {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{Cache, Counter, PerCache};
    use pretty_assertions_sorted as diff;
    use strum::IntoEnumIterator;

    #[test]
    fn test_rates_without_accesses() {
        let stats = Cache::default();
        assert_eq!(stats.accesses(), 0);
        assert!(stats.miss_rate().abs() < f64::EPSILON);
        assert!(stats.writeback_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_rates() {
        let stats = Cache {
            hits: 3,
            misses: 1,
            replacements: 1,
            writebacks: 2,
            ..Cache::default()
        };
        assert_eq!(stats.accesses(), 4);
        assert!((stats.miss_rate() - 0.25).abs() < f64::EPSILON);
        assert!((stats.writeback_rate() - 0.5).abs() < f64::EPSILON);
        assert!(stats.invalidation_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_counter_names() {
        let names: Vec<_> = Counter::iter().map(|c| c.as_ref().to_string()).collect();
        diff::assert_eq!(
            names,
            vec![
                "hits",
                "misses",
                "replacements",
                "writebacks",
                "invalidations",
                "prefetches"
            ]
        );
    }

    #[test]
    fn test_report() {
        let stats = Cache {
            hits: 7,
            misses: 3,
            prefetches: 2,
            ..Cache::default()
        };
        let report = stats.report("dl1").to_string();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 1 + 6 + 4);
        assert!(lines[0].starts_with("dl1.accesses"));
        assert!(lines[0].contains(" 10 "));
        assert!(report.contains("dl1.prefetches"));
        assert!(report.contains("0.3000"));
    }

    #[test]
    fn test_reduce_per_cache() {
        let mut per_cache = PerCache::default();
        per_cache.insert(
            "il1".to_string(),
            Cache {
                hits: 10,
                misses: 2,
                ..Cache::default()
            },
        );
        per_cache.insert(
            "dl1".to_string(),
            Cache {
                hits: 5,
                misses: 5,
                writebacks: 1,
                ..Cache::default()
            },
        );
        let total = per_cache.reduce();
        diff::assert_eq!(
            total,
            Cache {
                hits: 15,
                misses: 7,
                writebacks: 1,
                ..Cache::default()
            }
        );
        assert_eq!(per_cache.total_accesses(), 22);
    }

    #[test]
    fn test_serialize_yaml() {
        let stats = Cache {
            hits: 1,
            invalidations: 4,
            ..Cache::default()
        };
        let yaml = serde_yaml::to_string(&stats).unwrap();
        assert!(yaml.contains("invalidations: 4"));
        let parsed: Cache = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, stats);
    }
}
