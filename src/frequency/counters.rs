use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::{keys, AttributeStore, StoreError};

use super::policy::ResetPeriod;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PageviewCounter {
    pub count: u64,
    pub start: Option<DateTime<Utc>>,
}

impl PageviewCounter {
    /// Restarts the window once it has elapsed, then counts this view.
    fn record(&mut self, period: ResetPeriod, now: DateTime<Utc>) {
        let expired = self
            .start
            .map_or(true, |start| now - start > period.duration());
        if expired {
            self.count = 0;
            self.start = Some(now);
        }
        self.count += 1;
    }
}

/// One counter per reset period, persisted under [`keys::PAGEVIEWS`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PageviewCounters {
    pub day: PageviewCounter,
    pub week: PageviewCounter,
    pub month: PageviewCounter,
}

impl PageviewCounters {
    pub fn get(&self, period: ResetPeriod) -> &PageviewCounter {
        match period {
            ResetPeriod::Day => &self.day,
            ResetPeriod::Week => &self.week,
            ResetPeriod::Month => &self.month,
        }
    }

    fn get_mut(&mut self, period: ResetPeriod) -> &mut PageviewCounter {
        match period {
            ResetPeriod::Day => &mut self.day,
            ResetPeriod::Week => &mut self.week,
            ResetPeriod::Month => &mut self.month,
        }
    }

    pub fn count(&self, period: ResetPeriod) -> u64 {
        self.get(period).count
    }

    pub fn record_pageview(&mut self, now: DateTime<Utc>) {
        for period in ResetPeriod::ALL {
            self.get_mut(period).record(period, now);
        }
    }

    /// A value that no longer decodes is logged and replaced by fresh counters;
    /// the next `save` overwrites it.
    pub fn load(store: &dyn AttributeStore) -> Result<Self, StoreError> {
        match store.get(keys::PAGEVIEWS)? {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(raw) => Ok(serde_json::from_value(raw).unwrap_or_else(|err| {
                log_warn!("resetting unreadable `{}` counters: {err}", keys::PAGEVIEWS);
                Self::default()
            })),
        }
    }

    pub fn save(&self, store: &mut dyn AttributeStore) -> Result<(), StoreError> {
        let value = serde_json::to_value(self).map_err(|err| StoreError::InvalidValue {
            key: keys::PAGEVIEWS.to_string(),
            reason: err.to_string(),
        })?;
        store.set(keys::PAGEVIEWS, value)
    }
}

/// Counts one pageview in every period and persists the result. Call exactly
/// once per pageview.
pub fn record_pageview(
    store: &mut dyn AttributeStore,
    now: DateTime<Utc>,
) -> Result<PageviewCounters, StoreError> {
    let mut counters = PageviewCounters::load(store)?;
    counters.record_pageview(now);
    counters.save(store)?;
    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::MemoryStore;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn every_period_counts_each_view() {
        let mut counters = PageviewCounters::default();
        counters.record_pageview(at(1, 8));
        counters.record_pageview(at(1, 9));

        for period in ResetPeriod::ALL {
            assert_eq!(counters.count(period), 2);
        }
    }

    #[test]
    fn elapsed_periods_restart_from_current_view() {
        let mut counters = PageviewCounters::default();
        counters.record_pageview(at(1, 8));
        counters.record_pageview(at(1, 20));
        counters.record_pageview(at(3, 8));

        assert_eq!(counters.count(ResetPeriod::Day), 1);
        assert_eq!(counters.get(ResetPeriod::Day).start, Some(at(3, 8)));
        assert_eq!(counters.count(ResetPeriod::Week), 3);
        assert_eq!(counters.count(ResetPeriod::Month), 3);
    }

    #[test]
    fn exactly_one_period_later_still_counts_in_window() {
        let mut counters = PageviewCounters::default();
        counters.record_pageview(at(1, 8));
        counters.record_pageview(at(1, 8) + Duration::days(1));
        assert_eq!(counters.count(ResetPeriod::Day), 2);
    }

    #[test]
    fn persists_through_the_store() {
        let mut store = MemoryStore::new();
        record_pageview(&mut store, at(1, 8)).unwrap();
        let counters = record_pageview(&mut store, at(1, 9)).unwrap();

        assert_eq!(counters.count(ResetPeriod::Month), 2);
        assert_eq!(PageviewCounters::load(&store).unwrap(), counters);
    }

    #[test]
    fn corrupt_counter_value_starts_over() {
        let mut store = MemoryStore::new();
        store.set(keys::PAGEVIEWS, json!("lots")).unwrap();
        assert_eq!(PageviewCounters::load(&store).unwrap(), PageviewCounters::default());

        let counters = record_pageview(&mut store, at(2, 8)).unwrap();
        assert_eq!(counters.count(ResetPeriod::Day), 1);
        assert_eq!(PageviewCounters::load(&store).unwrap(), counters);
        assert_eq!(store.get(keys::PAGEVIEWS).unwrap().unwrap()["day"]["count"], json!(1));
    }
}
