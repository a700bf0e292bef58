use std::ops::RangeInclusive;
use std::thread;
use std::time::Duration;

use log::info;
use rand::Rng;

/// Random pauses between listing fetches and between keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayPolicy {
    pub page_secs: RangeInclusive<u64>,
    pub keyword_secs: RangeInclusive<u64>,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        DelayPolicy {
            page_secs: 2..=5,
            keyword_secs: 2..=6,
        }
    }
}

impl DelayPolicy {
    pub fn none() -> Self {
        DelayPolicy {
            page_secs: 0..=0,
            keyword_secs: 0..=0,
        }
    }

    pub fn page_delay(&self) {
        random_delay(&self.page_secs, "Page Delay");
    }

    pub fn keyword_delay(&self) {
        random_delay(&self.keyword_secs, "Keyword Delay");
    }
}

fn random_delay(range: &RangeInclusive<u64>, label: &str) {
    if *range.end() == 0 || range.is_empty() {
        return;
    }
    let delay_secs = rand::thread_rng().gen_range(range.clone());
    info!("Waiting for {} seconds ({})...", delay_secs, label);
    thread::sleep(Duration::from_secs(delay_secs));
}
