//! Weighted distribution index over a campaign's dispatchable URLs.
//!
//! Each dispatchable URL owns a contiguous slice of `[0, 1)` proportional
//! to its remaining clicks. Slices are laid out in the order the URLs were
//! supplied (insertion order from the store), so a given set of URLs and a
//! given draw always select the same URL.

use crate::domain::entities::Url;
use rand::Rng;

/// One URL's slice of the unit interval.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedEntry {
    pub url: Url,
    pub weight: f64,
    pub start: f64,
    pub end: f64,
}

impl WeightedEntry {
    fn contains(&self, draw: f64) -> bool {
        draw >= self.start && draw < self.end
    }
}

/// Derived per-campaign selection structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionIndex {
    entries: Vec<WeightedEntry>,
}

impl DistributionIndex {
    /// Builds the index from a campaign's URLs.
    ///
    /// URLs that are not active or have no remaining clicks are skipped.
    pub fn build<'a>(urls: impl IntoIterator<Item = &'a Url>) -> Self {
        let active: Vec<&Url> = urls.into_iter().filter(|u| u.is_dispatchable()).collect();

        if let [only] = active.as_slice() {
            return Self {
                entries: vec![WeightedEntry {
                    url: (*only).clone(),
                    weight: 1.0,
                    start: 0.0,
                    end: 1.0,
                }],
            };
        }

        let total: i64 = active.iter().map(|u| u.remaining_clicks()).sum();
        let mut cursor = 0.0;
        let entries = active
            .into_iter()
            .map(|url| {
                let weight = url.remaining_clicks() as f64 / total as f64;
                let entry = WeightedEntry {
                    url: url.clone(),
                    weight,
                    start: cursor,
                    end: cursor + weight,
                };
                cursor += weight;
                entry
            })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[WeightedEntry] {
        &self.entries
    }

    /// No URL has remaining quota.
    pub fn is_exhausted(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the URL whose slice contains `draw`.
    ///
    /// A draw that lands past the last slice because of accumulated rounding
    /// selects the first URL.
    pub fn select(&self, draw: f64) -> Option<&Url> {
        match self.entries.as_slice() {
            [] => None,
            [only] => Some(&only.url),
            entries => entries
                .iter()
                .find(|entry| entry.contains(draw))
                .or_else(|| entries.first())
                .map(|entry| &entry.url),
        }
    }

    /// Draws from `rng` and selects.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> Option<&Url> {
        if self.entries.len() <= 1 {
            return self.select(0.0);
        }
        self.select(rng.random::<f64>())
    }
}
