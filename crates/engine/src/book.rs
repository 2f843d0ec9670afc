use std::collections::BTreeMap;

use position::{CoinSlot, Position};

/// Lifecycle slots for every traded coin.
#[derive(Debug, Default)]
pub struct PositionBook {
    slots: BTreeMap<String, CoinSlot>,
}

impl PositionBook {
    pub fn new<I, S>(coins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = coins
            .into_iter()
            .map(|c| {
                let coin = c.into();
                (coin.clone(), CoinSlot::new(coin))
            })
            .collect();
        Self { slots }
    }

    pub fn slot(&self, coin: &str) -> Option<&CoinSlot> {
        self.slots.get(coin)
    }

    pub fn slot_mut(&mut self, coin: &str) -> Option<&mut CoinSlot> {
        self.slots.get_mut(coin)
    }

    /// Open positions across all coins.
    pub fn open_count(&self) -> usize {
        self.slots.values().filter(|s| s.has_position()).count()
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.slots.values().filter_map(|s| s.position())
    }

    pub fn is_tracked(&self, coin: &str) -> bool {
        self.slots.get(coin).is_some_and(|s| s.has_position())
    }
}
