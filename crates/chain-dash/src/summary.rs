//! Per-coin face value and padding breakdown, for the coin listing.

use std::collections::HashSet;

use serde::Serialize;

use crate::plan::PlanParams;
use crate::utxo::{total_satoshis, Coin};

/// What sits below a coin's face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum Remainder {
    /// A whole number of stamps.
    Stamps(u64),
    /// Anything that is not a multiple of the stamp size, in satoshis.
    Dirt(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinLine {
    pub coin: Coin,
    pub face_value: u64,
    pub remainder: Remainder,
    /// The address already held an earlier coin in the listing.
    pub reused: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinTotals {
    pub coins: usize,
    pub satoshis: u64,
    pub face_value: u64,
    pub stamps: u64,
    pub stamps_each: u64,
    pub extra_stamps: u64,
    pub dirt: u64,
}

/// What the same coins would look like re-denominated with
/// `min_stamps + 1` stamps reserved per coin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub face_value: u64,
    pub num_stamps: u64,
    pub stamps_each: u64,
    pub extra_stamps: u64,
    pub extra_dirt: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinSummary {
    pub lines: Vec<CoinLine>,
    pub totals: CoinTotals,
    /// `None` when the coins cannot cover the reserved stamps.
    pub projection: Option<Projection>,
}

pub fn summarize_coins(coins: &[Coin], params: &PlanParams) -> CoinSummary {
    let unit = params.ladder.smallest();
    let stamp = params.stamp_size.max(1);

    let mut seen = HashSet::new();
    let mut totals = CoinTotals {
        coins: coins.len(),
        satoshis: total_satoshis(coins),
        ..CoinTotals::default()
    };
    let lines: Vec<CoinLine> = coins
        .iter()
        .map(|coin| {
            let below = coin.satoshis % unit;
            let face_value = coin.satoshis - below;
            let remainder = if below % stamp == 0 {
                Remainder::Stamps(below / stamp)
            } else {
                Remainder::Dirt(below)
            };
            totals.face_value += face_value;
            match remainder {
                Remainder::Stamps(n) => totals.stamps += n,
                Remainder::Dirt(d) => totals.dirt += d,
            }
            CoinLine {
                coin: coin.clone(),
                face_value,
                remainder,
                reused: !seen.insert(coin.address.as_str()),
            }
        })
        .collect();

    let mut projection = None;
    if let Some(n) = u64::try_from(coins.len()).ok().filter(|n| *n > 0) {
        totals.stamps_each = totals.stamps / n;
        totals.extra_stamps = totals.stamps % n;

        let reserved = n * stamp * (params.min_stamps + 1);
        projection = totals.satoshis.checked_sub(reserved).map(|max_face| {
            let dirt = max_face % unit + reserved;
            let num_stamps = dirt / stamp;
            Projection {
                face_value: max_face - max_face % unit,
                num_stamps,
                stamps_each: num_stamps / n,
                extra_stamps: num_stamps % n,
                extra_dirt: dirt % stamp,
            }
        });
    }

    CoinSummary {
        lines,
        totals,
        projection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_coin(address: &str, satoshis: u64) -> Coin {
        Coin {
            address: address.to_string(),
            tx_id: "ef".repeat(32),
            output_index: 0,
            satoshis,
        }
    }

    #[test]
    fn splits_face_from_stamps_and_dirt() {
        let coins = vec![
            make_coin("Xa", 100_006_000),
            make_coin("Xb", 50_006_000),
            make_coin("Xc", 12_345),
        ];
        let summary = summarize_coins(&coins, &PlanParams::default());

        assert_eq!(summary.lines[0].face_value, 100_000_000);
        assert_eq!(summary.lines[0].remainder, Remainder::Stamps(30));
        assert_eq!(summary.lines[2].face_value, 0);
        assert_eq!(summary.lines[2].remainder, Remainder::Dirt(12_345));

        assert_eq!(
            summary.totals,
            CoinTotals {
                coins: 3,
                satoshis: 150_024_345,
                face_value: 150_000_000,
                stamps: 60,
                stamps_each: 20,
                extra_stamps: 0,
                dirt: 12_345,
            }
        );
    }

    #[test]
    fn projection_reserves_stamps_per_coin() {
        let coins = vec![make_coin("Xa", 100_006_000), make_coin("Xb", 50_006_000)];
        let summary = summarize_coins(&coins, &PlanParams::default());
        // Two coins, two stamps each reserved: 800 sat.
        let p = summary.projection.unwrap();
        assert_eq!(p.face_value, 150_000_000);
        // 12 000 below face, plus the 800 reserved.
        assert_eq!(p.num_stamps, 60);
        assert_eq!(p.stamps_each, 30);
        assert_eq!(p.extra_stamps, 0);
        assert_eq!(p.extra_dirt, 0);
    }

    #[test]
    fn projection_needs_room_for_reserved_stamps() {
        let coins = vec![make_coin("Xa", 300)];
        let summary = summarize_coins(&coins, &PlanParams::default());
        assert_eq!(summary.projection, None);
        assert_eq!(summary.lines[0].remainder, Remainder::Dirt(300));
    }

    #[test]
    fn reused_addresses_are_flagged() {
        let coins = vec![make_coin("Xa", 1), make_coin("Xb", 1), make_coin("Xa", 1)];
        let reused: Vec<bool> = summarize_coins(&coins, &PlanParams::default())
            .lines
            .iter()
            .map(|l| l.reused)
            .collect();
        assert_eq!(reused, vec![false, false, true]);
    }

    #[test]
    fn empty_listing() {
        let summary = summarize_coins(&[], &PlanParams::default());
        assert!(summary.lines.is_empty());
        assert_eq!(summary.totals, CoinTotals::default());
        assert_eq!(summary.projection, None);
    }
}
