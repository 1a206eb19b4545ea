pub mod error;

pub use error::*;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Cumulative earnings for one wallet session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Earnings {
    pub total: f64,
}

/// Durable per-wallet session state, one JSON document per identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Unix seconds when this session was first registered.
    pub start_time: i64,
    pub earnings: Earnings,
    pub referral_bonus: f64,
}

impl SessionRecord {
    pub fn new(start_time: i64, total: f64, referral_bonus: f64) -> Self {
        Self {
            start_time,
            earnings: Earnings { total },
            referral_bonus,
        }
    }
}

/// Constant simulation parameters for one rig. Drawn once at agent
/// construction and never measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinerStats {
    pub hashrate_mhs: f64,
    pub shares_per_cycle: u64,
    pub efficiency: f64,
    pub power_usage_w: f64,
}

impl MinerStats {
    /// Draw a simulated rig profile with a hashrate in the given range.
    pub fn simulated(min_mhs: f64, max_mhs: f64) -> Self {
        let max_mhs = max_mhs.max(min_mhs);
        let mut rng = rand::thread_rng();
        let hashrate = rng.gen_range(min_mhs..=max_mhs);
        Self {
            hashrate_mhs: hashrate,
            shares_per_cycle: rng.gen_range(10..=50),
            efficiency: rng.gen_range(0.93..=0.99),
            power_usage_w: hashrate * 3.2,
        }
    }
}
