//! Seller (marketplace vendor)

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::pricing::VolumeTier;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: Uuid,
    pub name: String,
    /// Quantity tiers applied to every product of this seller.
    #[serde(default)]
    pub volume_tiers: Vec<VolumeTier>,
}

impl Seller {
    pub fn new(name: impl Into<String>) -> Self { Self { id: Uuid::now_v7(), name: name.into(), volume_tiers: vec![] } }

    pub fn with_tiers(mut self, mut tiers: Vec<VolumeTier>) -> Self {
        tiers.sort_by_key(|t| t.min_quantity);
        self.volume_tiers = tiers;
        self
    }
}
