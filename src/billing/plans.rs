//! The plan catalog.
//!
//! Three fixed tiers, priced in paise. The catalog is static; there is no
//! admin surface for editing plans at runtime.

use serde::Serialize;

use crate::accounts::PlanTier;

/// A purchasable plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanConfig {
    pub tier: PlanTier,
    /// Display name shown in plan listings and on plan records.
    pub name: &'static str,
    /// Price in the smallest currency unit (paise for INR).
    pub amount: i64,
    pub currency: &'static str,
}

/// Lookup table over the fixed tiers.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: [PlanConfig; 3],
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self {
            plans: [
                PlanConfig {
                    tier: PlanTier::Resident,
                    name: "EcoVerse Resident",
                    amount: 99_900,
                    currency: "INR",
                },
                PlanConfig {
                    tier: PlanTier::Ambassador,
                    name: "EcoVerse Ambassador",
                    amount: 199_900,
                    currency: "INR",
                },
                PlanConfig {
                    tier: PlanTier::Guardian,
                    name: "EcoVerse Guardian",
                    amount: 499_900,
                    currency: "INR",
                },
            ],
        }
    }
}

impl PlanCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, tier: PlanTier) -> &PlanConfig {
        // The array covers every tier variant.
        self.plans
            .iter()
            .find(|p| p.tier == tier)
            .unwrap_or(&self.plans[0])
    }

    #[must_use]
    pub fn all(&self) -> &[PlanConfig] {
        &self.plans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_every_tier() {
        let catalog = PlanCatalog::new();
        for tier in PlanTier::all() {
            let plan = catalog.get(tier);
            assert_eq!(plan.tier, tier);
            assert!(plan.amount > 0);
            assert_eq!(plan.currency, "INR");
        }
    }

    #[test]
    fn test_prices_ascend_by_tier() {
        let catalog = PlanCatalog::new();
        assert!(
            catalog.get(PlanTier::Resident).amount < catalog.get(PlanTier::Ambassador).amount
        );
        assert!(
            catalog.get(PlanTier::Ambassador).amount < catalog.get(PlanTier::Guardian).amount
        );
    }
}
