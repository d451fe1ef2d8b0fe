//! Group plans: one owner slot plus discounted secondary slots
//!
//! Slot 1 always belongs to the owner and is billed at `owner_price`.
//! Slots 2..=max_slots are priced by tiers; a tier covers every slot from its
//! `from_slot` up to the next tier. The owner's price caps every tier.

use super::money::Amount;
use crate::error::{AppError, ErrorCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub const OWNER_SLOT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTier {
    pub from_slot: u32,
    pub price: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPricing {
    pub owner_price: Amount,
    pub max_slots: u32,
    pub tiers: Vec<SlotTier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupTierError {
    #[error("a group needs at least 2 slots, got {max_slots}")]
    TooFewSlots { max_slots: u32 },

    #[error("group has no secondary slot tiers")]
    NoTiers,

    #[error("first tier must start at slot 2, starts at {from_slot}")]
    FirstTierNotSlotTwo { from_slot: u32 },

    #[error("tier starting at slot {from_slot} is not after the previous tier")]
    TiersNotIncreasing { from_slot: u32 },

    #[error("tier starting at slot {from_slot} exceeds capacity {max_slots}")]
    TierBeyondCapacity { from_slot: u32, max_slots: u32 },

    #[error("slot {from_slot} price {price} exceeds owner price {owner_price}")]
    PriceAboveOwner {
        from_slot: u32,
        price: Amount,
        owner_price: Amount,
    },

    #[error("slot {from_slot} price is higher than an earlier tier")]
    PriceIncreases { from_slot: u32 },

    #[error("slot {from_slot} has a negative price")]
    NegativePrice { from_slot: u32 },

    #[error("slot {slot} is outside 1..={max_slots}")]
    SlotOutOfRange { slot: u32, max_slots: u32 },

    #[error("all {max_slots} slots are taken")]
    NoFreeSlot { max_slots: u32 },
}

impl From<GroupTierError> for AppError {
    fn from(err: GroupTierError) -> Self {
        let code = match err {
            GroupTierError::SlotOutOfRange { .. } => ErrorCode::GroupSlotOutOfRange,
            GroupTierError::NoFreeSlot { .. } => ErrorCode::GroupSlotUnavailable,
            _ => ErrorCode::GroupTierInvalid,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// Check the tier table of a group plan.
pub fn validate_group_tiers(group: &GroupPricing) -> Result<(), GroupTierError> {
    if group.max_slots < 2 {
        return Err(GroupTierError::TooFewSlots {
            max_slots: group.max_slots,
        });
    }
    if group.owner_price < 0 {
        return Err(GroupTierError::NegativePrice {
            from_slot: OWNER_SLOT,
        });
    }

    let first = group.tiers.first().ok_or(GroupTierError::NoTiers)?;
    if first.from_slot != 2 {
        return Err(GroupTierError::FirstTierNotSlotTwo {
            from_slot: first.from_slot,
        });
    }

    let mut previous: Option<&SlotTier> = None;
    for tier in &group.tiers {
        if let Some(prev) = previous
            && tier.from_slot <= prev.from_slot
        {
            return Err(GroupTierError::TiersNotIncreasing {
                from_slot: tier.from_slot,
            });
        }
        if tier.from_slot > group.max_slots {
            return Err(GroupTierError::TierBeyondCapacity {
                from_slot: tier.from_slot,
                max_slots: group.max_slots,
            });
        }
        if tier.price < 0 {
            return Err(GroupTierError::NegativePrice {
                from_slot: tier.from_slot,
            });
        }
        if tier.price > group.owner_price {
            return Err(GroupTierError::PriceAboveOwner {
                from_slot: tier.from_slot,
                price: tier.price,
                owner_price: group.owner_price,
            });
        }
        if let Some(prev) = previous
            && tier.price > prev.price
        {
            return Err(GroupTierError::PriceIncreases {
                from_slot: tier.from_slot,
            });
        }
        previous = Some(tier);
    }
    Ok(())
}

impl GroupPricing {
    /// Monthly price of a slot. Secondary prices are clamped to the owner price.
    pub fn slot_price(&self, slot: u32) -> Result<Amount, GroupTierError> {
        if slot == 0 || slot > self.max_slots {
            return Err(GroupTierError::SlotOutOfRange {
                slot,
                max_slots: self.max_slots,
            });
        }
        if slot == OWNER_SLOT {
            return Ok(self.owner_price);
        }
        let tier = self
            .tiers
            .iter()
            .take_while(|tier| tier.from_slot <= slot)
            .last()
            .ok_or(GroupTierError::NoTiers)?;
        Ok(tier.price.min(self.owner_price))
    }

    /// Lowest secondary slot not in `taken`
    pub fn next_free_slot(&self, taken: &BTreeSet<u32>) -> Result<u32, GroupTierError> {
        (2..=self.max_slots)
            .find(|slot| !taken.contains(slot))
            .ok_or(GroupTierError::NoFreeSlot {
                max_slots: self.max_slots,
            })
    }

    /// Sum of the monthly prices of the occupied slots
    pub fn monthly_total(&self, occupied: &BTreeSet<u32>) -> Result<Amount, GroupTierError> {
        occupied
            .iter()
            .try_fold(0, |acc, slot| Ok(acc + self.slot_price(*slot)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> GroupPricing {
        GroupPricing {
            owner_price: 30_000,
            max_slots: 6,
            tiers: vec![
                SlotTier {
                    from_slot: 2,
                    price: 22_000,
                },
                SlotTier {
                    from_slot: 4,
                    price: 18_000,
                },
            ],
        }
    }

    #[test]
    fn test_valid_group() {
        assert_eq!(validate_group_tiers(&group()), Ok(()));
    }

    #[test]
    fn test_slot_prices() {
        let g = group();
        assert_eq!(g.slot_price(1), Ok(30_000));
        assert_eq!(g.slot_price(2), Ok(22_000));
        assert_eq!(g.slot_price(3), Ok(22_000));
        assert_eq!(g.slot_price(4), Ok(18_000));
        assert_eq!(g.slot_price(6), Ok(18_000));
        assert_eq!(
            g.slot_price(7),
            Err(GroupTierError::SlotOutOfRange {
                slot: 7,
                max_slots: 6
            })
        );
        assert!(g.slot_price(0).is_err());
    }

    #[test]
    fn test_owner_price_caps_unvalidated_tiers() {
        let mut g = group();
        g.tiers[0].price = 50_000;
        assert_eq!(g.slot_price(2), Ok(30_000));
        assert!(matches!(
            validate_group_tiers(&g),
            Err(GroupTierError::PriceAboveOwner { from_slot: 2, .. })
        ));
    }

    #[test]
    fn test_too_few_slots() {
        let mut g = group();
        g.max_slots = 1;
        assert_eq!(
            validate_group_tiers(&g),
            Err(GroupTierError::TooFewSlots { max_slots: 1 })
        );
    }

    #[test]
    fn test_tiers_must_start_at_two() {
        let mut g = group();
        g.tiers[0].from_slot = 3;
        assert_eq!(
            validate_group_tiers(&g),
            Err(GroupTierError::FirstTierNotSlotTwo { from_slot: 3 })
        );

        g.tiers.clear();
        assert_eq!(validate_group_tiers(&g), Err(GroupTierError::NoTiers));
    }

    #[test]
    fn test_tiers_must_increase() {
        let mut g = group();
        g.tiers[1].from_slot = 2;
        assert_eq!(
            validate_group_tiers(&g),
            Err(GroupTierError::TiersNotIncreasing { from_slot: 2 })
        );
    }

    #[test]
    fn test_tier_beyond_capacity() {
        let mut g = group();
        g.tiers[1].from_slot = 7;
        assert!(matches!(
            validate_group_tiers(&g),
            Err(GroupTierError::TierBeyondCapacity { from_slot: 7, .. })
        ));
    }

    #[test]
    fn test_prices_must_not_increase() {
        let mut g = group();
        g.tiers[1].price = 25_000;
        assert_eq!(
            validate_group_tiers(&g),
            Err(GroupTierError::PriceIncreases { from_slot: 4 })
        );
    }

    #[test]
    fn test_negative_prices() {
        let mut g = group();
        g.tiers[1].price = -1;
        assert_eq!(
            validate_group_tiers(&g),
            Err(GroupTierError::NegativePrice { from_slot: 4 })
        );

        let mut g = group();
        g.owner_price = -1;
        assert_eq!(
            validate_group_tiers(&g),
            Err(GroupTierError::NegativePrice { from_slot: 1 })
        );
    }

    #[test]
    fn test_next_free_slot_skips_owner_and_taken() {
        let g = group();
        let taken: BTreeSet<u32> = [1, 2, 4].into_iter().collect();
        assert_eq!(g.next_free_slot(&taken), Ok(3));

        let full: BTreeSet<u32> = (1..=6).collect();
        assert_eq!(
            g.next_free_slot(&full),
            Err(GroupTierError::NoFreeSlot { max_slots: 6 })
        );
    }

    #[test]
    fn test_monthly_total() {
        let g = group();
        let occupied: BTreeSet<u32> = [1, 2, 3, 4].into_iter().collect();
        assert_eq!(g.monthly_total(&occupied), Ok(30_000 + 22_000 * 2 + 18_000));
    }

    #[test]
    fn test_error_maps_to_app_error_code() {
        let err: AppError = GroupTierError::NoFreeSlot { max_slots: 3 }.into();
        assert_eq!(err.code, ErrorCode::GroupSlotUnavailable);
        let err: AppError = GroupTierError::NoTiers.into();
        assert_eq!(err.code, ErrorCode::GroupTierInvalid);
    }
}
