//! Experience points for stage transitions.

use crate::config::RewardConfig;
use crate::core::item::ItemKind;
use crate::core::ladder::Ladders;
use crate::core::tracker::Transition;

/// Points earned by one transition.
///
/// Demotions earn nothing. A promotion earns the table entry for the mastery
/// depth it lands on, so deeper stages pay more. Promotions that stay on the
/// unstarted label (not reachable with the default ladders) earn nothing.
pub fn xp_for(
    kind: ItemKind,
    transition: &Transition,
    ladders: &Ladders,
    reward: &RewardConfig,
) -> u32 {
    if !transition.is_promotion() {
        return 0;
    }

    let depth = ladders.for_kind(kind).label(transition.to).depth() as usize;
    match depth.checked_sub(1) {
        Some(index) => reward
            .xp_by_depth
            .get(index)
            .or_else(|| reward.xp_by_depth.last())
            .copied()
            .unwrap_or(0),
        None => 0,
    }
}
