//! Fixed reference tables: slot catalog, per-level percentage schedules,
//! stipend tiers, and completion quotas.
//!
//! These are versioned configuration consumed read-only by the engine.
//! Changing them is an administrative action, not an engine responsibility.

use super::{Amount, BonusKind, Program};

/// Settlement currency for all slot prices and commissions.
pub const CURRENCY: &str = "BNB";

/// Percent of every payment collected into each program-tied bonus fund,
/// alongside the commission fan-out (the fan-out splits the full amount).
pub const FUND_COLLECTION_PCT: u32 = 10;

/// Members in a completed matrix subtree (3 + 9 + 27).
pub const MATRIX_COMPLETE_COUNT: i64 = 39;

/// Members that complete a global phase-1 placement.
pub const GLOBAL_PHASE1_QUOTA: i64 = 4;

/// Members that complete a global phase-2 placement.
pub const GLOBAL_PHASE2_QUOTA: i64 = 8;

/// Maximum depth of the binary "sweepover" breadth-first search.
pub const SWEEPOVER_MAX_DEPTH: i64 = 60;

/// Percent of a matrix slot price accrued to Dream Matrix on tree completion.
pub const DREAM_MATRIX_COMPLETION_PCT: u32 = 10;

/// Percent of a partner's level commission accrued to their mentor.
pub const MENTORSHIP_PCT: u32 = 10;

/// Days after Binary join during which a user counts as a newcomer.
pub const NEWCOMER_WINDOW_DAYS: i64 = 30;

/// Direct Matrix partners required for Dream Matrix eligibility.
pub const DREAM_MATRIX_DIRECTS: i64 = 3;

/// Direct Binary partners required for Mentorship eligibility.
pub const MENTORSHIP_DIRECTS: i64 = 2;

/// Binary slot a user must reach before Leadership Stipend eligibility.
pub const STIPEND_MIN_SLOT: i64 = 10;

/// One catalog row: slot number, display name, price (canonical decimal string).
pub struct SlotDef {
    pub slot_no: i64,
    pub name: &'static str,
    pub price: &'static str,
}

/// Binary slots: prices double from 0.0022 BNB.
pub const BINARY_SLOTS: &[SlotDef] = &[
    SlotDef { slot_no: 1, name: "EXPLORER", price: "0.0022" },
    SlotDef { slot_no: 2, name: "PIONEER", price: "0.0044" },
    SlotDef { slot_no: 3, name: "TRAILBLAZER", price: "0.0088" },
    SlotDef { slot_no: 4, name: "BUILDER", price: "0.0176" },
    SlotDef { slot_no: 5, name: "NAVIGATOR", price: "0.0352" },
    SlotDef { slot_no: 6, name: "ACHIEVER", price: "0.0704" },
    SlotDef { slot_no: 7, name: "STRATEGIST", price: "0.1408" },
    SlotDef { slot_no: 8, name: "VISIONARY", price: "0.2816" },
    SlotDef { slot_no: 9, name: "LUMINARY", price: "0.5632" },
    SlotDef { slot_no: 10, name: "LEADER", price: "1.1264" },
    SlotDef { slot_no: 11, name: "VANGUARD", price: "2.2528" },
    SlotDef { slot_no: 12, name: "CENTER", price: "4.5056" },
    SlotDef { slot_no: 13, name: "VETERAN", price: "9.0112" },
    SlotDef { slot_no: 14, name: "CHAMPION", price: "18.0224" },
    SlotDef { slot_no: 15, name: "ICON", price: "36.0448" },
    SlotDef { slot_no: 16, name: "COMMANDER", price: "72.0896" },
];

/// Matrix slots: prices double from 0.0025 BNB.
pub const MATRIX_SLOTS: &[SlotDef] = &[
    SlotDef { slot_no: 1, name: "SEED", price: "0.0025" },
    SlotDef { slot_no: 2, name: "SPROUT", price: "0.005" },
    SlotDef { slot_no: 3, name: "SAPLING", price: "0.01" },
    SlotDef { slot_no: 4, name: "BRANCH", price: "0.02" },
    SlotDef { slot_no: 5, name: "GROVE", price: "0.04" },
    SlotDef { slot_no: 6, name: "ORCHARD", price: "0.08" },
    SlotDef { slot_no: 7, name: "CANOPY", price: "0.16" },
    SlotDef { slot_no: 8, name: "FOREST", price: "0.32" },
    SlotDef { slot_no: 9, name: "SUMMIT", price: "0.64" },
    SlotDef { slot_no: 10, name: "HORIZON", price: "1.28" },
    SlotDef { slot_no: 11, name: "ZENITH", price: "2.56" },
    SlotDef { slot_no: 12, name: "AURORA", price: "5.12" },
    SlotDef { slot_no: 13, name: "NOVA", price: "10.24" },
    SlotDef { slot_no: 14, name: "QUASAR", price: "20.48" },
    SlotDef { slot_no: 15, name: "PULSAR", price: "40.96" },
];

/// Global slots: prices double from 0.003 BNB.
pub const GLOBAL_SLOTS: &[SlotDef] = &[
    SlotDef { slot_no: 1, name: "ATLAS", price: "0.003" },
    SlotDef { slot_no: 2, name: "TITAN", price: "0.006" },
    SlotDef { slot_no: 3, name: "ORION", price: "0.012" },
    SlotDef { slot_no: 4, name: "PHOENIX", price: "0.024" },
    SlotDef { slot_no: 5, name: "DRACO", price: "0.048" },
    SlotDef { slot_no: 6, name: "LYRA", price: "0.096" },
    SlotDef { slot_no: 7, name: "VEGA", price: "0.192" },
    SlotDef { slot_no: 8, name: "SIRIUS", price: "0.384" },
    SlotDef { slot_no: 9, name: "POLARIS", price: "0.768" },
    SlotDef { slot_no: 10, name: "ANDROMEDA", price: "1.536" },
    SlotDef { slot_no: 11, name: "CENTAURUS", price: "3.072" },
    SlotDef { slot_no: 12, name: "MAGELLAN", price: "6.144" },
];

/// Percent of each payment paid as direct commission to the level-1 upline.
pub fn direct_pct(program: Program) -> u32 {
    match program {
        Program::Binary => 30,
        Program::Matrix => 20,
        Program::Global => 30,
    }
}

/// Per-level percentage schedule for the level-distribution pool.
///
/// Each table sums to exactly 100; the table length is the program's
/// upline fan-out depth (16 for Binary/Global, 17 for Matrix).
pub fn level_percents(program: Program) -> &'static [u32] {
    match program {
        Program::Binary => &[25, 15, 10, 8, 6, 5, 4, 4, 4, 3, 3, 3, 3, 3, 2, 2],
        Program::Matrix => &[20, 10, 10, 8, 8, 6, 6, 5, 5, 4, 4, 4, 3, 3, 2, 1, 1],
        Program::Global => &[30, 12, 10, 8, 6, 5, 4, 4, 3, 3, 3, 3, 3, 2, 2, 2],
    }
}

/// Upline fan-out depth for a program.
pub fn max_levels(program: Program) -> usize {
    level_percents(program).len()
}

pub fn slots(program: Program) -> &'static [SlotDef] {
    match program {
        Program::Binary => BINARY_SLOTS,
        Program::Matrix => MATRIX_SLOTS,
        Program::Global => GLOBAL_SLOTS,
    }
}

pub fn slot_def(program: Program, slot_no: i64) -> Option<&'static SlotDef> {
    slots(program).iter().find(|s| s.slot_no == slot_no)
}

/// Slot price from the catalog. Prices are compile-time constants and
/// always parse.
pub fn slot_price(program: Program, slot_no: i64) -> Option<Amount> {
    slot_def(program, slot_no).map(|s| {
        Amount::from_str_canonical(s.price).expect("catalog prices are valid decimals")
    })
}

/// Tree fan-out per node (children per parent).
pub fn tree_arity(program: Program) -> i64 {
    match program {
        Program::Binary => 2,
        Program::Matrix => 3,
        // Global capacity is per-phase, not per-node; see phase_quota.
        Program::Global => GLOBAL_PHASE2_QUOTA,
    }
}

/// Completion quota for a global phase placement.
pub fn phase_quota(phase: i64) -> i64 {
    if phase <= 1 {
        GLOBAL_PHASE1_QUOTA
    } else {
        GLOBAL_PHASE2_QUOTA
    }
}

/// Bonus funds that collect from a program's payments.
///
/// The stipend fund is fed by missed-profit accumulation instead, and the
/// missed-profit fund by undeliverable commission shares.
pub fn fund_collections(program: Program) -> &'static [(BonusKind, u32)] {
    match program {
        Program::Binary => &[
            (BonusKind::Mentorship, FUND_COLLECTION_PCT),
            (BonusKind::NewcomerSupport, FUND_COLLECTION_PCT),
        ],
        Program::Matrix => &[(BonusKind::DreamMatrix, FUND_COLLECTION_PCT)],
        Program::Global => &[(BonusKind::Spark, FUND_COLLECTION_PCT)],
    }
}

/// Leadership Stipend tier for a binary slot, if the slot carries one.
///
/// The daily return cap is exactly double the slot value.
pub fn stipend_tier(slot_no: i64) -> Option<(&'static str, Amount)> {
    if slot_no < STIPEND_MIN_SLOT {
        return None;
    }
    let def = slot_def(Program::Binary, slot_no)?;
    let price = Amount::from_str_canonical(def.price).expect("catalog prices are valid decimals");
    Some((def.name, price + price))
}
