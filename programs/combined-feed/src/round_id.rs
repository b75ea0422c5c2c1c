//! Externally visible round ids.
//!
//! A combined round id packs the phase with the round ids of both underlying feeds:
//!
//! ```text
//!  79        64 63           32 31            0
//! +------------+---------------+---------------+
//! |  phase id  | feed x round  | feed y round  |
//! +------------+---------------+---------------+
//! ```
//!
//! The 80 bit value is carried in the low bits of a `u128`. Field widths are enforced by the
//! argument types of [`encode`]; [`decode`] truncates, so bits above 80 are ignored.

const PHASE_OFFSET: u32 = 64;
const X_OFFSET: u32 = 32;

/// Largest id [`encode`] can produce.
pub const MAX_ROUND_ID: u128 = (1 << 80) - 1;

pub fn encode(phase_id: u16, round_x: u32, round_y: u32) -> u128 {
    (u128::from(phase_id) << PHASE_OFFSET) | (u128::from(round_x) << X_OFFSET) | u128::from(round_y)
}

pub fn decode(round_id: u128) -> (u16, u32, u32) {
    let phase_id = (round_id >> PHASE_OFFSET) as u16;
    let round_x = (round_id >> X_OFFSET) as u32;
    let round_y = round_id as u32;
    (phase_id, round_x, round_y)
}
