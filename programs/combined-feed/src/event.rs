use anchor_lang::prelude::*;

#[event]
pub struct PairProposed {
    pub proxy: Pubkey,
    pub feed_x: Pubkey,
    pub feed_y: Pubkey,
}

#[event]
pub struct PairConfirmed {
    pub proxy: Pubkey,
    #[index]
    pub phase_id: u16,
    pub feed_x: Pubkey,
    pub feed_y: Pubkey,
}

#[event]
pub struct OwnershipTransferred {
    pub proxy: Pubkey,
    pub previous_owner: Pubkey,
    pub owner: Pubkey,
}

#[event]
pub struct AccessControllerSet {
    pub proxy: Pubkey,
    pub access_controller: Pubkey,
}
