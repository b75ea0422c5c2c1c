use anchor_lang::prelude::*;

#[event]
pub struct SetConfig {
    pub config_count: u32,
    pub signers: Vec<Pubkey>,
    pub transmitters: Vec<Pubkey>,
}

#[event]
pub struct SetBilling {
    pub max_gas_price: u32,
    pub reasonable_gas_price: u32,
    pub micro_token_per_native: u32,
    pub token_per_observation: u32,
    pub token_per_transmission: u32,
}

#[event]
pub struct TokenSet {
    pub previous_mint: Pubkey,
    pub mint: Pubkey,
}

#[event]
pub struct OraclePaid {
    pub transmitter: Pubkey,
    pub payee: Pubkey,
    pub amount: u64,
}

#[event]
pub struct TransmissionRecorded {
    #[index]
    pub transmitter: u8,
    pub observer_count: u8,
    pub gas_price: u64,
    pub reimbursement: u64,
}

#[event]
pub struct PayeeshipTransferRequested {
    pub transmitter: Pubkey,
    pub current: Pubkey,
    pub proposed: Pubkey,
}

#[event]
pub struct PayeeshipTransferred {
    pub transmitter: Pubkey,
    pub previous: Pubkey,
    pub current: Pubkey,
}
