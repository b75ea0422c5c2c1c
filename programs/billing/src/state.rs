use anchor_lang::prelude::*;
use static_assertions::const_assert;
use std::mem;

use arrayvec::arrayvec;

use crate::ledger::Ledger;

// NOTE: ALL types in this file have to be verified to contain no padding via `cargo rustc -- -Zprint-type-sizes`!

#[constant]
pub const MAX_ORACLES: usize = 31;
// The reporting protocol is designed for at most 31 oracles; observer indices are compact `u8`s.
const_assert!(MAX_ORACLES <= 31);

#[zero_copy]
pub struct Billing {
    /// Highest gas price ever reimbursed, in native units per gas.
    pub max_gas_price: u32,
    /// Gas price transmitters are encouraged to stay below, in native units per gas.
    pub reasonable_gas_price: u32,
    /// Millionths of a token base unit paid per native unit of gas cost.
    pub micro_token_per_native: u32,
    pub token_per_observation: u32,
    pub token_per_transmission: u32,
}

#[zero_copy]
pub struct Oracle {
    pub signer: Pubkey,
    pub transmitter: Pubkey,
    /// Wallet receiving the transmitter's rewards, zeroed until set
    pub payee: Pubkey,
    /// will be zeroed out if empty
    pub proposed_payee: Pubkey,
}

impl Default for Oracle {
    fn default() -> Self {
        Self {
            signer: Pubkey::default(),
            transmitter: Pubkey::default(),
            payee: Pubkey::default(),
            proposed_payee: Pubkey::default(),
        }
    }
}

#[zero_copy]
pub struct Oracles {
    xs: [Oracle; 31], // sadly we can't use const https://github.com/project-serum/anchor/issues/632
    len: u64,
}
arrayvec!(Oracles, Oracle, u64);
const_assert!(
    mem::size_of::<Oracles>() == mem::size_of::<u64>() + mem::size_of::<Oracle>() * MAX_ORACLES
);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Signer,
    Transmitter,
}

/// Position of an address in the roster, the index shared by both of an oracle's keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Membership {
    pub index: usize,
    pub role: Role,
}

impl Oracles {
    pub fn resolve(&self, address: &Pubkey) -> Option<Membership> {
        self.iter().enumerate().find_map(|(index, oracle)| {
            let role = if &oracle.transmitter == address {
                Role::Transmitter
            } else if &oracle.signer == address {
                Role::Signer
            } else {
                return None;
            };
            Some(Membership { index, role })
        })
    }

    pub fn transmitter_mut(&mut self, transmitter: &Pubkey) -> Result<&mut Oracle> {
        self.iter_mut()
            .find(|oracle| &oracle.transmitter == transmitter)
            .ok_or_else(|| error!(crate::ErrorCode::InvalidInput))
    }
}

#[account(zero_copy)]
pub struct State {
    pub version: u8,
    pub vault_nonce: u8,
    _padding0: u16,
    _padding1: u32,
    pub config: Config,
    pub oracles: Oracles,
    pub ledger: Ledger,
}

#[zero_copy]
pub struct Config {
    pub owner: Pubkey,
    pub proposed_owner: Pubkey,

    /// Payout SPL token mint.
    pub token_mint: Pubkey,
    /// Payout SPL token vault, owned by the vault authority PDA.
    pub token_vault: Pubkey,
    /// Access controller program managing access to billing.
    pub billing_access_controller: Pubkey,
    /// Authenticated caller reporting transmissions on behalf of the transmitters.
    pub transmission_authority: Pubkey,

    pub billing: Billing,
    pub config_count: u32,
}
