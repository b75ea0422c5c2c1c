use anchor_lang::prelude::*;
use static_assertions::const_assert;
use std::mem;

use arrayvec::arrayvec;

declare_id!("2ckhep7Mvy1dExenBqpcdevhRu7CLuuctMcx7G9mWEvo");

#[constant]
pub const MAX_ADDRS: usize = 64;

#[zero_copy]
pub struct AccessList {
    xs: [Pubkey; 64], // MAX_ADDRS, spelled out for the IDL parser
    len: u64,
}
arrayvec!(AccessList, Pubkey, u64);
const_assert!(
    mem::size_of::<AccessList>() == mem::size_of::<u64>() + mem::size_of::<Pubkey>() * MAX_ADDRS
);

#[account(zero_copy)]
pub struct AccessController {
    pub owner: Pubkey,
    pub proposed_owner: Pubkey,
    /// Zero disables the check and grants access to everyone.
    pub check_enabled: u8,
    _padding0: [u8; 7],
    pub access_list: AccessList,
}

impl AccessController {
    /// Whether `address` passes the access check.
    pub fn grants(&self, address: &Pubkey) -> bool {
        self.check_enabled == 0 || self.access_list.binary_search(address).is_ok()
    }

    /// Inserts `address` keeping the list sorted. Returns `false` if it was already present.
    pub fn add(&mut self, address: Pubkey) -> Result<bool> {
        match self.access_list.binary_search(&address) {
            Ok(_i) => Ok(false),
            Err(i) => {
                require!(self.access_list.remaining_capacity() > 0, Full);
                self.access_list.insert(i, address);
                Ok(true)
            }
        }
    }

    /// Returns `false` if `address` was not on the list.
    pub fn remove(&mut self, address: &Pubkey) -> bool {
        match self.access_list.binary_search(address) {
            Ok(index) => {
                // removal keeps the list sorted
                self.access_list.remove(index);
                true
            }
            Err(_) => false,
        }
    }
}

#[program]
pub mod access_controller {
    use super::*;
    pub fn initialize(ctx: Context<Initialize>) -> Result<()> {
        let mut state = ctx.accounts.state.load_init()?;
        state.owner = ctx.accounts.owner.key();
        state.check_enabled = 1;
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.state, &ctx.accounts.authority))]
    pub fn transfer_ownership(
        ctx: Context<TransferOwnership>,
        proposed_owner: Pubkey,
    ) -> Result<()> {
        require!(proposed_owner != Pubkey::default(), InvalidInput);
        let state = &mut *ctx.accounts.state.load_mut()?;
        state.proposed_owner = proposed_owner;
        Ok(())
    }

    pub fn accept_ownership(ctx: Context<AcceptOwnership>) -> Result<()> {
        let state = &mut *ctx.accounts.state.load_mut()?;
        require!(
            ctx.accounts.authority.key == &state.proposed_owner,
            Unauthorized
        );
        state.owner = std::mem::take(&mut state.proposed_owner);
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.state, &ctx.accounts.owner))]
    pub fn add_access(ctx: Context<AddAccess>) -> Result<()> {
        let mut state = ctx.accounts.state.load_mut()?;
        let address = ctx.accounts.address.key();

        if state.add(address)? {
            emit!(AddedAccess { user: address });
        }
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.state, &ctx.accounts.owner))]
    pub fn remove_access(ctx: Context<RemoveAccess>) -> Result<()> {
        let mut state = ctx.accounts.state.load_mut()?;
        let address = ctx.accounts.address.key();

        if state.remove(&address) {
            emit!(RemovedAccess { user: address });
        }
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.state, &ctx.accounts.owner))]
    pub fn enable_access_check(ctx: Context<SetAccessCheck>) -> Result<()> {
        let mut state = ctx.accounts.state.load_mut()?;
        if state.check_enabled == 0 {
            state.check_enabled = 1;
            emit!(CheckAccessEnabled {});
        }
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.state, &ctx.accounts.owner))]
    pub fn disable_access_check(ctx: Context<SetAccessCheck>) -> Result<()> {
        let mut state = ctx.accounts.state.load_mut()?;
        if state.check_enabled != 0 {
            state.check_enabled = 0;
            emit!(CheckAccessDisabled {});
        }
        Ok(())
    }
}

/// Check if `address` passes the access check of the controller.
pub fn has_access(loader: &AccountLoader<AccessController>, address: &Pubkey) -> Result<bool> {
    let state = loader.load()?;
    Ok(state.grants(address))
}

fn owner(state_loader: &AccountLoader<AccessController>, signer: &AccountInfo) -> Result<()> {
    let config = state_loader.load()?;
    require!(signer.key.eq(&config.owner), Unauthorized);
    Ok(())
}

#[event]
pub struct AddedAccess {
    pub user: Pubkey,
}

#[event]
pub struct RemovedAccess {
    pub user: Pubkey,
}

#[event]
pub struct CheckAccessEnabled {}

#[event]
pub struct CheckAccessDisabled {}

#[error_code]
pub enum ErrorCode {
    #[msg("Unauthorized")]
    Unauthorized = 0,

    #[msg("Invalid input")]
    InvalidInput = 1,

    #[msg("Access list is full")]
    Full = 2,
}

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(zero)]
    pub state: AccountLoader<'info, AccessController>,
    pub owner: Signer<'info>,
}

#[derive(Accounts)]
pub struct TransferOwnership<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, AccessController>,
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct AcceptOwnership<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, AccessController>,
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct AddAccess<'info> {
    #[account(mut, has_one = owner)]
    pub state: AccountLoader<'info, AccessController>,
    pub owner: Signer<'info>,
    /// CHECK: We don't impose any limits since this could be any signer.
    pub address: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct RemoveAccess<'info> {
    #[account(mut, has_one = owner)]
    pub state: AccountLoader<'info, AccessController>,
    pub owner: Signer<'info>,
    /// CHECK: We don't impose any limits since this could be any signer.
    pub address: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct SetAccessCheck<'info> {
    #[account(mut, has_one = owner)]
    pub state: AccountLoader<'info, AccessController>,
    pub owner: Signer<'info>,
}
