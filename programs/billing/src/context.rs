use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::state::State;
use crate::ErrorCode;

use access_controller::AccessController;

// NOTE: (has_one = name) is equivalent to a custom access_control

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(zero)]
    pub state: AccountLoader<'info, State>,
    pub owner: Signer<'info>,

    pub token_mint: Account<'info, Mint>,
    #[account(
        associated_token::mint = token_mint,
        associated_token::authority = vault_authority,
    )]
    pub token_vault: Account<'info, TokenAccount>,
    /// CHECK: this is a PDA
    #[account(seeds = [b"vault", state.key().as_ref()], bump)]
    pub vault_authority: AccountInfo<'info>,

    pub billing_access_controller: AccountLoader<'info, AccessController>,
    /// CHECK: any signer the owner trusts to relay transmissions
    pub transmission_authority: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct TransferOwnership<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    #[account(address = state.load()?.config.owner @ ErrorCode::Unauthorized)]
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct AcceptOwnership<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    #[account(address = state.load()?.config.proposed_owner @ ErrorCode::Unauthorized)]
    pub authority: Signer<'info>,
}

/// Used by set_config, set_billing and pay_oracles.
/// Expects the token accounts of the payees owed a payment as remaining_accounts.
#[derive(Accounts)]
pub struct SetConfig<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    #[account(address = state.load()?.config.owner @ ErrorCode::Unauthorized)]
    pub authority: Signer<'info>,

    #[account(mut, address = state.load()?.config.token_vault)]
    pub token_vault: Account<'info, TokenAccount>,
    /// CHECK: This is a PDA
    #[account(seeds = [b"vault", state.key().as_ref()], bump = state.load()?.vault_nonce)]
    pub vault_authority: AccountInfo<'info>,

    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct SetBilling<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    pub authority: Signer<'info>,
    pub access_controller: AccountLoader<'info, AccessController>,

    #[account(mut, address = state.load()?.config.token_vault)]
    pub token_vault: Account<'info, TokenAccount>,
    /// CHECK: This is a PDA
    #[account(seeds = [b"vault", state.key().as_ref()], bump = state.load()?.vault_nonce)]
    pub vault_authority: AccountInfo<'info>,

    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct SetToken<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    #[account(address = state.load()?.config.owner @ ErrorCode::Unauthorized)]
    pub authority: Signer<'info>,

    #[account(mut, address = state.load()?.config.token_vault)]
    pub token_vault: Account<'info, TokenAccount>,
    /// CHECK: This is a PDA
    #[account(seeds = [b"vault", state.key().as_ref()], bump = state.load()?.vault_nonce)]
    pub vault_authority: AccountInfo<'info>,
    // Receives the remaining balance of the previous token
    #[account(mut, token::mint = state.load()?.config.token_mint)]
    pub recipient: Account<'info, TokenAccount>,

    pub token_mint: Account<'info, Mint>,
    #[account(
        associated_token::mint = token_mint,
        associated_token::authority = vault_authority,
    )]
    pub new_token_vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct SetTransmissionAuthority<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    #[account(address = state.load()?.config.owner @ ErrorCode::Unauthorized)]
    pub authority: Signer<'info>,
    /// CHECK: any signer the owner trusts to relay transmissions
    pub transmission_authority: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct RecordTransmission<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    #[account(address = state.load()?.config.transmission_authority @ ErrorCode::Unauthorized)]
    pub transmission_authority: Signer<'info>,
    pub transmitter: Signer<'info>,
}

#[derive(Accounts)]
pub struct SetAccessController<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    #[account(address = state.load()?.config.owner @ ErrorCode::Unauthorized)]
    pub authority: Signer<'info>,
    pub access_controller: AccountLoader<'info, AccessController>,
}

#[derive(Accounts)]
pub struct WithdrawFunds<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    pub authority: Signer<'info>,
    pub access_controller: AccountLoader<'info, AccessController>,
    #[account(mut, address = state.load()?.config.token_vault)]
    pub token_vault: Account<'info, TokenAccount>,
    /// CHECK: This is a PDA
    #[account(seeds = [b"vault", state.key().as_ref()], bump = state.load()?.vault_nonce)]
    pub vault_authority: AccountInfo<'info>,
    #[account(mut, token::mint = state.load()?.config.token_mint)]
    pub recipient: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct WithdrawPayment<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    pub authority: Signer<'info>,
    /// CHECK: matched against the transmitters of the roster
    pub transmitter: UncheckedAccount<'info>,
    #[account(mut, address = state.load()?.config.token_vault)]
    pub token_vault: Account<'info, TokenAccount>,
    /// CHECK: This is a PDA
    #[account(seeds = [b"vault", state.key().as_ref()], bump = state.load()?.vault_nonce)]
    pub vault_authority: AccountInfo<'info>,
    #[account(mut, token::mint = state.load()?.config.token_mint, token::authority = authority)]
    pub payee: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct SetPayees<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    #[account(address = state.load()?.config.owner @ ErrorCode::Unauthorized)]
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct TransferPayeeship<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    pub authority: Signer<'info>,
    /// CHECK: matched against the transmitters of the roster
    pub transmitter: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct AcceptPayeeship<'info> {
    #[account(mut)]
    pub state: AccountLoader<'info, State>,
    pub authority: Signer<'info>,
    /// CHECK: matched against the transmitters of the roster
    pub transmitter: UncheckedAccount<'info>,
}
