use anchor_lang::prelude::*;

use crate::state::{PhaseRecord, Proxy};
use crate::ErrorCode;

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(zero)]
    pub proxy: Account<'info, Proxy>,
    pub owner: Signer<'info>,

    #[account(mut)]
    pub payer: Signer<'info>,
    pub system_program: Program<'info, System>,
    #[account(
        init,
        payer = payer,
        space = 8 + PhaseRecord::LEN,
        seeds = [b"phase", proxy.key().as_ref(), &PhaseRecord::seed(1)],
        bump,
    )]
    pub phase: Account<'info, PhaseRecord>,

    /// CHECK: an access controller, or the system program to leave reads unrestricted
    pub access_controller: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct TransferOwnership<'info> {
    #[account(mut)]
    pub proxy: Account<'info, Proxy>,
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct AcceptOwnership<'info> {
    #[account(mut)]
    pub proxy: Account<'info, Proxy>,
    #[account(address = proxy.proposed_owner @ ErrorCode::Unauthorized)]
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct SetAccessController<'info> {
    #[account(mut)]
    pub proxy: Account<'info, Proxy>,
    pub authority: Signer<'info>,
    /// CHECK: an access controller, or the system program to leave reads unrestricted
    pub access_controller: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct ProposePair<'info> {
    #[account(mut)]
    pub proxy: Account<'info, Proxy>,
    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct ConfirmPair<'info> {
    #[account(mut)]
    pub proxy: Account<'info, Proxy>,
    pub authority: Signer<'info>,

    #[account(mut)]
    pub payer: Signer<'info>,
    pub system_program: Program<'info, System>,
    #[account(
        init,
        payer = payer,
        space = 8 + PhaseRecord::LEN,
        seeds = [b"phase", proxy.key().as_ref(), &PhaseRecord::seed(proxy.next_phase_id())],
        bump,
    )]
    pub phase: Account<'info, PhaseRecord>,
}

#[derive(Accounts)]
pub struct Query<'info> {
    pub proxy: Account<'info, Proxy>,
    /// CHECK: matched against the proxy, loaded only when reads are restricted
    #[account(address = proxy.access_controller @ ErrorCode::InvalidInput)]
    pub access_controller: UncheckedAccount<'info>,
    pub authority: Signer<'info>,

    /// CHECK: record of the phase a historical round belongs to, validated on lookup
    pub phase: UncheckedAccount<'info>,

    /// CHECK: ownership checked against feed_x_program before every query
    pub feed_x: UncheckedAccount<'info>,
    /// CHECK: store-compatible program, invoked through `query`
    #[account(executable)]
    pub feed_x_program: UncheckedAccount<'info>,
    /// CHECK: ownership checked against feed_y_program before every query
    pub feed_y: UncheckedAccount<'info>,
    /// CHECK: store-compatible program, invoked through `query`
    #[account(executable)]
    pub feed_y_program: UncheckedAccount<'info>,
}
