use anchor_lang::prelude::*;

use access_controller::AccessController;

mod aggregator;
mod combine;
mod context;
mod event;
mod feed;
pub mod round_id;
mod state;

use crate::context::*;
pub use crate::aggregator::{
    determine_timestamps, AccessChecked, AccessPolicy, Aggregator, CombinedFeed,
    ControllerPolicy, PhaseAccount, PhaseHistory, RoundData,
};
pub use crate::combine::combine;
pub use crate::feed::{FeedRound, FeedSource, PhaseFeeds, StoreFeed};
pub use crate::state::{FeedPair, Phase, PhaseRecord, Proxy};

declare_id!("DyctxziZ9TVyFKk3wEHW6jhfHSwgSmC111KBATNA8LGd");

#[constant]
pub const VERSION: u8 = 1;

#[derive(AnchorSerialize, AnchorDeserialize)]
pub enum Scope {
    Version,
    Decimals,
    Description,
    LatestRoundData,
    RoundData { round_id: u128 },
    LatestAnswer,
    LatestTimestamp,
    LatestRound,
    Answer { round_id: u128 },
    Timestamp { round_id: u128 },
    PhaseId,
    PhaseFeeds { phase_id: u16 },
    Feeds,
    ProposedFeeds,
    ProposedLatestRoundData,
    ProposedRoundData { round_id: u128 },
}

#[program]
pub mod combined_feed {
    use super::*;

    pub fn initialize(
        ctx: Context<Initialize>,
        decimals: u8,
        description: String,
        feed_x: Pubkey,
        feed_y: Pubkey,
    ) -> Result<()> {
        let feeds = FeedPair::new(feed_x, feed_y);
        require!(feeds.is_complete(), InvalidInput);

        let proxy = &mut ctx.accounts.proxy;
        proxy.version = VERSION;
        proxy.owner = ctx.accounts.owner.key();
        proxy.decimals = decimals;
        proxy.set_description(&description)?;

        let access_controller = &ctx.accounts.access_controller;
        check_access_controller(access_controller)?;
        proxy.access_controller = access_controller.key();

        let phase = proxy.set_pair(feeds);
        let record = &mut ctx.accounts.phase;
        record.proxy = proxy.key();
        record.phase = phase;

        emit!(event::PairConfirmed {
            proxy: proxy.key(),
            phase_id: phase.id,
            feed_x,
            feed_y,
        });
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.proxy, &ctx.accounts.authority))]
    pub fn transfer_ownership(
        ctx: Context<TransferOwnership>,
        proposed_owner: Pubkey,
    ) -> Result<()> {
        require!(proposed_owner != Pubkey::default(), InvalidInput);
        ctx.accounts.proxy.proposed_owner = proposed_owner;
        Ok(())
    }

    pub fn accept_ownership(ctx: Context<AcceptOwnership>) -> Result<()> {
        let proxy = &mut ctx.accounts.proxy;
        let owner = std::mem::take(&mut proxy.proposed_owner);
        let previous_owner = std::mem::replace(&mut proxy.owner, owner);
        emit!(event::OwnershipTransferred {
            proxy: proxy.key(),
            previous_owner,
            owner,
        });
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.proxy, &ctx.accounts.authority))]
    pub fn set_access_controller(ctx: Context<SetAccessController>) -> Result<()> {
        let access_controller = &ctx.accounts.access_controller;
        check_access_controller(access_controller)?;

        let proxy = &mut ctx.accounts.proxy;
        proxy.access_controller = access_controller.key();
        emit!(event::AccessControllerSet {
            proxy: proxy.key(),
            access_controller: access_controller.key(),
        });
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.proxy, &ctx.accounts.authority))]
    pub fn propose_pair(ctx: Context<ProposePair>, feed_x: Pubkey, feed_y: Pubkey) -> Result<()> {
        let proxy = &mut ctx.accounts.proxy;
        proxy.propose_pair(FeedPair::new(feed_x, feed_y))?;
        emit!(event::PairProposed {
            proxy: proxy.key(),
            feed_x,
            feed_y,
        });
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.proxy, &ctx.accounts.authority))]
    pub fn confirm_pair(ctx: Context<ConfirmPair>, feed_x: Pubkey, feed_y: Pubkey) -> Result<()> {
        let proxy = &mut ctx.accounts.proxy;
        let phase = proxy.confirm_pair(FeedPair::new(feed_x, feed_y))?;
        if phase.id == 0 {
            msg!("phase id wrapped around to 0");
        }

        let record = &mut ctx.accounts.phase;
        record.proxy = proxy.key();
        record.phase = phase;

        emit!(event::PairConfirmed {
            proxy: proxy.key(),
            phase_id: phase.id,
            feed_x,
            feed_y,
        });
        Ok(())
    }

    /// Answers a `Scope` in the transaction return data, subject to the proxy's access controller.
    pub fn query(ctx: Context<Query>, scope: Scope) -> Result<()> {
        use std::io::Cursor;

        let accounts = &ctx.accounts;
        let proxy = &accounts.proxy;

        let history = PhaseAccount::new(proxy, proxy.key(), &accounts.phase);
        let feeds = PhaseFeeds::new(
            StoreFeed::new(
                accounts.feed_x_program.to_account_info(),
                accounts.feed_x.to_account_info(),
            ),
            StoreFeed::new(
                accounts.feed_y_program.to_account_info(),
                accounts.feed_y.to_account_info(),
            ),
        );

        let controller: AccountLoader<AccessController>;
        let policy = if proxy.access_controller == Pubkey::default() {
            None
        } else {
            controller = AccountLoader::try_from(&accounts.access_controller.to_account_info())?;
            Some(ControllerPolicy(&controller))
        };

        let feed = AccessChecked::new(
            CombinedFeed::new(proxy, history, feeds),
            policy,
            accounts.authority.key(),
        );

        let mut buf = Cursor::new(Vec::with_capacity(128));
        match scope {
            Scope::Version => feed.version()?.serialize(&mut buf)?,
            Scope::Decimals => feed.decimals()?.serialize(&mut buf)?,
            Scope::Description => feed.description()?.serialize(&mut buf)?,
            Scope::LatestRoundData => feed.latest_round_data()?.serialize(&mut buf)?,
            Scope::RoundData { round_id } => feed.round_data(round_id)?.serialize(&mut buf)?,
            Scope::LatestAnswer => feed.latest_answer()?.serialize(&mut buf)?,
            Scope::LatestTimestamp => feed.latest_timestamp()?.serialize(&mut buf)?,
            Scope::LatestRound => feed.latest_round()?.serialize(&mut buf)?,
            Scope::Answer { round_id } => feed.answer(round_id)?.serialize(&mut buf)?,
            Scope::Timestamp { round_id } => feed.timestamp(round_id)?.serialize(&mut buf)?,
            Scope::PhaseId => feed.phase_id()?.serialize(&mut buf)?,
            Scope::PhaseFeeds { phase_id } => feed.phase_feeds(phase_id)?.serialize(&mut buf)?,
            Scope::Feeds => feed.feeds()?.serialize(&mut buf)?,
            Scope::ProposedFeeds => feed.proposed_feeds()?.serialize(&mut buf)?,
            Scope::ProposedLatestRoundData => {
                feed.proposed_latest_round_data()?.serialize(&mut buf)?
            }
            Scope::ProposedRoundData { round_id } => {
                feed.proposed_round_data(round_id)?.serialize(&mut buf)?
            }
        }

        anchor_lang::solana_program::program::set_return_data(buf.get_ref());
        Ok(())
    }
}

// Only owner access
fn owner(proxy: &Account<Proxy>, signer: &AccountInfo) -> Result<()> {
    require!(signer.key.eq(&proxy.owner), Unauthorized);
    Ok(())
}

/// The system program id stands for "no controller", anything else has to be a loadable controller.
fn check_access_controller(account: &AccountInfo) -> Result<()> {
    if account.key() != Pubkey::default() {
        let controller: AccountLoader<AccessController> = AccountLoader::try_from(account)?;
        controller.load()?;
    }
    Ok(())
}

#[error_code]
pub enum ErrorCode {
    #[msg("Unauthorized")]
    Unauthorized = 0,

    #[msg("Invalid input")]
    InvalidInput = 1,

    #[msg("Combined answer does not fit the answer domain")]
    Overflow = 2,

    #[msg("No feed pair is proposed")]
    NoProposal = 3,

    #[msg("Underlying feed returned no answer")]
    FeedUnavailable = 4,
}
