//! Access to the underlying price feeds.
//!
//! Underlying feeds are accounts of a store-compatible program: one answering the `query`
//! instruction with a borsh encoded response in the transaction return data.

use anchor_lang::prelude::*;
use anchor_lang::solana_program::{
    instruction::{AccountMeta, Instruction},
    program::{get_return_data, invoke},
};

use crate::ErrorCode;

/// A single round as reported by an underlying feed. Zero timestamps mean unset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedRound {
    pub round_id: u32,
    pub answer: i128,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: u32,
}

pub trait FeedSource {
    fn decimals(&self, feed: &Pubkey) -> Result<u8>;
    fn description(&self, feed: &Pubkey) -> Result<String>;
    fn version(&self, feed: &Pubkey) -> Result<u8>;
    fn latest_round_data(&self, feed: &Pubkey) -> Result<FeedRound>;
    fn round_data(&self, feed: &Pubkey, round_id: u32) -> Result<FeedRound>;
}

// Variant order is the wire format of the store program's `Scope`.
#[derive(AnchorSerialize)]
enum StoreQuery {
    Version,
    Decimals,
    Description,
    RoundData { round_id: u32 },
    LatestRoundData,
}

#[derive(AnchorDeserialize)]
struct StoreRound {
    round_id: u32,
    _slot: u64,
    timestamp: u32,
    answer: i128,
}

impl From<StoreRound> for FeedRound {
    fn from(round: StoreRound) -> Self {
        // store rounds carry a single observation timestamp and always answer in-round
        let timestamp = u64::from(round.timestamp);
        Self {
            round_id: round.round_id,
            answer: round.answer,
            started_at: timestamp,
            updated_at: timestamp,
            answered_in_round: round.round_id,
        }
    }
}

/// sha256("global:query")[..8]
const QUERY_DISCRIMINATOR: [u8; 8] = [0x27, 0xfb, 0x82, 0x9f, 0x2e, 0x88, 0xa4, 0xa9];

/// A feed account together with the program that owns it.
pub struct StoreFeed<'info> {
    program: AccountInfo<'info>,
    feed: AccountInfo<'info>,
}

impl<'info> StoreFeed<'info> {
    pub fn new(program: AccountInfo<'info>, feed: AccountInfo<'info>) -> Self {
        Self { program, feed }
    }

    pub fn key(&self) -> &Pubkey {
        self.feed.key
    }

    fn query<T: AnchorDeserialize>(&self, scope: StoreQuery) -> Result<T> {
        require!(self.feed.owner == self.program.key, InvalidInput);

        let mut data = Vec::with_capacity(QUERY_DISCRIMINATOR.len() + 5);
        data.extend_from_slice(&QUERY_DISCRIMINATOR);
        scope.serialize(&mut data)?;

        let ix = Instruction {
            program_id: *self.program.key,
            accounts: vec![AccountMeta::new_readonly(*self.feed.key, false)],
            data,
        };
        invoke(&ix, &[self.feed.clone()])?;

        let (program_id, data) = get_return_data().ok_or(ErrorCode::FeedUnavailable)?;
        require!(program_id == *self.program.key, FeedUnavailable);
        Ok(T::try_from_slice(&data)?)
    }
}

/// The two feeds of a phase, as passed to an instruction.
pub struct PhaseFeeds<'info> {
    x: StoreFeed<'info>,
    y: StoreFeed<'info>,
}

impl<'info> PhaseFeeds<'info> {
    pub fn new(x: StoreFeed<'info>, y: StoreFeed<'info>) -> Self {
        Self { x, y }
    }

    fn select(&self, feed: &Pubkey) -> Result<&StoreFeed<'info>> {
        if self.x.key() == feed {
            Ok(&self.x)
        } else if self.y.key() == feed {
            Ok(&self.y)
        } else {
            msg!("feed {} was not passed to the instruction", feed);
            err!(ErrorCode::InvalidInput)
        }
    }
}

impl FeedSource for PhaseFeeds<'_> {
    fn decimals(&self, feed: &Pubkey) -> Result<u8> {
        self.select(feed)?.query(StoreQuery::Decimals)
    }

    fn description(&self, feed: &Pubkey) -> Result<String> {
        self.select(feed)?.query(StoreQuery::Description)
    }

    fn version(&self, feed: &Pubkey) -> Result<u8> {
        self.select(feed)?.query(StoreQuery::Version)
    }

    fn latest_round_data(&self, feed: &Pubkey) -> Result<FeedRound> {
        let round: StoreRound = self.select(feed)?.query(StoreQuery::LatestRoundData)?;
        Ok(round.into())
    }

    fn round_data(&self, feed: &Pubkey, round_id: u32) -> Result<FeedRound> {
        let round: StoreRound = self
            .select(feed)?
            .query(StoreQuery::RoundData { round_id })?;
        Ok(round.into())
    }
}
