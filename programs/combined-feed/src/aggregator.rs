use anchor_lang::prelude::*;

use access_controller::AccessController;

use crate::combine::combine;
use crate::feed::{FeedRound, FeedSource};
use crate::round_id;
use crate::state::{FeedPair, Phase, PhaseRecord, Proxy};
use crate::ErrorCode;

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoundData {
    pub round_id: u128,
    pub answer: i128,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: u128,
}

/// Read interface of a combined feed.
pub trait Aggregator {
    fn decimals(&self) -> Result<u8>;
    fn description(&self) -> Result<String>;
    fn version(&self) -> Result<u8>;

    fn latest_round_data(&self) -> Result<RoundData>;
    /// Rounds of unknown phases are returned zeroed.
    fn round_data(&self, round_id: u128) -> Result<RoundData>;

    fn phase_id(&self) -> Result<u16>;
    fn feeds(&self) -> Result<FeedPair>;
    /// Feeds of a historical phase, empty if the phase is unknown.
    fn phase_feeds(&self, phase_id: u16) -> Result<FeedPair>;

    fn proposed_feeds(&self) -> Result<FeedPair>;
    fn proposed_latest_round_data(&self) -> Result<RoundData>;
    fn proposed_round_data(&self, round_id: u128) -> Result<RoundData>;

    fn latest_answer(&self) -> Result<i128> {
        Ok(self.latest_round_data()?.answer)
    }

    fn latest_timestamp(&self) -> Result<u64> {
        Ok(self.latest_round_data()?.updated_at)
    }

    fn latest_round(&self) -> Result<u128> {
        Ok(self.latest_round_data()?.round_id)
    }

    fn answer(&self, round_id: u128) -> Result<i128> {
        Ok(self.round_data(round_id)?.answer)
    }

    fn timestamp(&self, round_id: u128) -> Result<u64> {
        Ok(self.round_data(round_id)?.updated_at)
    }
}

pub trait PhaseHistory {
    fn phase(&self, phase_id: u16) -> Result<Option<Phase>>;
}

/// Combined `(started_at, updated_at)` of two rounds.
///
/// A round missing either timestamp on either side leaves the combined round unset,
/// otherwise the older of each timestamp wins.
pub fn determine_timestamps(x: &FeedRound, y: &FeedRound) -> (u64, u64) {
    let unset = [x.started_at, x.updated_at, y.started_at, y.updated_at].contains(&0);
    if unset {
        return (0, 0);
    }
    (
        x.started_at.min(y.started_at),
        x.updated_at.min(y.updated_at),
    )
}

pub struct CombinedFeed<'a, H, S> {
    proxy: &'a Proxy,
    history: H,
    feeds: S,
}

impl<'a, H: PhaseHistory, S: FeedSource> CombinedFeed<'a, H, S> {
    pub fn new(proxy: &'a Proxy, history: H, feeds: S) -> Self {
        Self {
            proxy,
            history,
            feeds,
        }
    }

    fn combine_rounds(
        &self,
        phase_id: u16,
        feeds: &FeedPair,
        x: &FeedRound,
        y: &FeedRound,
    ) -> Result<RoundData> {
        let answer = combine(
            x.answer,
            y.answer,
            self.feeds.decimals(&feeds.x)?,
            self.feeds.decimals(&feeds.y)?,
            self.proxy.decimals,
        )?;
        let (started_at, updated_at) = determine_timestamps(x, y);

        Ok(RoundData {
            round_id: round_id::encode(phase_id, x.round_id, y.round_id),
            answer,
            started_at,
            updated_at,
            answered_in_round: round_id::encode(
                phase_id,
                x.answered_in_round,
                y.answered_in_round,
            ),
        })
    }

    fn latest_of(&self, phase_id: u16, feeds: &FeedPair) -> Result<RoundData> {
        let x = self.feeds.latest_round_data(&feeds.x)?;
        let y = self.feeds.latest_round_data(&feeds.y)?;
        self.combine_rounds(phase_id, feeds, &x, &y)
    }

    fn round_of(&self, phase_id: u16, feeds: &FeedPair, round_id: u128) -> Result<RoundData> {
        let (_phase_id, round_x, round_y) = round_id::decode(round_id);
        let x = self.feeds.round_data(&feeds.x, round_x)?;
        let y = self.feeds.round_data(&feeds.y, round_y)?;
        self.combine_rounds(phase_id, feeds, &x, &y)
    }

    fn proposal(&self) -> Result<FeedPair> {
        let proposed = self.proxy.proposed;
        require!(!proposed.is_empty(), NoProposal);
        Ok(proposed)
    }
}

impl<H: PhaseHistory, S: FeedSource> Aggregator for CombinedFeed<'_, H, S> {
    fn decimals(&self) -> Result<u8> {
        Ok(self.proxy.decimals)
    }

    fn description(&self) -> Result<String> {
        self.proxy.description()
    }

    fn version(&self) -> Result<u8> {
        Ok(crate::VERSION)
    }

    fn latest_round_data(&self) -> Result<RoundData> {
        let phase = self.proxy.phase;
        self.latest_of(phase.id, &phase.feeds)
    }

    fn round_data(&self, round_id: u128) -> Result<RoundData> {
        let (phase_id, _, _) = round_id::decode(round_id);
        match self.history.phase(phase_id)? {
            Some(phase) => self.round_of(phase.id, &phase.feeds, round_id),
            None => Ok(RoundData::default()),
        }
    }

    fn phase_id(&self) -> Result<u16> {
        Ok(self.proxy.phase.id)
    }

    fn feeds(&self) -> Result<FeedPair> {
        Ok(self.proxy.phase.feeds)
    }

    fn phase_feeds(&self, phase_id: u16) -> Result<FeedPair> {
        Ok(self
            .history
            .phase(phase_id)?
            .map(|phase| phase.feeds)
            .unwrap_or_default())
    }

    fn proposed_feeds(&self) -> Result<FeedPair> {
        self.proposal()
    }

    fn proposed_latest_round_data(&self) -> Result<RoundData> {
        let feeds = self.proposal()?;
        self.latest_of(self.proxy.next_phase_id(), &feeds)
    }

    /// Proposed rounds are addressed with the phase id the proposal would be confirmed under.
    fn proposed_round_data(&self, round_id: u128) -> Result<RoundData> {
        let feeds = self.proposal()?;
        let phase_id = self.proxy.next_phase_id();
        let (requested, _, _) = round_id::decode(round_id);
        if requested != phase_id {
            return Ok(RoundData::default());
        }
        self.round_of(phase_id, &feeds, round_id)
    }
}

/// Phase lookup backed by the `PhaseRecord` account passed to an instruction.
pub struct PhaseAccount<'a, 'info> {
    proxy: &'a Proxy,
    proxy_key: Pubkey,
    account: &'a AccountInfo<'info>,
}

impl<'a, 'info> PhaseAccount<'a, 'info> {
    pub fn new(proxy: &'a Proxy, proxy_key: Pubkey, account: &'a AccountInfo<'info>) -> Self {
        Self {
            proxy,
            proxy_key,
            account,
        }
    }
}

impl PhaseHistory for PhaseAccount<'_, '_> {
    fn phase(&self, phase_id: u16) -> Result<Option<Phase>> {
        // the current phase is served from the proxy itself
        if phase_id == self.proxy.phase.id {
            return Ok(Some(self.proxy.phase));
        }

        let (address, _bump) = PhaseRecord::address(&self.proxy_key, phase_id);
        require!(self.account.key == &address, InvalidInput);

        // never written
        if self.account.data_is_empty() || self.account.owner != &crate::ID {
            return Ok(None);
        }

        let data = self.account.try_borrow_data()?;
        let record = PhaseRecord::try_deserialize(&mut &data[..])?;
        Ok(Some(record.phase))
    }
}

pub trait AccessPolicy {
    fn has_access(&self, caller: &Pubkey, payload: &[u8]) -> Result<bool>;
}

/// Policy backed by an access controller account. The payload is not consulted.
pub struct ControllerPolicy<'a, 'info>(pub &'a AccountLoader<'info, AccessController>);

impl AccessPolicy for ControllerPolicy<'_, '_> {
    fn has_access(&self, caller: &Pubkey, _payload: &[u8]) -> Result<bool> {
        access_controller::has_access(self.0, caller)
    }
}

/// Checks `caller` against a policy before every read. `None` leaves reads unrestricted.
pub struct AccessChecked<A, P> {
    inner: A,
    policy: Option<P>,
    caller: Pubkey,
}

impl<A: Aggregator, P: AccessPolicy> AccessChecked<A, P> {
    pub fn new(inner: A, policy: Option<P>, caller: Pubkey) -> Self {
        Self {
            inner,
            policy,
            caller,
        }
    }

    fn check(&self, payload: &[u8]) -> Result<()> {
        if let Some(policy) = &self.policy {
            require!(policy.has_access(&self.caller, payload)?, Unauthorized);
        }
        Ok(())
    }
}

impl<A: Aggregator, P: AccessPolicy> Aggregator for AccessChecked<A, P> {
    fn decimals(&self) -> Result<u8> {
        self.check(b"decimals")?;
        self.inner.decimals()
    }

    fn description(&self) -> Result<String> {
        self.check(b"description")?;
        self.inner.description()
    }

    fn version(&self) -> Result<u8> {
        self.check(b"version")?;
        self.inner.version()
    }

    fn latest_round_data(&self) -> Result<RoundData> {
        self.check(b"latest_round_data")?;
        self.inner.latest_round_data()
    }

    fn round_data(&self, round_id: u128) -> Result<RoundData> {
        self.check(b"round_data")?;
        self.inner.round_data(round_id)
    }

    fn phase_id(&self) -> Result<u16> {
        self.check(b"phase_id")?;
        self.inner.phase_id()
    }

    fn feeds(&self) -> Result<FeedPair> {
        self.check(b"feeds")?;
        self.inner.feeds()
    }

    fn phase_feeds(&self, phase_id: u16) -> Result<FeedPair> {
        self.check(b"phase_feeds")?;
        self.inner.phase_feeds(phase_id)
    }

    fn proposed_feeds(&self) -> Result<FeedPair> {
        self.check(b"proposed_feeds")?;
        self.inner.proposed_feeds()
    }

    fn proposed_latest_round_data(&self) -> Result<RoundData> {
        self.check(b"proposed_latest_round_data")?;
        self.inner.proposed_latest_round_data()
    }

    fn proposed_round_data(&self, round_id: u128) -> Result<RoundData> {
        self.check(b"proposed_round_data")?;
        self.inner.proposed_round_data(round_id)
    }

    fn latest_answer(&self) -> Result<i128> {
        self.check(b"latest_answer")?;
        self.inner.latest_answer()
    }

    fn latest_timestamp(&self) -> Result<u64> {
        self.check(b"latest_timestamp")?;
        self.inner.latest_timestamp()
    }

    fn latest_round(&self) -> Result<u128> {
        self.check(b"latest_round")?;
        self.inner.latest_round()
    }

    fn answer(&self, round_id: u128) -> Result<i128> {
        self.check(b"answer")?;
        self.inner.answer(round_id)
    }

    fn timestamp(&self, round_id: u128) -> Result<u64> {
        self.check(b"timestamp")?;
        self.inner.timestamp(round_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashMap};

    #[derive(Default)]
    struct MockFeed {
        decimals: u8,
        rounds: BTreeMap<u32, FeedRound>,
    }

    #[derive(Default)]
    struct MockFeeds {
        feeds: HashMap<Pubkey, MockFeed>,
        calls: RefCell<Vec<(Pubkey, &'static str)>>,
    }

    impl MockFeeds {
        fn add(&mut self, decimals: u8, rounds: &[(u32, i128, u64)]) -> Pubkey {
            let key = Pubkey::new_unique();
            let rounds = rounds
                .iter()
                .map(|&(round_id, answer, timestamp)| {
                    let round = FeedRound {
                        round_id,
                        answer,
                        started_at: timestamp,
                        updated_at: timestamp,
                        answered_in_round: round_id,
                    };
                    (round_id, round)
                })
                .collect();
            self.feeds.insert(key, MockFeed { decimals, rounds });
            key
        }

        fn feed(&self, key: &Pubkey, call: &'static str) -> Result<&MockFeed> {
            self.calls.borrow_mut().push((*key, call));
            self.feeds.get(key).ok_or_else(|| error!(ErrorCode::FeedUnavailable))
        }
    }

    impl FeedSource for &MockFeeds {
        fn decimals(&self, feed: &Pubkey) -> Result<u8> {
            Ok(self.feed(feed, "decimals")?.decimals)
        }

        fn description(&self, _feed: &Pubkey) -> Result<String> {
            Ok("mock".to_string())
        }

        fn version(&self, _feed: &Pubkey) -> Result<u8> {
            Ok(2)
        }

        fn latest_round_data(&self, feed: &Pubkey) -> Result<FeedRound> {
            self.feed(feed, "latest_round_data")?
                .rounds
                .values()
                .next_back()
                .copied()
                .ok_or_else(|| error!(ErrorCode::FeedUnavailable))
        }

        fn round_data(&self, feed: &Pubkey, round_id: u32) -> Result<FeedRound> {
            self.feed(feed, "round_data")?
                .rounds
                .get(&round_id)
                .copied()
                .ok_or_else(|| error!(ErrorCode::FeedUnavailable))
        }
    }

    #[derive(Default)]
    struct MockHistory(HashMap<u16, Phase>);

    impl PhaseHistory for &MockHistory {
        fn phase(&self, phase_id: u16) -> Result<Option<Phase>> {
            Ok(self.0.get(&phase_id).copied())
        }
    }

    struct AllowList(Vec<Pubkey>);

    impl AccessPolicy for AllowList {
        fn has_access(&self, caller: &Pubkey, _payload: &[u8]) -> Result<bool> {
            Ok(self.0.contains(caller))
        }
    }

    fn proxy(decimals: u8, phase: Phase) -> Proxy {
        Proxy {
            version: crate::VERSION,
            owner: Pubkey::new_unique(),
            proposed_owner: Pubkey::default(),
            access_controller: Pubkey::default(),
            decimals,
            description: [0; 32],
            phase,
            proposed: FeedPair::default(),
        }
    }

    fn error_code<T: std::fmt::Debug>(result: Result<T>) -> u32 {
        match result.unwrap_err() {
            anchor_lang::error::Error::AnchorError(err) => err.error_code_number,
            err => panic!("unexpected error {:?}", err),
        }
    }

    /// BTC/USD at 8 decimals and USD/EUR at 6 decimals.
    fn setup() -> (MockFeeds, FeedPair) {
        let mut feeds = MockFeeds::default();
        let x = feeds.add(
            8,
            &[(1, 200_000_000, 100), (2, 210_000_000, 200), (3, 220_000_000, 300)],
        );
        let y = feeds.add(6, &[(10, 300_000, 150), (11, 310_000, 250)]);
        (feeds, FeedPair::new(x, y))
    }

    #[test]
    fn latest_round_data() {
        let (feeds, pair) = setup();
        let history = MockHistory::default();
        let proxy = proxy(8, Phase { id: 1, feeds: pair });
        let feed = CombinedFeed::new(&proxy, &history, &feeds);

        let round = feed.latest_round_data().unwrap();
        assert_eq!(
            round,
            RoundData {
                round_id: round_id::encode(1, 3, 11),
                answer: 220_000_000 * 310_000 / 1_000_000,
                started_at: 250,
                updated_at: 250,
                answered_in_round: round_id::encode(1, 3, 11),
            }
        );
        assert_eq!(feed.latest_answer().unwrap(), 68_200_000);
        assert_eq!(feed.latest_timestamp().unwrap(), 250);
        assert_eq!(feed.latest_round().unwrap(), round_id::encode(1, 3, 11));
    }

    #[test]
    fn historical_rounds_resolve_their_phase() {
        let (mut feeds, old) = setup();
        let x = feeds.add(8, &[(5, 100_000_000, 1_000)]);
        let y = feeds.add(8, &[(6, 50_000_000, 900)]);
        let current = FeedPair::new(x, y);

        let mut history = MockHistory::default();
        history.0.insert(1, Phase { id: 1, feeds: old });
        history.0.insert(2, Phase { id: 2, feeds: current });
        let proxy = proxy(8, Phase { id: 2, feeds: current });
        let feed = CombinedFeed::new(&proxy, &history, &feeds);

        let id = round_id::encode(1, 2, 10);
        let round = feed.round_data(id).unwrap();
        assert_eq!(round.round_id, id);
        assert_eq!(round.answer, 210_000_000 * 300_000 / 1_000_000);
        assert_eq!((round.started_at, round.updated_at), (150, 150));
        assert_eq!(feed.answer(id).unwrap(), round.answer);
        assert_eq!(feed.timestamp(id).unwrap(), 150);

        // only the old phase's feeds were consulted for the historical round
        assert!(feeds
            .calls
            .borrow()
            .iter()
            .all(|(key, _)| key == &old.x || key == &old.y));

        let latest = feed.latest_round_data().unwrap();
        assert_eq!(latest.round_id, round_id::encode(2, 5, 6));
        // 1.0 * 0.5
        assert_eq!(latest.answer, 50_000_000);
        assert_eq!(feed.phase_feeds(1).unwrap(), old);
        assert_eq!(feed.phase_feeds(2).unwrap(), current);
    }

    #[test]
    fn unknown_phase_yields_zeroed_round() {
        let (feeds, pair) = setup();
        let history = MockHistory::default();
        let proxy = proxy(8, Phase { id: 1, feeds: pair });
        let feed = CombinedFeed::new(&proxy, &history, &feeds);

        assert_eq!(
            feed.round_data(round_id::encode(7, 1, 10)).unwrap(),
            RoundData::default()
        );
        assert_eq!(
            feed.round_data(round_id::encode(0, 1, 10)).unwrap(),
            RoundData::default()
        );
        assert_eq!(feed.answer(round_id::encode(7, 1, 10)).unwrap(), 0);
        assert!(feed.phase_feeds(7).unwrap().is_empty());
        assert!(feeds.calls.borrow().is_empty());
    }

    #[test]
    fn feed_errors_propagate() {
        let (feeds, pair) = setup();
        let mut history = MockHistory::default();
        history.0.insert(1, Phase { id: 1, feeds: pair });
        let proxy = proxy(8, Phase { id: 1, feeds: pair });
        let feed = CombinedFeed::new(&proxy, &history, &feeds);

        // round 9 does not exist on feed x
        assert_eq!(
            error_code(feed.round_data(round_id::encode(1, 9, 10))),
            u32::from(ErrorCode::FeedUnavailable)
        );
    }

    #[test]
    fn timestamps() {
        let round = |started_at, updated_at| FeedRound {
            started_at,
            updated_at,
            ..Default::default()
        };
        // older timestamps win
        assert_eq!(
            determine_timestamps(&round(10, 20), &round(15, 18)),
            (10, 18)
        );
        // any unset timestamp unsets the combined round
        assert_eq!(determine_timestamps(&round(0, 20), &round(15, 18)), (0, 0));
        assert_eq!(determine_timestamps(&round(10, 20), &round(0, 18)), (0, 0));
        assert_eq!(determine_timestamps(&round(10, 0), &round(15, 18)), (0, 0));
        assert_eq!(determine_timestamps(&round(10, 20), &round(15, 0)), (0, 0));
    }

    #[test]
    fn unset_side_unsets_combined_timestamps() {
        let mut feeds = MockFeeds::default();
        let x = feeds.add(8, &[(1, 100_000_000, 0)]);
        let y = feeds.add(8, &[(1, 100_000_000, 500)]);
        let pair = FeedPair::new(x, y);
        let history = MockHistory::default();
        let proxy = proxy(8, Phase { id: 1, feeds: pair });
        let feed = CombinedFeed::new(&proxy, &history, &feeds);

        let round = feed.latest_round_data().unwrap();
        assert_eq!((round.started_at, round.updated_at), (0, 0));
        assert_eq!(round.answer, 100_000_000);
    }

    #[test]
    fn proposed_reads() {
        let (mut feeds, pair) = setup();
        let x = feeds.add(8, &[(1, 300_000_000, 700)]);
        let y = feeds.add(8, &[(4, 200_000_000, 800)]);
        let proposed = FeedPair::new(x, y);

        let history = MockHistory::default();
        let mut proxy = proxy(8, Phase { id: 1, feeds: pair });
        {
            let feed = CombinedFeed::new(&proxy, &history, &feeds);
            assert_eq!(
                error_code(feed.proposed_latest_round_data()),
                u32::from(ErrorCode::NoProposal)
            );
            assert_eq!(
                error_code(feed.proposed_feeds()),
                u32::from(ErrorCode::NoProposal)
            );
        }

        proxy.propose_pair(proposed).unwrap();
        let feed = CombinedFeed::new(&proxy, &history, &feeds);
        assert_eq!(feed.proposed_feeds().unwrap(), proposed);

        let round = feed.proposed_latest_round_data().unwrap();
        assert_eq!(round.round_id, round_id::encode(2, 1, 4));
        assert_eq!(round.answer, 600_000_000);
        assert_eq!((round.started_at, round.updated_at), (700, 700));

        assert_eq!(
            feed.proposed_round_data(round_id::encode(2, 1, 4)).unwrap(),
            round
        );
        // addressed under the current phase id instead
        assert_eq!(
            feed.proposed_round_data(round_id::encode(1, 1, 4)).unwrap(),
            RoundData::default()
        );
    }

    #[test]
    fn access_checked_reads() {
        let (feeds, pair) = setup();
        let history = MockHistory::default();
        let proxy = proxy(8, Phase { id: 1, feeds: pair });
        let reader = Pubkey::new_unique();
        let stranger = Pubkey::new_unique();

        let policy = || Some(AllowList(vec![reader]));

        let feed = AccessChecked::new(
            CombinedFeed::new(&proxy, &history, &feeds),
            policy(),
            reader,
        );
        assert_eq!(feed.decimals().unwrap(), 8);
        assert_eq!(feed.latest_answer().unwrap(), 68_200_000);

        let denied = AccessChecked::new(
            CombinedFeed::new(&proxy, &history, &feeds),
            policy(),
            stranger,
        );
        let unauthorized = u32::from(ErrorCode::Unauthorized);
        assert_eq!(error_code(denied.decimals()), unauthorized);
        assert_eq!(error_code(denied.latest_round_data()), unauthorized);
        assert_eq!(error_code(denied.round_data(1 << 64)), unauthorized);
        assert_eq!(error_code(denied.latest_answer()), unauthorized);
        assert_eq!(error_code(denied.phase_id()), unauthorized);

        // without a policy every caller passes
        let open = AccessChecked::new(
            CombinedFeed::new(&proxy, &history, &feeds),
            None::<AllowList>,
            stranger,
        );
        assert_eq!(open.phase_id().unwrap(), 1);
        assert_eq!(open.feeds().unwrap(), pair);
    }

    #[test]
    fn phase_account_lookup() {
        let (_feeds, pair) = setup();
        let proxy_key = Pubkey::new_unique();
        let current = FeedPair::new(Pubkey::new_unique(), Pubkey::new_unique());
        let proxy = proxy(8, Phase { id: 2, feeds: current });

        let (address, _bump) = PhaseRecord::address(&proxy_key, 1);
        let mut data = Vec::new();
        PhaseRecord {
            proxy: proxy_key,
            phase: Phase { id: 1, feeds: pair },
        }
        .try_serialize(&mut data)
        .unwrap();

        let mut lamports = 0u64;
        let owner = crate::ID;
        let info = AccountInfo::new(
            &address,
            false,
            false,
            &mut lamports,
            &mut data,
            &owner,
            false,
            0,
        );
        let history = PhaseAccount::new(&proxy, proxy_key, &info);

        assert_eq!(
            history.phase(1).unwrap(),
            Some(Phase { id: 1, feeds: pair })
        );
        // the current phase needs no record
        assert_eq!(
            history.phase(2).unwrap(),
            Some(Phase { id: 2, feeds: current })
        );
        // a record for another phase id was passed
        assert!(history.phase(3).is_err());
    }

    #[test]
    fn phase_account_never_written() {
        let proxy_key = Pubkey::new_unique();
        let proxy = proxy(8, Phase::default());
        let (address, _bump) = PhaseRecord::address(&proxy_key, 4);

        let mut lamports = 0u64;
        let mut data = Vec::new();
        let owner = anchor_lang::solana_program::system_program::ID;
        let info = AccountInfo::new(
            &address,
            false,
            false,
            &mut lamports,
            &mut data,
            &owner,
            false,
            0,
        );
        let history = PhaseAccount::new(&proxy, proxy_key, &info);
        assert_eq!(history.phase(4).unwrap(), None);
    }
}
