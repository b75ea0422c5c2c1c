use anchor_lang::prelude::*;

use crate::ErrorCode;

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedPair {
    pub x: Pubkey,
    pub y: Pubkey,
}

impl FeedPair {
    pub fn new(x: Pubkey, y: Pubkey) -> Self {
        Self { x, y }
    }

    pub fn is_empty(&self) -> bool {
        self.x == Pubkey::default() && self.y == Pubkey::default()
    }

    /// Both sides set.
    pub fn is_complete(&self) -> bool {
        self.x != Pubkey::default() && self.y != Pubkey::default()
    }
}

/// A versioned pairing of two underlying feeds.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Phase {
    pub id: u16,
    pub feeds: FeedPair,
}

#[account]
pub struct Proxy {
    pub version: u8,
    pub owner: Pubkey,
    pub proposed_owner: Pubkey,
    /// Access controller gating reads, `Pubkey::default()` when reads are unrestricted.
    pub access_controller: Pubkey,
    /// Decimals of the combined answer.
    pub decimals: u8,
    /// Raw UTF-8 byte string
    pub description: [u8; 32],
    pub phase: Phase,
    /// Pending upgrade, empty when nothing is proposed.
    pub proposed: FeedPair,
}

impl Proxy {
    pub const LEN: usize = 1 + 32 + 32 + 32 + 1 + 32 + (2 + 64) + 64;

    pub fn description(&self) -> Result<String> {
        // Look for the first null byte
        let end = self
            .description
            .iter()
            .position(|byte| byte == &0)
            .unwrap_or(self.description.len());

        String::from_utf8(self.description[..end].to_vec())
            .map_err(|_err| error!(ErrorCode::InvalidInput))
    }

    pub fn set_description(&mut self, description: &str) -> Result<()> {
        let description = description.as_bytes();
        require!(description.len() <= self.description.len(), InvalidInput);
        self.description = [0; 32];
        self.description[..description.len()].copy_from_slice(description);
        Ok(())
    }

    /// The id the next confirmed pair will be recorded under.
    ///
    /// NOTE: wraps from `u16::MAX` to 0, the unset phase id.
    pub fn next_phase_id(&self) -> u16 {
        self.phase.id.wrapping_add(1)
    }

    /// Installs `feeds` as the current phase under the next phase id.
    pub fn set_pair(&mut self, feeds: FeedPair) -> Phase {
        self.phase = Phase {
            id: self.next_phase_id(),
            feeds,
        };
        self.phase
    }

    pub fn propose_pair(&mut self, feeds: FeedPair) -> Result<()> {
        require!(feeds.is_complete(), InvalidInput);
        self.proposed = feeds;
        Ok(())
    }

    /// Promotes the pending proposal, which has to match `feeds` exactly.
    pub fn confirm_pair(&mut self, feeds: FeedPair) -> Result<Phase> {
        require!(!self.proposed.is_empty(), NoProposal);
        require!(self.proposed == feeds, InvalidInput);
        self.proposed = FeedPair::default();
        Ok(self.set_pair(feeds))
    }
}

/// Append-only record of a phase, never modified once written.
#[account]
pub struct PhaseRecord {
    pub proxy: Pubkey,
    pub phase: Phase,
}

impl PhaseRecord {
    pub const LEN: usize = 32 + (2 + 64);

    pub fn seed(phase_id: u16) -> [u8; 2] {
        phase_id.to_le_bytes()
    }

    pub fn address(proxy: &Pubkey, phase_id: u16) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[b"phase", proxy.as_ref(), &Self::seed(phase_id)],
            &crate::ID,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn proxy() -> Proxy {
        Proxy {
            version: crate::VERSION,
            owner: Pubkey::new_unique(),
            proposed_owner: Pubkey::default(),
            access_controller: Pubkey::default(),
            decimals: 8,
            description: [0; 32],
            phase: Phase::default(),
            proposed: FeedPair::default(),
        }
    }

    #[test]
    fn description_roundtrip() {
        let mut proxy = proxy();
        proxy.set_description("ETH / USD").unwrap();
        assert_eq!(proxy.description().unwrap(), "ETH / USD");

        // shorter descriptions overwrite the full buffer
        proxy.set_description("BTC").unwrap();
        assert_eq!(proxy.description().unwrap(), "BTC");

        assert!(proxy.set_description(&"x".repeat(33)).is_err());
    }

    #[test]
    fn upgrade_flow() {
        let mut proxy = proxy();
        let initial = FeedPair::new(Pubkey::new_unique(), Pubkey::new_unique());
        assert_eq!(proxy.set_pair(initial).id, 1);

        // nothing proposed yet
        assert!(proxy.confirm_pair(initial).is_err());

        let first = FeedPair::new(Pubkey::new_unique(), Pubkey::new_unique());
        let second = FeedPair::new(Pubkey::new_unique(), Pubkey::new_unique());
        proxy.propose_pair(first).unwrap();
        // a newer proposal replaces the pending one wholesale
        proxy.propose_pair(second).unwrap();
        assert!(proxy.confirm_pair(first).is_err());
        assert_eq!(proxy.proposed, second);

        // each side has to match
        assert!(proxy
            .confirm_pair(FeedPair::new(second.x, first.y))
            .is_err());
        assert_eq!(proxy.phase.id, 1);

        let phase = proxy.confirm_pair(second).unwrap();
        assert_eq!(phase, Phase { id: 2, feeds: second });
        assert_eq!(proxy.phase, phase);
        assert!(proxy.proposed.is_empty());

        // the proposal is consumed
        assert!(proxy.confirm_pair(second).is_err());
    }

    #[test]
    fn fresh_proxy_records_phase_one() {
        let mut proxy = proxy();
        assert_eq!(proxy.next_phase_id(), 1);
        assert_eq!(PhaseRecord::seed(proxy.next_phase_id()), PhaseRecord::seed(1));

        let feeds = FeedPair::new(Pubkey::new_unique(), Pubkey::new_unique());
        let phase = proxy.set_pair(feeds);
        assert_eq!(phase.id, 1);
        let proxy_key = Pubkey::new_unique();
        assert_eq!(
            PhaseRecord::address(&proxy_key, phase.id),
            Pubkey::find_program_address(&[b"phase", proxy_key.as_ref(), &1u16.to_le_bytes()], &crate::ID)
        );
    }

    #[test]
    fn half_set_pairs_are_rejected() {
        let mut proxy = proxy();
        let feed = Pubkey::new_unique();

        assert!(!FeedPair::new(feed, Pubkey::default()).is_complete());
        assert!(!FeedPair::new(Pubkey::default(), feed).is_complete());
        assert!(!FeedPair::default().is_complete());
        assert!(FeedPair::new(feed, Pubkey::new_unique()).is_complete());

        assert!(proxy
            .propose_pair(FeedPair::new(feed, Pubkey::default()))
            .is_err());
        assert!(proxy
            .propose_pair(FeedPair::new(Pubkey::default(), feed))
            .is_err());
        assert!(proxy.proposed.is_empty());
    }

    #[test]
    fn phase_id_wraps() {
        let mut proxy = proxy();
        proxy.phase.id = u16::MAX;
        assert_eq!(proxy.next_phase_id(), 0);
        let feeds = FeedPair::new(Pubkey::new_unique(), Pubkey::new_unique());
        assert_eq!(proxy.set_pair(feeds).id, 0);
    }
}
