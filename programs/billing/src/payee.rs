use anchor_lang::prelude::*;

use crate::state::{Oracle, State};
use crate::ErrorCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayeeChange {
    pub transmitter: Pubkey,
    pub previous: Pubkey,
    pub current: Pubkey,
}

impl Oracle {
    /// One-shot assignment. Re-assigning the same payee is a no-op.
    pub fn set_initial_payee(&mut self, payee: Pubkey) -> Result<Option<PayeeChange>> {
        require!(payee != Pubkey::default(), InvalidInput);
        let previous = self.payee;
        require!(
            previous == Pubkey::default() || previous == payee,
            PayeeAlreadySet
        );
        if previous == payee {
            return Ok(None);
        }
        self.payee = payee;
        Ok(Some(PayeeChange {
            transmitter: self.transmitter,
            previous,
            current: payee,
        }))
    }

    /// First half of a payee transfer, requested by the current payee.
    ///
    /// Returns whether the pending proposal changed.
    pub fn propose_payee(&mut self, authority: &Pubkey, proposed: Pubkey) -> Result<bool> {
        require!(
            self.payee != Pubkey::default() && &self.payee == authority,
            Unauthorized
        );
        // can't transfer to self
        require!(authority != &proposed, InvalidInput);
        let changed = self.proposed_payee != proposed;
        self.proposed_payee = proposed;
        Ok(changed)
    }

    /// Second half of a payee transfer, completed by the proposed payee.
    pub fn accept_payee(&mut self, authority: &Pubkey) -> Result<PayeeChange> {
        require!(
            self.proposed_payee != Pubkey::default() && &self.proposed_payee == authority,
            Unauthorized
        );
        let current = std::mem::take(&mut self.proposed_payee);
        let previous = std::mem::replace(&mut self.payee, current);
        Ok(PayeeChange {
            transmitter: self.transmitter,
            previous,
            current,
        })
    }
}

impl State {
    /// Assigns initial payees, all or nothing.
    pub fn set_payees(
        &mut self,
        transmitters: &[Pubkey],
        payees: &[Pubkey],
    ) -> Result<Vec<PayeeChange>> {
        require!(transmitters.len() == payees.len(), InvalidInput);

        // validate on copies of the affected oracles before assigning anything
        for (transmitter, payee) in transmitters.iter().zip(payees) {
            let mut oracle = *self.oracles.transmitter_mut(transmitter)?;
            oracle.set_initial_payee(*payee)?;
        }

        let mut changes = Vec::new();
        for (transmitter, payee) in transmitters.iter().zip(payees) {
            let oracle = self.oracles.transmitter_mut(transmitter)?;
            if let Some(change) = oracle.set_initial_payee(*payee)? {
                changes.push(change);
            }
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::state;

    fn error_code<T: std::fmt::Debug>(result: Result<T>) -> u32 {
        match result.unwrap_err() {
            anchor_lang::error::Error::AnchorError(err) => err.error_code_number,
            err => panic!("unexpected error {:?}", err),
        }
    }

    fn oracle() -> Oracle {
        Oracle {
            transmitter: Pubkey::new_unique(),
            ..Default::default()
        }
    }

    #[test]
    fn initial_payee_is_one_shot() {
        let mut oracle = oracle();
        let payee = Pubkey::new_unique();

        let change = oracle.set_initial_payee(payee).unwrap().unwrap();
        assert_eq!(change.previous, Pubkey::default());
        assert_eq!(change.current, payee);
        assert_eq!(oracle.payee, payee);

        // same payee again is idempotent
        assert_eq!(oracle.set_initial_payee(payee).unwrap(), None);
        assert_eq!(
            error_code(oracle.set_initial_payee(Pubkey::new_unique())),
            u32::from(ErrorCode::PayeeAlreadySet)
        );
        assert_eq!(oracle.payee, payee);
        assert!(oracle.set_initial_payee(Pubkey::default()).is_err());
    }

    #[test]
    fn two_phase_transfer() {
        let mut oracle = oracle();
        let payee = Pubkey::new_unique();
        let proposed = Pubkey::new_unique();
        let stranger = Pubkey::new_unique();
        oracle.set_initial_payee(payee).unwrap();

        // only the current payee can propose
        assert_eq!(
            error_code(oracle.propose_payee(&stranger, proposed)),
            u32::from(ErrorCode::Unauthorized)
        );
        assert_eq!(
            error_code(oracle.propose_payee(&payee, payee)),
            u32::from(ErrorCode::InvalidInput)
        );
        assert!(oracle.propose_payee(&payee, proposed).unwrap());
        // re-proposing the same address changes nothing
        assert!(!oracle.propose_payee(&payee, proposed).unwrap());

        // only the proposed payee can accept
        assert_eq!(
            error_code(oracle.accept_payee(&stranger)),
            u32::from(ErrorCode::Unauthorized)
        );
        assert_eq!(
            error_code(oracle.accept_payee(&payee)),
            u32::from(ErrorCode::Unauthorized)
        );

        let change = oracle.accept_payee(&proposed).unwrap();
        assert_eq!(
            change,
            PayeeChange {
                transmitter: oracle.transmitter,
                previous: payee,
                current: proposed,
            }
        );
        assert_eq!(oracle.payee, proposed);
        assert_eq!(oracle.proposed_payee, Pubkey::default());

        // the proposal is consumed
        assert_eq!(
            error_code(oracle.accept_payee(&proposed)),
            u32::from(ErrorCode::Unauthorized)
        );
    }

    #[test]
    fn unset_payee_cannot_propose() {
        let mut oracle = oracle();
        assert_eq!(
            error_code(oracle.propose_payee(&Pubkey::default(), Pubkey::new_unique())),
            u32::from(ErrorCode::Unauthorized)
        );
        assert_eq!(
            error_code(oracle.accept_payee(&Pubkey::default())),
            u32::from(ErrorCode::Unauthorized)
        );
    }

    #[test]
    fn set_payees_is_all_or_nothing() {
        let (mut state, roster) = state(3);
        for oracle in state.oracles.iter_mut() {
            oracle.payee = Pubkey::default();
        }
        let first = Pubkey::new_unique();
        let second = Pubkey::new_unique();

        let changes = state
            .set_payees(&roster.transmitters[..2], &[first, second])
            .unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(state.oracles[0].payee, first);
        assert_eq!(state.oracles[1].payee, second);

        // a conflicting payee for an assigned transmitter rejects the whole batch
        let third = Pubkey::new_unique();
        let batch = [roster.transmitters[2], roster.transmitters[1]];
        assert_eq!(
            error_code(state.set_payees(&batch, &[third, Pubkey::new_unique()])),
            u32::from(ErrorCode::PayeeAlreadySet)
        );
        assert_eq!(state.oracles[2].payee, Pubkey::default());

        assert!(state
            .set_payees(&[Pubkey::new_unique()], &[third])
            .is_err());
        assert!(state.set_payees(&roster.transmitters[..1], &[]).is_err());

        // resupplying an assigned payee is accepted
        let changes = state
            .set_payees(&roster.transmitters, &[first, second, third])
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(state.oracles[2].payee, third);
    }
}
