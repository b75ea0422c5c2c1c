//! Per-oracle reward accounting.
//!
//! Counters are stored biased by one, so an empty slot holds 1 and is never the zeroed
//! storage value. Every read subtracts the bias and every reset writes 1.

use anchor_lang::prelude::*;
use std::collections::BTreeSet;

use crate::state::{Billing, Membership, Oracle, Role, State, MAX_ORACLES};
use crate::ErrorCode;

/// Fixed gas overhead of the accounting itself, charged on every transmission.
pub const ACCOUNTING_GAS_COST: u64 = 6_035;
/// Gas charged per byte of transmission call data.
pub const CALL_DATA_GAS_COST: u64 = 16;

const MICRO: u128 = 1_000_000;

#[zero_copy]
pub struct Ledger {
    observations: [u16; 31],
    _padding0: u16,
    reimbursements: [u64; 31],
}

impl Ledger {
    /// Writes the empty state into every slot.
    pub fn reset(&mut self) {
        self.observations = [1; MAX_ORACLES];
        self.reimbursements = [1; MAX_ORACLES];
    }

    pub fn observation_count(&self, index: usize) -> u16 {
        let observations = self.observations;
        observations[index].saturating_sub(1)
    }

    pub fn reimbursement(&self, index: usize) -> u64 {
        let reimbursements = self.reimbursements;
        reimbursements[index].saturating_sub(1)
    }

    /// Counts an observation, silently capping at `u16::MAX - 1`.
    pub fn record_observation(&mut self, index: usize) {
        let mut observations = self.observations;
        observations[index] = observations[index].saturating_add(1);
        self.observations = observations;
    }

    pub fn add_reimbursement(&mut self, index: usize, amount: u64) -> Result<()> {
        let mut reimbursements = self.reimbursements;
        reimbursements[index] = reimbursements[index]
            .checked_add(amount)
            .ok_or(ErrorCode::Overflow)?;
        self.reimbursements = reimbursements;
        Ok(())
    }

    pub fn clear(&mut self, index: usize) {
        let mut observations = self.observations;
        let mut reimbursements = self.reimbursements;
        observations[index] = 1;
        reimbursements[index] = 1;
        self.observations = observations;
        self.reimbursements = reimbursements;
    }

    /// Rewards owed for the slot at `index`, in token base units.
    pub fn owed(&self, index: usize, billing: &Billing) -> Result<u64> {
        let amount = u64::from(self.observation_count(index))
            .checked_mul(u64::from(billing.token_per_observation))
            .ok_or(ErrorCode::Overflow)?
            .checked_add(self.reimbursement(index))
            .ok_or(ErrorCode::Overflow)?;
        Ok(amount)
    }

    /// Stored representation of a slot, bias included.
    #[cfg(test)]
    pub fn raw(&self, index: usize) -> (u16, u64) {
        let observations = self.observations;
        let reimbursements = self.reimbursements;
        (observations[index], reimbursements[index])
    }
}

/// Gas figures of the transmission being accounted for.
///
/// The runtime exposes no gas counter to programs, so the authenticated transmission
/// authority relays them alongside the report.
pub trait GasMeter {
    /// Price paid for the transaction, in native units per gas.
    fn gas_price(&self) -> u64;
    /// Gas remaining at the time of accounting.
    fn gas_left(&self) -> u64;
    fn call_data_len(&self) -> u64;
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayedGas {
    pub gas_price: u64,
    pub gas_left: u64,
    pub call_data_len: u64,
}

impl GasMeter for RelayedGas {
    fn gas_price(&self) -> u64 {
        self.gas_price
    }

    fn gas_left(&self) -> u64 {
        self.gas_left
    }

    fn call_data_len(&self) -> u64 {
        self.call_data_len
    }
}

/// Gas price a transmission is reimbursed at.
///
/// Transmitters paying less than the reasonable price keep half of the difference, but the
/// result never exceeds the maximum price.
pub fn implied_gas_price(billing: &Billing, tx_gas_price: u64) -> u64 {
    let reasonable = u64::from(billing.reasonable_gas_price);
    let max = u64::from(billing.max_gas_price);

    let price = if tx_gas_price < reasonable {
        tx_gas_price + (reasonable - tx_gas_price) / 2
    } else {
        tx_gas_price
    };
    price.min(max)
}

/// Native cost of a transmission: execution, call data and accounting overhead at `gas_price`.
pub fn transmitter_gas_cost(initial_gas: u64, meter: &impl GasMeter, gas_price: u64) -> Result<u128> {
    let gas_left = meter.gas_left();
    // more gas left than there was to begin with
    require!(gas_left <= initial_gas, GasAccounting);

    let call_data_gas = u128::from(meter.call_data_len()) * u128::from(CALL_DATA_GAS_COST);
    let gas_used = u128::from(initial_gas - gas_left) + call_data_gas + u128::from(ACCOUNTING_GAS_COST);

    gas_used
        .checked_mul(u128::from(gas_price))
        .ok_or_else(|| error!(ErrorCode::Overflow))
}

/// Token base units reimbursed for a native cost, per transmission reward included.
pub fn reimbursement(billing: &Billing, native_cost: u128) -> Result<u64> {
    let tokens = native_cost
        .checked_mul(u128::from(billing.micro_token_per_native))
        .ok_or(ErrorCode::Overflow)?
        / MICRO;
    let tokens = u64::try_from(tokens).map_err(|_| ErrorCode::Overflow)?;
    let amount = tokens
        .checked_add(u64::from(billing.token_per_transmission))
        .ok_or(ErrorCode::Overflow)?;
    Ok(amount)
}

/// A settled reward, transferred from the vault to the oracle's payee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payment {
    pub index: usize,
    pub transmitter: Pubkey,
    pub payee: Pubkey,
    pub amount: u64,
}

/// Moves settled rewards to their payees. A failed transfer fails the whole payout.
pub trait Payer {
    fn pay(&mut self, payment: &Payment) -> Result<()>;
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewOracle {
    pub signer: Pubkey,
    pub transmitter: Pubkey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transmission {
    pub index: usize,
    pub gas_price: u64,
    pub reimbursement: u64,
}

impl State {
    /// Tokens owed to `transmitter`, zero for addresses that are not a transmitter.
    pub fn owed_payment(&self, transmitter: &Pubkey) -> Result<u64> {
        match self.oracles.resolve(transmitter) {
            Some(Membership {
                index,
                role: Role::Transmitter,
            }) => self.ledger.owed(index, &self.config.billing),
            _ => Ok(0),
        }
    }

    /// Observations credited to the oracle holding `address` as either key.
    pub fn oracle_observation_count(&self, address: &Pubkey) -> u16 {
        self.oracles
            .resolve(address)
            .map(|membership| self.ledger.observation_count(membership.index))
            .unwrap_or(0)
    }

    /// Everything owed to the roster: observations of every slot, reimbursements of every transmitter.
    pub fn total_owed(&self) -> Result<u64> {
        let observations = (0..MAX_ORACLES)
            .map(|index| u64::from(self.ledger.observation_count(index)))
            .sum::<u64>();
        let reimbursements = (0..self.oracles.len())
            .try_fold(0u64, |total, index| {
                total.checked_add(self.ledger.reimbursement(index))
            })
            .ok_or(ErrorCode::Overflow)?;

        let amount = observations
            .checked_mul(u64::from(self.config.billing.token_per_observation))
            .ok_or(ErrorCode::Overflow)?
            .checked_add(reimbursements)
            .ok_or(ErrorCode::Overflow)?;
        Ok(amount)
    }

    /// Vault balance left after every owed reward, negative when underfunded.
    pub fn available_for_payment(&self, balance: u64) -> Result<i128> {
        Ok(i128::from(balance) - i128::from(self.total_owed()?))
    }

    /// Amount of `requested` that can leave the vault without touching owed rewards.
    pub fn withdrawable(&self, balance: u64, requested: u64) -> Result<u64> {
        let due = self.total_owed()?;
        require!(balance >= due, InsufficientFunds);
        Ok(requested.min(balance - due))
    }

    /// Credits the observers and reimburses `transmitter` for the gas it spent.
    ///
    /// Observers are roster indices, an index listed twice is credited twice.
    pub fn record_transmission(
        &mut self,
        transmitter: &Pubkey,
        initial_gas: u64,
        meter: &impl GasMeter,
        observers: &[u8],
    ) -> Result<Transmission> {
        let index = match self.oracles.resolve(transmitter) {
            Some(Membership {
                index,
                role: Role::Transmitter,
            }) => index,
            _ => return err!(ErrorCode::UnauthorizedTransmitter),
        };
        require!(observers.len() <= MAX_ORACLES, InvalidInput);
        // only roster slots can ever be paid out
        let roster = self.oracles.len();
        require!(
            observers
                .iter()
                .all(|observer| usize::from(*observer) < roster),
            InvalidInput
        );

        let billing = self.config.billing;
        let gas_price = implied_gas_price(&billing, meter.gas_price());
        let cost = transmitter_gas_cost(initial_gas, meter, gas_price)?;
        let reimbursement = reimbursement(&billing, cost)?;

        // validated, nothing below can leave the ledger half updated
        let mut ledger = self.ledger;
        for observer in observers {
            ledger.record_observation(usize::from(*observer));
        }
        ledger.add_reimbursement(index, reimbursement)?;
        self.ledger = ledger;

        Ok(Transmission {
            index,
            gas_price,
            reimbursement,
        })
    }

    /// Pays out the rewards owed to `transmitter`, if any.
    pub fn pay_oracle(
        &mut self,
        transmitter: &Pubkey,
        payer: &mut impl Payer,
    ) -> Result<Option<Payment>> {
        let index = match self.oracles.resolve(transmitter) {
            Some(Membership {
                index,
                role: Role::Transmitter,
            }) => index,
            _ => return err!(ErrorCode::InvalidInput),
        };
        let oracle = self.oracles[index];

        let amount = self.ledger.owed(index, &self.config.billing)?;
        if amount == 0 {
            return Ok(None);
        }
        require!(oracle.payee != Pubkey::default(), PayeeNotSet);

        let payment = Payment {
            index,
            transmitter: oracle.transmitter,
            payee: oracle.payee,
            amount,
        };
        payer.pay(&payment)?;
        self.ledger.clear(index);
        Ok(Some(payment))
    }

    /// Pays out every transmitter owed a non-zero amount, all or nothing.
    pub fn pay_oracles(&mut self, payer: &mut impl Payer) -> Result<Vec<Payment>> {
        let billing = self.config.billing;
        let mut ledger = self.ledger;
        let mut payments = Vec::new();

        for (index, oracle) in self.oracles.iter().enumerate() {
            let amount = ledger.owed(index, &billing)?;
            if amount == 0 {
                continue;
            }
            if oracle.payee == Pubkey::default() {
                msg!("transmitter {} is owed {} but has no payee", oracle.transmitter, amount);
                return err!(ErrorCode::PayeeNotSet);
            }
            ledger.clear(index);
            payments.push(Payment {
                index,
                transmitter: oracle.transmitter,
                payee: oracle.payee,
                amount,
            });
        }

        for payment in &payments {
            payer.pay(payment)?;
        }
        self.ledger = ledger;
        Ok(payments)
    }

    /// Settles everything earned under the current parameters, then replaces them.
    pub fn set_billing(&mut self, billing: Billing, payer: &mut impl Payer) -> Result<Vec<Payment>> {
        let payments = self.pay_oracles(payer)?;
        self.config.billing = billing;
        Ok(payments)
    }

    /// Replaces the roster after settling with the current one.
    ///
    /// Transmitters present in both rosters keep their payee and any pending payee transfer.
    pub fn set_config(
        &mut self,
        oracles: &[NewOracle],
        payer: &mut impl Payer,
    ) -> Result<Vec<Payment>> {
        require!(oracles.len() <= MAX_ORACLES, TooManyOracles);

        let mut keys = BTreeSet::new();
        for oracle in oracles {
            require!(
                oracle.signer != Pubkey::default() && oracle.transmitter != Pubkey::default(),
                InvalidInput
            );
            require!(keys.insert(oracle.signer), DuplicateOracle);
            require!(keys.insert(oracle.transmitter), DuplicateOracle);
        }

        let payments = self.pay_oracles(payer)?;

        // heap copy, the roster is too large for the stack frame
        let previous: Vec<Oracle> = self.oracles.to_vec();
        self.oracles.clear();
        for oracle in oracles {
            let carried = previous
                .iter()
                .find(|previous| previous.transmitter == oracle.transmitter)
                .copied()
                .unwrap_or_default();
            self.oracles.push(Oracle {
                signer: oracle.signer,
                transmitter: oracle.transmitter,
                payee: carried.payee,
                proposed_payee: carried.proposed_payee,
            });
        }

        self.ledger.reset();
        self.config.config_count = self
            .config
            .config_count
            .checked_add(1)
            .ok_or(ErrorCode::Overflow)?;
        Ok(payments)
    }
}
