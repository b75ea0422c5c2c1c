use anchor_lang::prelude::*;
use anchor_spl::token::{self, TokenAccount};

use crate::ledger::{Payer, Payment};
use crate::ErrorCode;

/// The program's token vault, transferring out of it as the vault authority PDA.
pub struct Vault<'info> {
    token_program: AccountInfo<'info>,
    vault: AccountInfo<'info>,
    authority: AccountInfo<'info>,
    state: Pubkey,
    nonce: u8,
    /// Payee token accounts payments can be sent to.
    destinations: Vec<Account<'info, TokenAccount>>,
}

impl<'info> Vault<'info> {
    pub fn new(
        token_program: AccountInfo<'info>,
        vault: AccountInfo<'info>,
        authority: AccountInfo<'info>,
        state: Pubkey,
        nonce: u8,
    ) -> Self {
        Self {
            token_program,
            vault,
            authority,
            state,
            nonce,
            destinations: Vec::new(),
        }
    }

    /// Accepts `accounts` as payment destinations. Each has to be a token account of `mint`.
    pub fn with_destinations(mut self, accounts: &[AccountInfo<'info>], mint: &Pubkey) -> Result<Self> {
        for account in accounts {
            let account = Account::<'info, TokenAccount>::try_from(account)?;
            require!(&account.mint == mint, InvalidInput);
            self.destinations.push(account);
        }
        Ok(self)
    }

    pub fn transfer(&self, to: AccountInfo<'info>, amount: u64) -> Result<()> {
        let cpi = CpiContext::new(
            self.token_program.clone(),
            token::Transfer {
                from: self.vault.clone(),
                to,
                authority: self.authority.clone(),
            },
        );
        token::transfer(
            cpi.with_signer(&[&[b"vault".as_ref(), self.state.as_ref(), &[self.nonce]]]),
            amount,
        )
    }
}

impl Payer for Vault<'_> {
    fn pay(&mut self, payment: &Payment) -> Result<()> {
        let destination = self
            .destinations
            .iter()
            .find(|account| account.owner == payment.payee)
            .ok_or_else(|| {
                msg!("no token account of payee {} was passed", payment.payee);
                error!(ErrorCode::InvalidInput)
            })?;

        self.transfer(destination.to_account_info(), payment.amount)
            .map_err(|err| {
                msg!("payment to {} failed: {}", payment.payee, err);
                error!(ErrorCode::PaymentFailed)
            })
    }
}
