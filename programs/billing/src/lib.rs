use anchor_lang::prelude::*;
use anchor_spl::token;

declare_id!("FSME4nzfJx8DH481teAwDy7gRaqW3a45UHADca9FX3N5");

mod context;
pub mod event;
pub mod ledger;
mod payee;
pub mod state;
mod vault;

use crate::context::*;
use crate::ledger::{NewOracle, Payment, RelayedGas};
use crate::payee::PayeeChange;
use crate::state::{Billing, State};
use crate::vault::Vault;

use access_controller::AccessController;

#[program]
pub mod billing {
    use super::*;

    pub fn initialize(
        ctx: Context<Initialize>,
        max_gas_price: u32,
        reasonable_gas_price: u32,
        micro_token_per_native: u32,
        token_per_observation: u32,
        token_per_transmission: u32,
    ) -> Result<()> {
        let mut state = ctx.accounts.state.load_init()?;
        state.version = 1;

        state.vault_nonce = *ctx
            .bumps
            .get("vault_authority")
            .ok_or(ErrorCode::InvalidInput)?;

        let config = &mut state.config;
        config.owner = ctx.accounts.owner.key();
        config.token_mint = ctx.accounts.token_mint.key();
        config.token_vault = ctx.accounts.token_vault.key();
        config.billing_access_controller = ctx.accounts.billing_access_controller.key();
        config.transmission_authority = ctx.accounts.transmission_authority.key();
        config.billing = Billing {
            max_gas_price,
            reasonable_gas_price,
            micro_token_per_native,
            token_per_observation,
            token_per_transmission,
        };

        state.ledger.reset();
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.state, &ctx.accounts.authority))]
    pub fn transfer_ownership(
        ctx: Context<TransferOwnership>,
        proposed_owner: Pubkey,
    ) -> Result<()> {
        require!(proposed_owner != Pubkey::default(), InvalidInput);
        let mut state = ctx.accounts.state.load_mut()?;
        state.config.proposed_owner = proposed_owner;
        Ok(())
    }

    pub fn accept_ownership(ctx: Context<AcceptOwnership>) -> Result<()> {
        let mut state = ctx.accounts.state.load_mut()?;
        require!(
            ctx.accounts.authority.key == &state.config.proposed_owner,
            Unauthorized
        );
        state.config.owner = std::mem::take(&mut state.config.proposed_owner);
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.state, &ctx.accounts.authority))]
    pub fn set_config<'info>(
        ctx: Context<'_, '_, '_, 'info, SetConfig<'info>>,
        new_oracles: Vec<NewOracle>,
    ) -> Result<()> {
        let state_id = ctx.accounts.state.key();
        let mut state = ctx.accounts.state.load_mut()?;

        let mut vault = Vault::new(
            ctx.accounts.token_program.to_account_info(),
            ctx.accounts.token_vault.to_account_info(),
            ctx.accounts.vault_authority.clone(),
            state_id,
            state.vault_nonce,
        )
        .with_destinations(ctx.remaining_accounts, &state.config.token_mint)?;

        let payments = state.set_config(&new_oracles, &mut vault)?;
        emit_payments(&payments);

        let (signers, transmitters): (Vec<Pubkey>, Vec<Pubkey>) = state
            .oracles
            .iter()
            .map(|oracle| (oracle.signer, oracle.transmitter))
            .unzip();
        emit!(event::SetConfig {
            config_count: state.config.config_count,
            signers,
            transmitters,
        });
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.state, &ctx.accounts.authority))]
    pub fn set_transmission_authority(ctx: Context<SetTransmissionAuthority>) -> Result<()> {
        let mut state = ctx.accounts.state.load_mut()?;
        state.config.transmission_authority = ctx.accounts.transmission_authority.key();
        Ok(())
    }

    /// Accounts for a transmission the transmission authority has authenticated.
    pub fn record_transmission(
        ctx: Context<RecordTransmission>,
        initial_gas: u64,
        gas_price: u64,
        gas_left: u64,
        call_data_len: u64,
        observers: Vec<u8>,
    ) -> Result<()> {
        let mut state = ctx.accounts.state.load_mut()?;

        let meter = RelayedGas {
            gas_price,
            gas_left,
            call_data_len,
        };
        let transmission = state.record_transmission(
            ctx.accounts.transmitter.key,
            initial_gas,
            &meter,
            &observers,
        )?;

        emit!(event::TransmissionRecorded {
            transmitter: transmission.index as u8, // has to fit in u8 because MAX_ORACLES < 255
            observer_count: observers.len() as u8, // bounded by MAX_ORACLES
            gas_price: transmission.gas_price,
            reimbursement: transmission.reimbursement,
        });
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.state, &ctx.accounts.authority))]
    pub fn set_billing_access_controller(ctx: Context<SetAccessController>) -> Result<()> {
        let mut state = ctx.accounts.state.load_mut()?;
        state.config.billing_access_controller = ctx.accounts.access_controller.key();
        Ok(())
    }

    #[access_control(has_billing_access(&ctx.accounts.state, &ctx.accounts.access_controller, &ctx.accounts.authority))]
    pub fn set_billing<'info>(
        ctx: Context<'_, '_, '_, 'info, SetBilling<'info>>,
        max_gas_price: u32,
        reasonable_gas_price: u32,
        micro_token_per_native: u32,
        token_per_observation: u32,
        token_per_transmission: u32,
    ) -> Result<()> {
        let billing = Billing {
            max_gas_price,
            reasonable_gas_price,
            micro_token_per_native,
            token_per_observation,
            token_per_transmission,
        };

        let state_id = ctx.accounts.state.key();
        let mut state = ctx.accounts.state.load_mut()?;
        let mut vault = billing_vault(ctx.accounts, state_id, &state, ctx.remaining_accounts)?;

        // First... pay out the oracles with the previous billing
        let payments = state.set_billing(billing, &mut vault)?;
        emit_payments(&payments);

        emit!(event::SetBilling {
            max_gas_price,
            reasonable_gas_price,
            micro_token_per_native,
            token_per_observation,
            token_per_transmission,
        });
        Ok(())
    }

    #[access_control(owner(&ctx.accounts.state, &ctx.accounts.authority))]
    pub fn set_token<'info>(ctx: Context<'_, '_, '_, 'info, SetToken<'info>>) -> Result<()> {
        let state_id = ctx.accounts.state.key();
        let mut state = ctx.accounts.state.load_mut()?;

        let previous_mint = state.config.token_mint;
        let mint = ctx.accounts.token_mint.key();
        if mint == previous_mint {
            return Ok(());
        }

        let mut vault = Vault::new(
            ctx.accounts.token_program.to_account_info(),
            ctx.accounts.token_vault.to_account_info(),
            ctx.accounts.vault_authority.clone(),
            state_id,
            state.vault_nonce,
        )
        .with_destinations(ctx.remaining_accounts, &previous_mint)?;

        // Everything earned so far is paid out in the previous token
        let payments = state.pay_oracles(&mut vault)?;
        emit_payments(&payments);

        let remaining = token::accessor::amount(&ctx.accounts.token_vault.to_account_info())?;
        if remaining > 0 {
            vault.transfer(ctx.accounts.recipient.to_account_info(), remaining)?;
        }

        state.config.token_mint = mint;
        state.config.token_vault = ctx.accounts.new_token_vault.key();
        emit!(event::TokenSet {
            previous_mint,
            mint,
        });
        Ok(())
    }

    #[access_control(has_billing_access(&ctx.accounts.state, &ctx.accounts.access_controller, &ctx.accounts.authority))]
    pub fn pay_oracles<'info>(ctx: Context<'_, '_, '_, 'info, SetBilling<'info>>) -> Result<()> {
        let state_id = ctx.accounts.state.key();
        let mut state = ctx.accounts.state.load_mut()?;
        let mut vault = billing_vault(ctx.accounts, state_id, &state, ctx.remaining_accounts)?;

        let payments = state.pay_oracles(&mut vault)?;
        emit_payments(&payments);
        Ok(())
    }

    pub fn withdraw_payment(ctx: Context<WithdrawPayment>) -> Result<()> {
        let state_id = ctx.accounts.state.key();
        let mut state = ctx.accounts.state.load_mut()?;

        let transmitter = ctx.accounts.transmitter.key();
        let oracle = *state.oracles.transmitter_mut(&transmitter)?;
        // Only the payee can withdraw
        require!(
            oracle.payee == ctx.accounts.authority.key(),
            Unauthorized
        );

        let destination = [ctx.accounts.payee.to_account_info()];
        let mut vault = Vault::new(
            ctx.accounts.token_program.to_account_info(),
            ctx.accounts.token_vault.to_account_info(),
            ctx.accounts.vault_authority.clone(),
            state_id,
            state.vault_nonce,
        )
        .with_destinations(&destination, &state.config.token_mint)?;

        if let Some(payment) = state.pay_oracle(&transmitter, &mut vault)? {
            emit_payments(&[payment]);
        }
        Ok(())
    }

    #[access_control(has_billing_access(&ctx.accounts.state, &ctx.accounts.access_controller, &ctx.accounts.authority))]
    pub fn withdraw_funds(ctx: Context<WithdrawFunds>, amount: u64) -> Result<()> {
        let state = ctx.accounts.state.load()?;

        let balance = token::accessor::amount(&ctx.accounts.token_vault.to_account_info())?;
        let amount = state.withdrawable(balance, amount)?;
        if amount == 0 {
            return Ok(());
        }

        let vault = Vault::new(
            ctx.accounts.token_program.to_account_info(),
            ctx.accounts.token_vault.to_account_info(),
            ctx.accounts.vault_authority.clone(),
            ctx.accounts.state.key(),
            state.vault_nonce,
        );
        vault.transfer(ctx.accounts.recipient.to_account_info(), amount)
    }

    #[access_control(owner(&ctx.accounts.state, &ctx.accounts.authority))]
    pub fn set_payees(
        ctx: Context<SetPayees>,
        transmitters: Vec<Pubkey>,
        payees: Vec<Pubkey>,
    ) -> Result<()> {
        let mut state = ctx.accounts.state.load_mut()?;
        for change in state.set_payees(&transmitters, &payees)? {
            emit_payee_change(change);
        }
        Ok(())
    }

    pub fn transfer_payeeship(ctx: Context<TransferPayeeship>, proposed_payee: Pubkey) -> Result<()> {
        let mut state = ctx.accounts.state.load_mut()?;
        let authority = ctx.accounts.authority.key();

        let oracle = state
            .oracles
            .transmitter_mut(ctx.accounts.transmitter.key)?;
        if oracle.propose_payee(&authority, proposed_payee)? {
            emit!(event::PayeeshipTransferRequested {
                transmitter: oracle.transmitter,
                current: authority,
                proposed: proposed_payee,
            });
        }
        Ok(())
    }

    pub fn accept_payeeship(ctx: Context<AcceptPayeeship>) -> Result<()> {
        let mut state = ctx.accounts.state.load_mut()?;
        let authority = ctx.accounts.authority.key();

        let oracle = state
            .oracles
            .transmitter_mut(ctx.accounts.transmitter.key)?;
        let change = oracle.accept_payee(&authority)?;
        emit_payee_change(change);
        Ok(())
    }
}

fn billing_vault<'info>(
    accounts: &SetBilling<'info>,
    state_id: Pubkey,
    state: &State,
    remaining_accounts: &[AccountInfo<'info>],
) -> Result<Vault<'info>> {
    Vault::new(
        accounts.token_program.to_account_info(),
        accounts.token_vault.to_account_info(),
        accounts.vault_authority.clone(),
        state_id,
        state.vault_nonce,
    )
    .with_destinations(remaining_accounts, &state.config.token_mint)
}

fn emit_payments(payments: &[Payment]) {
    for payment in payments {
        emit!(event::OraclePaid {
            transmitter: payment.transmitter,
            payee: payment.payee,
            amount: payment.amount,
        });
    }
}

fn emit_payee_change(change: PayeeChange) {
    emit!(event::PayeeshipTransferred {
        transmitter: change.transmitter,
        previous: change.previous,
        current: change.current,
    });
}

// -- Access control modifiers

// Only owner access
fn owner(state_loader: &AccountLoader<State>, signer: &AccountInfo) -> Result<()> {
    let config = state_loader.load()?.config;
    require!(signer.key.eq(&config.owner), Unauthorized);
    Ok(())
}

fn has_billing_access(
    state: &AccountLoader<State>,
    controller: &AccountLoader<AccessController>,
    authority: &AccountInfo,
) -> Result<()> {
    let config = state.load()?.config;

    require!(
        config.billing_access_controller == controller.key(),
        InvalidInput
    );

    let is_owner = config.owner == authority.key();

    let has_access = is_owner
        || access_controller::has_access(controller, authority.key)
            .map_err(|_| ErrorCode::InvalidInput)?;

    require!(has_access, Unauthorized);
    Ok(())
}

#[error_code]
pub enum ErrorCode {
    #[msg("Unauthorized")]
    Unauthorized = 0,

    #[msg("Invalid input")]
    InvalidInput = 1,

    #[msg("Too many oracles")]
    TooManyOracles = 2,

    #[msg("Overflow")]
    Overflow = 3,

    #[msg("Duplicate signer or transmitter")]
    DuplicateOracle,

    #[msg("Payee already set")]
    PayeeAlreadySet,

    #[msg("Oracle transmitter key not found")]
    UnauthorizedTransmitter,

    #[msg("Payment transfer failed")]
    PaymentFailed,

    #[msg("Oracle is owed a payment but has no payee")]
    PayeeNotSet,

    #[msg("Insufficient funds to cover owed payments")]
    InsufficientFunds,

    #[msg("Gas left exceeds the initial gas")]
    GasAccounting,

    #[msg("Resource exhausted")]
    ResourceExhausted,
}

pub mod query {
    use super::*;

    #[account]
    pub struct OwedPayment {
        pub amount: u64,
    }

    #[account]
    pub struct OracleObservationCount {
        pub count: u16,
    }

    #[account]
    pub struct TotalOwed {
        pub amount: u64,
    }

    #[account]
    pub struct AvailableForPayment {
        pub available_balance: i128,
    }

    // Returns the tokens owed to a transmitter, zero for unknown addresses
    pub fn owed_payment(account: &AccountInfo, transmitter: &Pubkey) -> Result<OwedPayment> {
        let loader = AccountLoader::<State>::try_from(account)?;
        let state = loader.load()?;
        Ok(OwedPayment {
            amount: state.owed_payment(transmitter)?,
        })
    }

    // Returns the number of observations an oracle is due to be rewarded for
    pub fn oracle_observation_count(
        account: &AccountInfo,
        oracle: &Pubkey,
    ) -> Result<OracleObservationCount> {
        let loader = AccountLoader::<State>::try_from(account)?;
        let state = loader.load()?;
        Ok(OracleObservationCount {
            count: state.oracle_observation_count(oracle),
        })
    }

    pub fn total_owed(account: &AccountInfo) -> Result<TotalOwed> {
        let loader = AccountLoader::<State>::try_from(account)?;
        let state = loader.load()?;
        Ok(TotalOwed {
            amount: state.total_owed()?,
        })
    }

    // Returns the token balance of the vault left after owed payments, negative when underfunded
    //
    // This allows oracles to check that a sufficient balance is available
    pub fn available_for_payment(
        account: &AccountInfo,
        token_vault: &AccountInfo,
    ) -> Result<AvailableForPayment> {
        let loader = AccountLoader::<State>::try_from(account)?;
        let state = loader.load()?;

        require!(token_vault.key == &state.config.token_vault, InvalidInput);
        let balance = token::accessor::amount(token_vault)?;

        Ok(AvailableForPayment {
            available_balance: state.available_for_payment(balance)?,
        })
    }
}
