use crate::error::AppError;
use crate::money::Amount;
use async_trait::async_trait;
use solana_client::rpc_client::RpcClient;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair, Signer},
    transaction::Transaction,
};
use spl_associated_token_account::get_associated_token_address;
use spl_token::instruction::transfer_checked;
use spl_token::ID as TOKEN_PROGRAM_ID;
use std::str::FromStr;
use tracing::info;

const TOKEN_DECIMALS: u8 = 6;

/// External payment network: reports its operating balance and moves real
/// funds to a user wallet. Every error is surfaced as `AppError::Rail` and
/// handled per call site (withdrawals abort, referral payouts fall back).
#[async_trait]
pub trait PaymentRail: Send + Sync {
    async fn operating_balance(&self) -> Result<Amount, AppError>;
    async fn transfer(&self, wallet: &str, amount: Amount) -> Result<String, AppError>;
}

/// SPL token transfers out of the operating wallet. The RPC client is
/// blocking, so every round-trip runs on the blocking pool.
pub struct SolanaRail {
    rpc_url: String,
    keypair_path: String,
    mint: String,
}

impl SolanaRail {
    pub fn new(rpc_url: String, keypair_path: String, mint: String) -> Self {
        Self {
            rpc_url,
            keypair_path,
            mint,
        }
    }

    fn load_payer(path: &str) -> Result<Keypair, AppError> {
        read_keypair_file(path)
            .map_err(|_| AppError::Rail("failed to load operating wallet keypair".into()))
    }

    fn parse_pubkey(s: &str, what: &str) -> Result<Pubkey, AppError> {
        Pubkey::from_str(s).map_err(|_| AppError::Rail(format!("invalid {} address", what)))
    }
}

#[async_trait]
impl PaymentRail for SolanaRail {
    async fn operating_balance(&self) -> Result<Amount, AppError> {
        let (rpc_url, keypair_path, mint) = (
            self.rpc_url.clone(),
            self.keypair_path.clone(),
            self.mint.clone(),
        );
        tokio::task::spawn_blocking(move || {
            let rpc = RpcClient::new(rpc_url);
            let payer = Self::load_payer(&keypair_path)?;
            let mint = Self::parse_pubkey(&mint, "mint")?;
            let operating_account = get_associated_token_address(&payer.pubkey(), &mint);

            let balance = rpc
                .get_token_account_balance(&operating_account)
                .map_err(|e| AppError::Rail(format!("balance query failed: {}", e)))?;
            let minor: i64 = balance
                .amount
                .parse()
                .map_err(|_| AppError::Rail("unparseable rail balance".into()))?;
            Ok(Amount::from_minor(minor))
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }

    async fn transfer(&self, wallet: &str, amount: Amount) -> Result<String, AppError> {
        if !amount.is_positive() {
            return Err(AppError::Rail("transfer amount must be positive".into()));
        }
        let (rpc_url, keypair_path, mint, wallet) = (
            self.rpc_url.clone(),
            self.keypair_path.clone(),
            self.mint.clone(),
            wallet.to_string(),
        );
        tokio::task::spawn_blocking(move || {
            let rpc = RpcClient::new(rpc_url);
            let payer = Self::load_payer(&keypair_path)?;
            let payer_pubkey = payer.pubkey();
            let mint = Self::parse_pubkey(&mint, "mint")?;
            let to_pubkey = Self::parse_pubkey(&wallet, "recipient wallet")?;

            let payer_token_account = get_associated_token_address(&payer_pubkey, &mint);
            let recipient_token_account = get_associated_token_address(&to_pubkey, &mint);

            // Create the recipient's token account if it doesn't exist yet.
            if rpc.get_account(&recipient_token_account).is_err() {
                let create_ata_ix =
                    spl_associated_token_account::instruction::create_associated_token_account(
                        &payer_pubkey,
                        &to_pubkey,
                        &mint,
                        &TOKEN_PROGRAM_ID,
                    );
                let blockhash = rpc.get_latest_blockhash().map_err(|e| {
                    AppError::Rail(format!("failed to fetch blockhash: {}", e))
                })?;
                let create_ata_tx = Transaction::new_signed_with_payer(
                    &[create_ata_ix],
                    Some(&payer_pubkey),
                    &[&payer],
                    blockhash,
                );
                rpc.send_and_confirm_transaction(&create_ata_tx)
                    .map_err(|e| AppError::Rail(format!("failed to create token account: {}", e)))?;
                info!(wallet = %wallet, "created recipient token account");
            }

            let transfer_ix = transfer_checked(
                &spl_token::ID,
                &payer_token_account,
                &mint,
                &recipient_token_account,
                &payer_pubkey,
                &[],
                amount.to_minor() as u64,
                TOKEN_DECIMALS,
            )
            .map_err(|e| AppError::Rail(format!("failed to build transfer: {}", e)))?;

            let blockhash = rpc
                .get_latest_blockhash()
                .map_err(|e| AppError::Rail(format!("failed to fetch blockhash: {}", e)))?;
            let tx = Transaction::new_signed_with_payer(
                &[transfer_ix],
                Some(&payer_pubkey),
                &[&payer],
                blockhash,
            );
            let sig = rpc
                .send_and_confirm_transaction(&tx)
                .map_err(|e| AppError::Rail(format!("transfer failed: {}", e)))?;

            info!(wallet = %wallet, amount = %amount, tx = %sig, "rail transfer confirmed");
            Ok(sig.to_string())
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }
}

#[cfg(test)]
pub struct MockRail {
    pub balance: Amount,
    pub fail_transfer: bool,
    pub transfers: tokio::sync::Mutex<Vec<(String, Amount)>>,
}

#[cfg(test)]
impl MockRail {
    pub fn new(balance: Amount) -> Self {
        Self {
            balance,
            fail_transfer: false,
            transfers: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing(balance: Amount) -> Self {
        Self {
            fail_transfer: true,
            ..Self::new(balance)
        }
    }
}

#[cfg(test)]
#[async_trait]
impl PaymentRail for MockRail {
    async fn operating_balance(&self) -> Result<Amount, AppError> {
        Ok(self.balance)
    }

    async fn transfer(&self, wallet: &str, amount: Amount) -> Result<String, AppError> {
        if self.fail_transfer {
            return Err(AppError::Rail("rpc timeout".into()));
        }
        self.transfers
            .lock()
            .await
            .push((wallet.to_string(), amount));
        Ok(format!("mock-tx-{}", amount.to_minor()))
    }
}
