use crate::models::user::UserId;
use crate::money::Amount;
use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

pub struct Config {
    pub bind_addr: String,
    pub channel: String,
    pub admin_ids: Vec<UserId>,
    pub bonus: Amount,
    pub referral_reward: Amount,
    pub min_withdrawal: Amount,
    pub solana_rpc_url: String,
    pub operating_wallet_path: String,
    pub token_mint: String,
}

impl Config {
    fn from_env() -> Self {
        dotenv().ok();
        Self {
            bind_addr: get_env_or("BIND_ADDR", "0.0.0.0:8080"),
            channel: get_env("CHANNEL"),
            admin_ids: get_env_or("ADMIN_IDS", "")
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect(),
            bonus: get_amount("BONUS_AMOUNT", "0.01"),
            referral_reward: get_amount("REFERRAL_REWARD", "0.05"),
            min_withdrawal: get_amount("MIN_WITHDRAWAL", "0.2"),
            solana_rpc_url: get_env("SOLANA_RPC_URL"),
            operating_wallet_path: get_env("OPERATING_WALLET_PATH"),
            token_mint: get_env("TOKEN_MINT"),
        }
    }
}

fn get_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("Missing env var: {}", key))
}

fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_amount(key: &str, default: &str) -> Amount {
    let raw = get_env_or(key, default);
    Amount::parse(&raw).unwrap_or_else(|e| panic!("Bad {}: {}", key, e))
}
