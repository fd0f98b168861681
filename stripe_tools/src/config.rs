use fse_common::Secret;
use log::*;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub api_base: String,
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let secret_key = Secret::new(std::env::var("FSE_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("FSE_STRIPE_SECRET_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let api_base = std::env::var("FSE_STRIPE_API_BASE").unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string());
        Self { secret_key, api_base }
    }
}
