use reqwest::Client;

use crate::config::HttpConfig;
use crate::error::AppError;

pub fn build_client(config: &HttpConfig) -> Result<Client, AppError> {
    let client = Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.as_str())
        .use_rustls_tls()
        .build()?;
    Ok(client)
}
