use dotenv::dotenv;
use std::env;
use anyhow::{anyhow, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub secret_key: String,
    pub database_url: String,

    pub s3_bucket_name: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_access_key_id: String,
    pub s3_secret_access_key: String,

    pub agent_endpoint: String,
    pub agent_id: String,
    pub agent_alias_id: String,
    pub agent_api_key: String,
    pub knowledge_base_id: Option<String>,
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| anyhow!("{} must be set in environment variables", name))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            secret_key: required("SECRET_KEY")?,
            database_url: required("DATABASE_URL")?,

            s3_bucket_name: env::var("S3_BUCKET_NAME")
                .unwrap_or_else(|_| "bmc-documents".to_string()),
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            s3_access_key_id: required("S3_ACCESS_KEY_ID")?,
            s3_secret_access_key: required("S3_SECRET_ACCESS_KEY")?,

            agent_endpoint: required("AGENT_ENDPOINT")?,
            agent_id: required("AGENT_ID")?,
            agent_alias_id: env::var("AGENT_ALIAS_ID")
                .unwrap_or_else(|_| "TSTALIASID".to_string()),
            agent_api_key: required("AGENT_API_KEY")?,
            knowledge_base_id: env::var("KNOWLEDGE_BASE_ID").ok(),
        })
    }
}
