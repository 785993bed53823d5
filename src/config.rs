use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
    // currency units per job - RWF 10,000 backs one job by default
    pub job_creation_rate: i64,
    pub min_backing_amount: i64,
    pub campaign_duration_days: i64,
    pub gateway_timeout_seconds: u64,
    pub momo_base_url: Option<String>,
    pub momo_subscription_key: Option<String>,
    pub frontend_url: String,
    pub mail_relay_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub email_from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // treating empty DATABASE_URL as unset because docker-compose was setting it to ""
        let mut database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());

        // fallback to loading .env explicitly in case working directory isn't set correctly
        if database_url.is_none() {
            let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
            let _ = dotenvy::from_path_override(&env_path);
            database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
        }

        let config = Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            database_url: database_url.ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?,
            jwt_secret: env::var("JWT_SECRET")?,
            access_token_expire_minutes: env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .unwrap_or_else(|_| "1440".to_string())
                .parse()?,
            refresh_token_expire_days: env::var("REFRESH_TOKEN_EXPIRE_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            job_creation_rate: env::var("JOB_CREATION_RATE")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
            min_backing_amount: env::var("MIN_BACKING_AMOUNT")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
            campaign_duration_days: env::var("CAMPAIGN_DURATION_DAYS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()?,
            gateway_timeout_seconds: env::var("GATEWAY_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            momo_base_url: env::var("MOMO_BASE_URL").ok().filter(|v| !v.trim().is_empty()),
            momo_subscription_key: env::var("MOMO_SUBSCRIPTION_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            mail_relay_url: env::var("MAIL_RELAY_URL").ok().filter(|v| !v.trim().is_empty()),
            mail_api_key: env::var("MAIL_API_KEY").ok().filter(|v| !v.trim().is_empty()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "no-reply@localhost".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    // a zero rate would turn every job computation into a divide-by-zero
    // at request time; reject it before the server starts
    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.job_creation_rate > 0, "JOB_CREATION_RATE must be positive");
        anyhow::ensure!(self.min_backing_amount > 0, "MIN_BACKING_AMOUNT must be positive");
        anyhow::ensure!(
            self.campaign_duration_days > 0,
            "CAMPAIGN_DURATION_DAYS must be positive"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/funding".to_string(),
            jwt_secret: "secret".to_string(),
            access_token_expire_minutes: 1440,
            refresh_token_expire_days: 30,
            job_creation_rate: 10_000,
            min_backing_amount: 10_000,
            campaign_duration_days: 90,
            gateway_timeout_seconds: 10,
            momo_base_url: None,
            momo_subscription_key: None,
            frontend_url: "http://localhost:3000".to_string(),
            mail_relay_url: None,
            mail_api_key: None,
            email_from: "no-reply@localhost".to_string(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn zero_job_creation_rate_rejected() {
        let mut config = valid_config();
        config.job_creation_rate = 0;
        assert!(config.validate().is_err());

        config.job_creation_rate = -10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_min_backing_rejected() {
        let mut config = valid_config();
        config.min_backing_amount = 0;
        assert!(config.validate().is_err());
    }
}
