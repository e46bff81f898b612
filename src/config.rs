use std::env;
use secrecy::SecretString;

/// Tunable game rules. Built once at start-up and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct GameRules {
    /// Minimum session correct rate (percent) for a stage session to count as passed.
    pub stage_pass_threshold: f64,
    /// Duration applied to effects whose item does not declare one.
    pub effect_default_minutes: i64,
    /// Experience needed to go from level 1 to level 2.
    pub level_base_exp: i64,
    /// Each level threshold is the previous one times this percentage.
    pub level_growth_percent: i64,
    /// Explanation hints longer than this are cut and suffixed with an ellipsis.
    pub hint_preview_chars: usize,
    pub leaderboard_default_limit: i64,
    pub leaderboard_max_limit: i64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            stage_pass_threshold: 60.0,
            effect_default_minutes: 30,
            level_base_exp: 100,
            level_growth_percent: 120,
            hint_preview_chars: 50,
            leaderboard_default_limit: 20,
            leaderboard_max_limit: 100,
        }
    }
}

impl GameRules {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stage_pass_threshold: parse_env("STAGE_PASS_THRESHOLD", defaults.stage_pass_threshold),
            effect_default_minutes: parse_env("EFFECT_DEFAULT_MINUTES", defaults.effect_default_minutes),
            level_base_exp: parse_env("LEVEL_BASE_EXP", defaults.level_base_exp),
            level_growth_percent: parse_env("LEVEL_GROWTH_PERCENT", defaults.level_growth_percent),
            hint_preview_chars: parse_env("HINT_PREVIEW_CHARS", defaults.hint_preview_chars),
            leaderboard_default_limit: parse_env(
                "LEADERBOARD_DEFAULT_LIMIT",
                defaults.leaderboard_default_limit,
            ),
            leaderboard_max_limit: defaults.leaderboard_max_limit,
        }
    }

    /// Rejects rule sets that would make levelling or passing degenerate.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.stage_pass_threshold) {
            return Err(format!(
                "STAGE_PASS_THRESHOLD must be a percentage, got {}",
                self.stage_pass_threshold
            ));
        }
        if self.level_base_exp <= 0 {
            return Err(format!(
                "LEVEL_BASE_EXP must be positive, got {}",
                self.level_base_exp
            ));
        }
        if self.level_growth_percent < 100 {
            return Err(format!(
                "LEVEL_GROWTH_PERCENT must be at least 100, got {}",
                self.level_growth_percent
            ));
        }
        if self.effect_default_minutes <= 0 {
            return Err(format!(
                "EFFECT_DEFAULT_MINUTES must be positive, got {}",
                self.effect_default_minutes
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_conn_string: String,
    pub mongo_db_name: String,
    pub web_server_host: String,
    pub web_server_port: u16,
    pub jwt_secret: SecretString,
    pub jwt_expiration_hours: i64,
    pub game: GameRules,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            mongo_conn_string: env::var("MONGO_CONN_STRING")
                .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string()),
            mongo_db_name: env::var("MONGO_DB_NAME").unwrap_or_else(|_| "adventure-local".to_string()),
            web_server_host: env::var("WEB_SERVER_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            web_server_port: parse_env("WEB_SERVER_PORT", 8080),
            jwt_secret: SecretString::from(env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev_secret_key_change_in_production".to_string())),
            jwt_expiration_hours: parse_env("JWT_EXPIRATION_HOURS", 24),
            game: GameRules::from_env(),
        }
    }

    /// Validate that production-critical configuration is set
    /// Panics if required secrets are using default values
    pub fn validate_for_production(&self) {
        use secrecy::ExposeSecret;

        let jwt_secret = self.jwt_secret.expose_secret();

        if jwt_secret == "dev_secret_key_change_in_production" {
            panic!(
                "FATAL: JWT_SECRET is using default value! Set JWT_SECRET environment variable to a secure random string."
            );
        }

        if jwt_secret.len() < 32 {
            panic!(
                "FATAL: JWT_SECRET is too short ({}). Must be at least 32 characters for security.",
                jwt_secret.len()
            );
        }

        if let Err(reason) = self.game.validate() {
            panic!("FATAL: {}", reason);
        }
    }

    pub fn test_config() -> Self {
        Self {
            mongo_conn_string: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "adventure-test".to_string(),
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 8080,
            jwt_secret: SecretString::from("test_jwt_secret_key".to_string()),
            jwt_expiration_hours: 1,
            game: GameRules::default(),
        }
    }
}
