use std::env;

/// Runtime configuration, read once at startup from the environment
/// (a local `.env` file is loaded by `main` before this runs).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    /// Origin allowed to call the API with credentials.
    pub allowed_origin: String,
    /// Session lifetime in seconds, fixed at creation time.
    pub session_ttl_secs: u64,
    /// Whether the session cookie carries the `Secure` attribute. Off by
    /// default so local HTTP development works.
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            allowed_origin: env::var("ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            session_ttl_secs: env::var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .expect("SESSION_TTL_SECS must be a number"),
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    /// Localhost defaults, used by tests that never touch a real database.
    fn default() -> Self {
        Self {
            database_url: String::new(),
            server_port: 8080,
            server_host: "127.0.0.1".to_string(),
            allowed_origin: "http://localhost:3000".to_string(),
            session_ttl_secs: 86400,
            cookie_secure: false,
        }
    }
}
