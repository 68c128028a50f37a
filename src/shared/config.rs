#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: String,
    pub server: String,
    pub port: u32,
    pub database: String,
}

#[derive(Clone)]
pub struct SessionConfig {
    /// HS256 signing key for the auth cookie token.
    pub secret: String,
    /// Cookie lifetime in seconds for a normal login.
    pub ttl_seconds: i64,
    /// Cookie lifetime in seconds when the client asks to be remembered.
    pub remember_ttl_seconds: i64,
}

impl AppConfig {
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database.username,
            self.database.password,
            self.database.server,
            self.database.port,
            self.database.database
        )
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let get = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let server = ServerConfig {
            host: get("SERVER_HOST", "0.0.0.0"),
            port: get("SERVER_PORT", "8080").parse()?,
        };
        let database = DatabaseConfig {
            username: get("DB_USER", "kpiuser"),
            password: get("DB_PASSWORD", ""),
            server: get("DB_HOST", "localhost"),
            port: get("DB_PORT", "5432").parse()?,
            database: get("DB_NAME", "kpiserver"),
        };
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")
                .map_err(|_| anyhow::anyhow!("SESSION_SECRET must be set"))?,
            ttl_seconds: get("SESSION_TTL_SECONDS", "86400").parse()?,
            remember_ttl_seconds: get("SESSION_REMEMBER_TTL_SECONDS", "2592000").parse()?,
        };

        Ok(Self {
            server,
            database,
            session,
        })
    }
}
