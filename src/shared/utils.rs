use diesel::{
    r2d2::{ConnectionManager, Pool},
    PgConnection,
};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Build the connection pool. `DATABASE_URL` wins over the assembled
/// config URL so deployments can point at a managed instance directly.
pub fn create_conn(config_url: &str) -> Result<DbPool, diesel::r2d2::PoolError> {
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| config_url.to_string());
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().build(manager)
}
