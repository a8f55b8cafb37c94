use sqlx::{PgPool, Postgres, Transaction, postgres::PgPoolOptions};

use crate::{BoxFuture, Result, schema};

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &banter_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self, vector_dim: u32) -> Result<()> {
		let sql = schema::render_schema(vector_dim);
		let lock_id: i64 = 6_211_985;
		// Advisory locks are held per connection. Use a single transaction so the lock is scoped to
		// one connection and automatically released when the transaction ends.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(lock_id).execute(&mut *tx).await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	/// Runs `f` inside one all-or-nothing unit of work. Any error inside the
	/// closure rolls back every write performed within it; previously
	/// committed units are unaffected. Collaborator calls never belong inside
	/// a unit, so a slow provider can never hold a transaction open.
	pub async fn atomic<T, F>(&self, f: F) -> Result<T>
	where
		F: for<'t> FnOnce(&'t mut Transaction<'static, Postgres>) -> BoxFuture<'t, Result<T>>,
	{
		let mut tx = self.pool.begin().await?;

		match f(&mut tx).await {
			Ok(value) => {
				tx.commit().await?;

				Ok(value)
			},
			Err(err) => {
				let _ = tx.rollback().await;

				Err(err)
			},
		}
	}
}
