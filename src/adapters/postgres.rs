use crate::config::connections::Connections;
use crate::core::schema;
use crate::domain::ports::UserStore;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::Connection;

/// Postgres 目的表，每次呼叫都重新解析具名連線並建立連線
pub struct PgUserStore {
    connections: Connections,
    connection_name: String,
    table: String,
}

impl PgUserStore {
    pub fn new(connections: Connections, connection_name: String, table: String) -> Self {
        Self {
            connections,
            connection_name,
            table,
        }
    }

    async fn connect(&self) -> Result<PgConnection> {
        let uri = self.connections.resolve(&self.connection_name)?;
        tracing::debug!("🔌 Connecting to '{}'", self.connection_name);
        let conn = PgConnection::connect(&uri).await?;
        Ok(conn)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.connect().await?;
        let sql = schema::create_table_sql(&self.table);

        sqlx::query(&sql).execute(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }

    async fn copy_csv(&self, data: &[u8]) -> Result<u64> {
        let mut conn = self.connect().await?;
        let sql = schema::copy_sql(&self.table);

        let mut copy = conn.copy_in_raw(&sql).await?;
        let sent = copy.send(data).await.map(|_| ());
        if let Err(e) = sent {
            let message = e.to_string();
            if let Err(abort_err) = copy.abort(message.clone()).await {
                tracing::debug!("COPY abort reported: {}", abort_err);
            }
            return Err(EtlError::LoadError {
                table: self.table.clone(),
                message,
            });
        }

        let rows = copy.finish().await.map_err(|e| EtlError::LoadError {
            table: self.table.clone(),
            message: e.to_string(),
        })?;

        conn.close().await?;
        Ok(rows)
    }
}
