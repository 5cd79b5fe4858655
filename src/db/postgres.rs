use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use super::{CrmStore, StoreError, StoreResult};
use crate::config::Config;
use crate::models::{
    Client, ClientInteraction, NewClient, NewInteraction, NewUser, Stage, StageCounts,
    StatisticsCounts, User,
};

const CLIENT_COLUMNS: &str = r#"
    SELECT
        c.id,
        c.first_name,
        c.last_name,
        c.email,
        c.phone,
        c.company,
        c.address,
        c.notes,
        c.stage,
        c.created_by,
        creator.username AS created_by_name,
        c.assigned_to,
        assignee.username AS assigned_to_name,
        c.created_at,
        c.updated_at
    FROM clients c
    LEFT JOIN users creator ON creator.id = c.created_by
    LEFT JOIN users assignee ON assignee.id = c.assigned_to
"#;

const INTERACTION_COLUMNS: &str = r#"
    SELECT
        i.id,
        i.client_id,
        i.interaction_type,
        i.subject,
        i.description,
        i.created_by,
        creator.username AS created_by_name,
        i.created_at
    FROM client_interactions i
    LEFT JOIN users creator ON creator.id = i.created_by
"#;

const USER_COLUMNS: &str = "SELECT id, username, email, first_name, last_name FROM users";

/// Per-table aggregates read back for the statistics rollup
#[derive(sqlx::FromRow)]
struct ClientTally {
    lead: i64,
    in_progress: i64,
    active: i64,
    recent: i64,
}

#[derive(sqlx::FromRow)]
struct InteractionTally {
    total: i64,
    recent: i64,
}

/// PostgreSQL-backed store
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new Database instance with a connection pool
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(config.database_url()?)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply any pending migrations from `migrations/`
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!().run(self.get_pool()).await?;
        Ok(())
    }

    async fn fetch_client(&self, id: i32) -> StoreResult<Client> {
        let sql = format!("{CLIENT_COLUMNS} WHERE c.id = $1");
        sqlx::query_as::<_, Client>(&sql)
            .bind(id)
            .fetch_optional(self.get_pool())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn fetch_interaction(&self, id: i32) -> StoreResult<ClientInteraction> {
        let sql = format!("{INTERACTION_COLUMNS} WHERE i.id = $1");
        sqlx::query_as::<_, ClientInteraction>(&sql)
            .bind(id)
            .fetch_optional(self.get_pool())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn insert_interaction(
        tx: &mut Transaction<'_, Postgres>,
        interaction: &NewInteraction,
    ) -> StoreResult<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO client_interactions (client_id, interaction_type, subject, description, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(interaction.client_id)
        .bind(interaction.interaction_type.as_str())
        .bind(&interaction.subject)
        .bind(&interaction.description)
        .bind(interaction.created_by)
        .bind(interaction.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_constraint)?;

        Ok(id)
    }
}

/// Translate constraint violations into domain errors
fn map_constraint(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.constraint() {
            Some("clients_email_key") => return StoreError::EmailTaken,
            Some("users_username_key") => return StoreError::UsernameTaken,
            // Postgres' default name for the client_id foreign key
            Some("client_interactions_client_id_fkey") => return StoreError::NotFound,
            _ => {}
        }
    }
    StoreError::Sqlx(err)
}

#[async_trait]
impl CrmStore for Database {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, first_name, last_name, token_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, first_name, last_name
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.token_hash)
        .fetch_one(self.get_pool())
        .await
        .map_err(map_constraint)?;

        Ok(created)
    }

    async fn get_user(&self, id: i32) -> StoreResult<User> {
        let sql = format!("{USER_COLUMNS} WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.get_pool())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn find_user_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        let sql = format!("{USER_COLUMNS} WHERE token_hash = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token_hash)
            .fetch_optional(self.get_pool())
            .await?;

        Ok(user)
    }

    async fn delete_user(&self, username: &str) -> StoreResult<()> {
        // created_by / assigned_to are cleared by ON DELETE SET NULL
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(self.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_clients(&self, stage: Option<Stage>) -> StoreResult<Vec<Client>> {
        let clients = match stage {
            Some(stage) => {
                let sql = format!("{CLIENT_COLUMNS} WHERE c.stage = $1 ORDER BY c.created_at DESC, c.id DESC");
                sqlx::query_as::<_, Client>(&sql)
                    .bind(stage.as_str())
                    .fetch_all(self.get_pool())
                    .await?
            }
            None => {
                let sql = format!("{CLIENT_COLUMNS} ORDER BY c.created_at DESC, c.id DESC");
                sqlx::query_as::<_, Client>(&sql)
                    .fetch_all(self.get_pool())
                    .await?
            }
        };

        Ok(clients)
    }

    async fn get_client(&self, id: i32) -> StoreResult<Client> {
        self.fetch_client(id).await
    }

    async fn create_client(&self, client: &NewClient) -> StoreResult<Client> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO clients (first_name, last_name, email, phone, company, address, notes,
                                 stage, created_by, assigned_to, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.company)
        .bind(&client.address)
        .bind(&client.notes)
        .bind(client.stage.as_str())
        .bind(client.created_by)
        .bind(client.assigned_to)
        .bind(client.created_at)
        .bind(client.updated_at)
        .fetch_one(self.get_pool())
        .await
        .map_err(map_constraint)?;

        self.fetch_client(id).await
    }

    async fn update_client(&self, client: &Client) -> StoreResult<Client> {
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET first_name = $1, last_name = $2, email = $3, phone = $4, company = $5,
                address = $6, notes = $7, stage = $8, assigned_to = $9, updated_at = $10
            WHERE id = $11
            "#,
        )
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.company)
        .bind(&client.address)
        .bind(&client.notes)
        .bind(client.stage.as_str())
        .bind(client.assigned_to)
        .bind(client.updated_at)
        .bind(client.id)
        .execute(self.get_pool())
        .await
        .map_err(map_constraint)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_client(client.id).await
    }

    async fn delete_client(&self, id: i32) -> StoreResult<()> {
        // Interactions go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(self.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn change_stage(
        &self,
        id: i32,
        stage: Stage,
        note: &NewInteraction,
    ) -> StoreResult<Client> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE clients SET stage = $1, updated_at = $2 WHERE id = $3")
            .bind(stage.as_str())
            .bind(note.created_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }

        let note_id = Self::insert_interaction(&mut tx, note).await?;

        tx.commit().await?;
        info!(client_id = id, note_id, stage = %stage, "stage change committed");

        self.fetch_client(id).await
    }

    async fn list_interactions(&self, client_id: Option<i32>) -> StoreResult<Vec<ClientInteraction>> {
        let interactions = match client_id {
            Some(client_id) => {
                let sql = format!(
                    "{INTERACTION_COLUMNS} WHERE i.client_id = $1 ORDER BY i.created_at DESC, i.id DESC"
                );
                sqlx::query_as::<_, ClientInteraction>(&sql)
                    .bind(client_id)
                    .fetch_all(self.get_pool())
                    .await?
            }
            None => {
                let sql = format!("{INTERACTION_COLUMNS} ORDER BY i.created_at DESC, i.id DESC");
                sqlx::query_as::<_, ClientInteraction>(&sql)
                    .fetch_all(self.get_pool())
                    .await?
            }
        };

        Ok(interactions)
    }

    async fn get_interaction(&self, id: i32) -> StoreResult<ClientInteraction> {
        self.fetch_interaction(id).await
    }

    async fn create_interaction(&self, interaction: &NewInteraction) -> StoreResult<ClientInteraction> {
        let mut tx = self.pool.begin().await?;
        let id = Self::insert_interaction(&mut tx, interaction).await?;
        tx.commit().await?;

        self.fetch_interaction(id).await
    }

    async fn update_interaction(&self, interaction: &ClientInteraction) -> StoreResult<ClientInteraction> {
        let result = sqlx::query(
            r#"
            UPDATE client_interactions
            SET client_id = $1, interaction_type = $2, subject = $3, description = $4
            WHERE id = $5
            "#,
        )
        .bind(interaction.client_id)
        .bind(interaction.interaction_type.as_str())
        .bind(&interaction.subject)
        .bind(&interaction.description)
        .bind(interaction.id)
        .execute(self.get_pool())
        .await
        .map_err(map_constraint)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_interaction(interaction.id).await
    }

    async fn delete_interaction(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM client_interactions WHERE id = $1")
            .bind(id)
            .execute(self.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn statistics(&self, since: DateTime<Utc>) -> StoreResult<StatisticsCounts> {
        // One snapshot for all three reads
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let clients = sqlx::query_as::<_, ClientTally>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE stage = $1) AS lead,
                COUNT(*) FILTER (WHERE stage = $2) AS in_progress,
                COUNT(*) FILTER (WHERE stage = $3) AS active,
                COUNT(*) FILTER (WHERE created_at >= $4) AS recent
            FROM clients
            "#,
        )
        .bind(Stage::Lead.as_str())
        .bind(Stage::InProgress.as_str())
        .bind(Stage::Active.as_str())
        .bind(since)
        .fetch_one(&mut *tx)
        .await?;

        let staff = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT assignee.username, COUNT(*)
            FROM clients c
            JOIN users assignee ON assignee.id = c.assigned_to
            GROUP BY assignee.username
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let interactions = sqlx::query_as::<_, InteractionTally>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE created_at >= $1) AS recent
            FROM client_interactions
            "#,
        )
        .bind(since)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        // COUNT(*) is never negative
        Ok(StatisticsCounts {
            by_stage: StageCounts {
                lead: clients.lead as u64,
                in_progress: clients.in_progress as u64,
                active: clients.active as u64,
            },
            recent_clients: clients.recent as u64,
            by_staff: staff
                .into_iter()
                .map(|(username, count)| (username, count as u64))
                .collect::<BTreeMap<_, _>>(),
            total_interactions: interactions.total as u64,
            recent_interactions: interactions.recent as u64,
        })
    }
}

/// Initialize the database connection pool and bring the schema up to date
pub async fn init(config: &Config) -> anyhow::Result<Database> {
    let db = Database::new(config).await?;

    db.migrate().await?;

    Ok(db)
}
