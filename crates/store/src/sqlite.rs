//! SQLite store.
//!
//! Uses a single SQLite database file with four tables:
//! - `projects`, `chapters` — one row per record
//! - `characters` — roster rows; `abilities` is a JSON array column
//! - `relationships` — character edges, ordered by `ordinal`
//!
//! The engine only ever reads; the `insert_*` methods back the importer.

use async_trait::async_trait;
use chrono::Utc;
use inkloom_core::error::StoreError;
use inkloom_core::narrative::{Chapter, Character, NarrativeProject, ProjectBundle, Relationship};
use inkloom_core::store::NarrativeStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};

/// A production SQLite narrative store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Every connection to `:memory:` is a separate database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite narrative store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements: [(&str, &str); 5] = [
            (
                "projects table",
                r#"
                CREATE TABLE IF NOT EXISTS projects (
                    id          TEXT PRIMARY KEY,
                    name        TEXT NOT NULL,
                    genre       TEXT NOT NULL DEFAULT '',
                    description TEXT NOT NULL DEFAULT '',
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "chapters table",
                r#"
                CREATE TABLE IF NOT EXISTS chapters (
                    id          TEXT PRIMARY KEY,
                    project_id  TEXT NOT NULL,
                    title       TEXT NOT NULL,
                    content     TEXT NOT NULL DEFAULT '',
                    position    INTEGER NOT NULL DEFAULT 1,
                    updated_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "characters table",
                r#"
                CREATE TABLE IF NOT EXISTS characters (
                    iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    id          TEXT UNIQUE NOT NULL,
                    project_id  TEXT NOT NULL,
                    name        TEXT NOT NULL,
                    archetype   TEXT,
                    age         INTEGER,
                    gender      TEXT,
                    appearance  TEXT NOT NULL DEFAULT '',
                    personality TEXT NOT NULL DEFAULT '',
                    background  TEXT NOT NULL DEFAULT '',
                    abilities   TEXT NOT NULL DEFAULT '[]'
                )
                "#,
            ),
            (
                "relationships table",
                r#"
                CREATE TABLE IF NOT EXISTS relationships (
                    character_id TEXT NOT NULL REFERENCES characters(id) ON DELETE CASCADE,
                    ordinal      INTEGER NOT NULL,
                    target_id    TEXT NOT NULL,
                    kind         TEXT NOT NULL,
                    description  TEXT NOT NULL DEFAULT '',
                    PRIMARY KEY (character_id, ordinal)
                )
                "#,
            ),
            (
                "characters project index",
                "CREATE INDEX IF NOT EXISTS idx_characters_project ON characters(project_id, iid)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get(name)
            .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
    }

    fn parse_timestamp(raw: &str) -> chrono::DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> Result<NarrativeProject, StoreError> {
        let created_at: String = Self::column(row, "created_at")?;
        Ok(NarrativeProject {
            id: Self::column(row, "id")?,
            name: Self::column(row, "name")?,
            genre: Self::column(row, "genre")?,
            description: Self::column(row, "description")?,
            created_at: Self::parse_timestamp(&created_at),
        })
    }

    fn row_to_chapter(row: &sqlx::sqlite::SqliteRow) -> Result<Chapter, StoreError> {
        let position: i64 = Self::column(row, "position")?;
        let updated_at: String = Self::column(row, "updated_at")?;
        Ok(Chapter {
            id: Self::column(row, "id")?,
            project_id: Self::column(row, "project_id")?,
            title: Self::column(row, "title")?,
            content: Self::column(row, "content")?,
            position: u32::try_from(position).unwrap_or(0),
            updated_at: Self::parse_timestamp(&updated_at),
        })
    }

    fn row_to_character(row: &sqlx::sqlite::SqliteRow) -> Result<Character, StoreError> {
        let id: String = Self::column(row, "id")?;
        let abilities_json: String = Self::column(row, "abilities")?;
        let abilities: Vec<String> =
            serde_json::from_str(&abilities_json).map_err(|e| StoreError::Corrupt {
                id: id.clone(),
                reason: format!("abilities column: {e}"),
            })?;
        let age: Option<i64> = Self::column(row, "age")?;

        Ok(Character {
            id,
            project_id: Self::column(row, "project_id")?,
            name: Self::column(row, "name")?,
            archetype: Self::column(row, "archetype")?,
            age: age.and_then(|a| u32::try_from(a).ok()),
            gender: Self::column(row, "gender")?,
            appearance: Self::column(row, "appearance")?,
            personality: Self::column(row, "personality")?,
            background: Self::column(row, "background")?,
            abilities,
            relationships: Vec::new(),
        })
    }

    pub async fn insert_project(&self, project: &NarrativeProject) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, genre, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                genre = excluded.genre,
                description = excluded.description
            "#,
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.genre)
        .bind(&project.description)
        .bind(project.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT project failed: {e}")))?;

        debug!("Stored project {}", project.id);
        Ok(())
    }

    pub async fn insert_chapter(&self, chapter: &Chapter) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chapters (id, project_id, title, content, position, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                title = excluded.title,
                content = excluded.content,
                position = excluded.position,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&chapter.id)
        .bind(&chapter.project_id)
        .bind(&chapter.title)
        .bind(&chapter.content)
        .bind(i64::from(chapter.position))
        .bind(chapter.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT chapter failed: {e}")))?;

        debug!("Stored chapter {}", chapter.id);
        Ok(())
    }

    /// Upsert a character and replace its relationship edges atomically.
    pub async fn insert_character(&self, character: &Character) -> Result<(), StoreError> {
        let abilities_json = serde_json::to_string(&character.abilities)
            .map_err(|e| StoreError::Storage(format!("Abilities serialization: {e}")))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO characters
                (id, project_id, name, archetype, age, gender, appearance, personality, background, abilities)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                name = excluded.name,
                archetype = excluded.archetype,
                age = excluded.age,
                gender = excluded.gender,
                appearance = excluded.appearance,
                personality = excluded.personality,
                background = excluded.background,
                abilities = excluded.abilities
            "#,
        )
        .bind(&character.id)
        .bind(&character.project_id)
        .bind(&character.name)
        .bind(&character.archetype)
        .bind(character.age.map(i64::from))
        .bind(&character.gender)
        .bind(&character.appearance)
        .bind(&character.personality)
        .bind(&character.background)
        .bind(&abilities_json)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT character failed: {e}")))?;

        sqlx::query("DELETE FROM relationships WHERE character_id = ?1")
            .bind(&character.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE relationships failed: {e}")))?;

        for (ordinal, rel) in character.relationships.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO relationships (character_id, ordinal, target_id, kind, description)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&character.id)
            .bind(ordinal as i64)
            .bind(&rel.target_id)
            .bind(&rel.kind)
            .bind(&rel.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT relationship failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))?;

        debug!("Stored character {}", character.id);
        Ok(())
    }

    /// Write every record of a bundle. Returns the number of records written.
    pub async fn import_bundle(&self, bundle: &ProjectBundle) -> Result<usize, StoreError> {
        self.insert_project(&bundle.project).await?;
        for chapter in &bundle.chapters {
            self.insert_chapter(chapter).await?;
        }
        for character in &bundle.characters {
            self.insert_character(character).await?;
        }
        Ok(1 + bundle.chapters.len() + bundle.characters.len())
    }
}

#[async_trait]
impl NarrativeStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_project(&self, id: &str) -> Result<Option<NarrativeProject>, StoreError> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET project: {e}")))?;

        row.as_ref().map(Self::row_to_project).transpose()
    }

    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, StoreError> {
        let row = sqlx::query("SELECT * FROM chapters WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET chapter: {e}")))?;

        row.as_ref().map(Self::row_to_chapter).transpose()
    }

    async fn list_characters(&self, project_id: &str) -> Result<Vec<Character>, StoreError> {
        let rows = sqlx::query("SELECT * FROM characters WHERE project_id = ?1 ORDER BY iid")
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("LIST characters: {e}")))?;

        let mut characters = rows
            .iter()
            .map(Self::row_to_character)
            .collect::<Result<Vec<_>, _>>()?;

        let edge_rows = sqlx::query(
            r#"
            SELECT r.character_id, r.target_id, r.kind, r.description
            FROM relationships r
            JOIN characters c ON c.id = r.character_id
            WHERE c.project_id = ?1
            ORDER BY r.character_id, r.ordinal
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("LIST relationships: {e}")))?;

        let mut edges: HashMap<String, Vec<Relationship>> = HashMap::new();
        for row in &edge_rows {
            let owner: String = Self::column(row, "character_id")?;
            edges.entry(owner).or_default().push(Relationship {
                target_id: Self::column(row, "target_id")?,
                kind: Self::column(row, "kind")?,
                description: Self::column(row, "description")?,
            });
        }

        for character in &mut characters {
            if let Some(rels) = edges.remove(&character.id) {
                character.relationships = rels;
            }
        }

        Ok(characters)
    }
}
