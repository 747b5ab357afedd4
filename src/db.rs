//! SQLite database with Diesel ORM
//!
//! Stores writing projects, codex entities, and the story graph (canvas
//! nodes, typed connections, prose text blocks). The schema is created on
//! open; foreign keys are enabled per connection so deletes cascade.

use crate::schema::*;
use crate::types::{
    CharacterRole, ConnectionType, NodeType, PlotPointStatus, ProviderKind, StoryElementKind,
    WorkStatus, MAX_STRENGTH, MIN_STRENGTH,
};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use serde::Deserialize;
use std::path::Path;

/// Count words the way the editor does: whitespace-separated tokens.
pub fn count_words(text: &str) -> i32 {
    text.split_whitespace().count() as i32
}

/// Walk up the directory tree to find a .openwrite folder (like git finds .git).
/// Can be overridden with the OPENWRITE_DB_PATH env var.
fn get_db_path() -> std::path::PathBuf {
    // Check env var first - always takes priority
    if let Ok(path) = std::env::var("OPENWRITE_DB_PATH") {
        return std::path::PathBuf::from(path);
    }

    if let Ok(current_dir) = std::env::current_dir() {
        let mut dir = current_dir.as_path();
        loop {
            let openwrite_dir = dir.join(".openwrite");
            if openwrite_dir.exists() && openwrite_dir.is_dir() {
                return openwrite_dir.join("openwrite.db");
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }

    // No .openwrite found - default to current directory
    // (openwrite init will create it here)
    std::path::PathBuf::from(".openwrite/openwrite.db")
}

// ============================================================================
// Diesel Models
// ============================================================================

#[derive(Insertable)]
#[diesel(table_name = projects)]
pub struct NewProject<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = projects)]
pub struct Project {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = works)]
pub struct NewWork<'a> {
    pub project_id: i32,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub status: &'a str,
    pub order_index: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = works)]
pub struct Work {
    pub id: i32,
    pub project_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub order_index: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = chapters)]
pub struct NewChapter<'a> {
    pub work_id: i32,
    pub title: &'a str,
    pub summary: Option<&'a str>,
    pub content: Option<&'a str>,
    pub order_index: i32,
    pub word_count: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = chapters)]
pub struct Chapter {
    pub id: i32,
    pub work_id: i32,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub order_index: i32,
    pub word_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = characters)]
pub struct NewCharacter<'a> {
    pub project_id: Option<i32>,
    pub work_id: Option<i32>,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub role: Option<&'a str>,
    pub metadata_json: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = characters)]
pub struct Character {
    pub id: i32,
    pub project_id: Option<i32>,
    pub work_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub role: Option<String>,
    pub metadata_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = locations)]
pub struct NewLocation<'a> {
    pub project_id: Option<i32>,
    pub work_id: Option<i32>,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub metadata_json: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = locations)]
pub struct Location {
    pub id: i32,
    pub project_id: Option<i32>,
    pub work_id: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub metadata_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = plot_points)]
pub struct NewPlotPoint<'a> {
    pub project_id: Option<i32>,
    pub work_id: Option<i32>,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub status: &'a str,
    pub metadata_json: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = plot_points)]
pub struct PlotPoint {
    pub id: i32,
    pub project_id: Option<i32>,
    pub work_id: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub metadata_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = lore_entries)]
pub struct NewLoreEntry<'a> {
    pub project_id: Option<i32>,
    pub work_id: Option<i32>,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub metadata_json: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = lore_entries)]
pub struct LoreEntry {
    pub id: i32,
    pub project_id: Option<i32>,
    pub work_id: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub metadata_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = graph_nodes)]
pub struct NewGraphNode<'a> {
    pub project_id: i32,
    pub node_type: &'a str,
    pub subtype: Option<&'a str>,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub position_x: f64,
    pub position_y: f64,
    pub visual_style_json: Option<&'a str>,
    pub metadata_json: Option<&'a str>,
    pub word_count: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = graph_nodes)]
pub struct GraphNode {
    pub id: i32,
    pub project_id: i32,
    pub node_type: String,
    pub subtype: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub position_x: f64,
    pub position_y: f64,
    pub visual_style_json: Option<String>,
    pub metadata_json: Option<String>,
    pub word_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = text_blocks)]
pub struct NewTextBlock<'a> {
    pub node_id: i32,
    pub content: &'a str,
    pub order_index: i32,
    pub word_count: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = text_blocks)]
pub struct TextBlock {
    pub id: i32,
    pub node_id: i32,
    pub content: String,
    pub order_index: i32,
    pub word_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = graph_connections)]
pub struct NewGraphConnection<'a> {
    pub project_id: i32,
    pub from_node_id: i32,
    pub to_node_id: i32,
    pub connection_type: &'a str,
    pub strength: i32,
    pub visual_style_json: Option<&'a str>,
    pub metadata_json: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = graph_connections)]
pub struct GraphConnection {
    pub id: i32,
    pub project_id: i32,
    pub from_node_id: i32,
    pub to_node_id: i32,
    pub connection_type: String,
    pub strength: i32,
    pub visual_style_json: Option<String>,
    pub metadata_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = ai_providers)]
pub struct NewAiProvider<'a> {
    pub name: &'a str,
    pub provider_kind: &'a str,
    pub base_url: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub enabled: bool,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = ai_providers)]
pub struct AiProvider {
    pub id: i32,
    pub name: String,
    pub provider_kind: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Full story graph of one project, for the canvas and DOT export
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoryGraph {
    pub nodes: Vec<GraphNode>,
    pub connections: Vec<GraphConnection>,
}

// ============================================================================
// Request Payloads
//
// Deserialized straight from PUT/POST bodies by the API layer and accepted
// by the CLI. Absent fields in a *Changes payload leave the column as-is.
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWork {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub order_index: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub order_index: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChapter {
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub order_index: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterChanges {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub order_index: Option<i32>,
}

/// Shared owner fields for codex entities: exactly one must be set.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CodexOwner {
    pub project_id: Option<i32>,
    pub work_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCharacter {
    #[serde(flatten)]
    pub owner: CodexOwner,
    pub name: String,
    pub description: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharacterChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLocation {
    #[serde(flatten)]
    pub owner: CodexOwner,
    pub name: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlotPoint {
    #[serde(flatten)]
    pub owner: CodexOwner,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlotPointChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLoreEntry {
    #[serde(flatten)]
    pub owner: CodexOwner,
    pub title: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoreEntryChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNode {
    pub node_type: String,
    pub subtype: Option<String>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
    pub visual_style: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeChanges {
    pub subtype: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub visual_style: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTextBlock {
    pub content: String,
    #[serde(default)]
    pub order_index: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextBlockChanges {
    pub content: Option<String>,
    pub order_index: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateConnection {
    pub from_node_id: i32,
    pub to_node_id: i32,
    pub connection_type: String,
    pub strength: Option<i32>,
    pub visual_style: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionChanges {
    pub connection_type: Option<String>,
    pub strength: Option<i32>,
    pub visual_style: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAiProvider {
    pub name: String,
    pub provider_kind: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiProviderChanges {
    pub name: Option<String>,
    pub provider_kind: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub enabled: Option<bool>,
}

// ============================================================================
// Database Connection
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Database connection wrapper with connection pool
pub struct Database {
    pool: DbPool,
}

/// Error type for database operations
#[derive(Debug)]
pub enum DbError {
    Connection(String),
    Query(diesel::result::Error),
    Pool(diesel::r2d2::Error),
    Validation(String),
    NotFound(String),
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::Connection(msg) => write!(f, "Connection error: {}", msg),
            DbError::Query(e) => write!(f, "Query error: {}", e),
            DbError::Pool(e) => write!(f, "Pool error: {}", e),
            DbError::Validation(msg) => write!(f, "{}", msg),
            DbError::NotFound(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DbError {}

impl From<diesel::result::Error> for DbError {
    fn from(e: diesel::result::Error) -> Self {
        DbError::Query(e)
    }
}

impl From<diesel::r2d2::Error> for DbError {
    fn from(e: diesel::r2d2::Error) -> Self {
        DbError::Pool(e)
    }
}

impl From<crate::types::ParseEnumError> for DbError {
    fn from(e: crate::types::ParseEnumError) -> Self {
        DbError::Validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Enables foreign keys on every pooled connection. Cascade deletes
/// depend on this pragma, which SQLite defaults to OFF.
#[derive(Debug)]
struct ConnectionOptions;

impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for ConnectionOptions
{
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339()
}

fn json_opt_string(value: &Option<serde_json::Value>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

impl Database {
    /// Get the database path that will be used
    pub fn db_path() -> std::path::PathBuf {
        get_db_path()
    }

    /// Create a new database at a custom path
    pub fn new(path: &str) -> Result<Self> {
        Self::open_at(path)
    }

    /// Open database at default path (respects OPENWRITE_DB_PATH env var)
    pub fn open() -> Result<Self> {
        let path = get_db_path();
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).ok();
            }
        }
        Self::open_at(&path)
    }

    /// Open database at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(&path_str);
        let pool = Pool::builder()
            .max_size(5)
            .connection_customizer(Box::new(ConnectionOptions))
            .build(manager)
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn get_conn(&self) -> Result<DbConn> {
        self.pool
            .get()
            .map_err(|e| DbError::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS works (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                project_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'draft',
                order_index INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS chapters (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                work_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                summary TEXT,
                content TEXT,
                order_index INTEGER NOT NULL DEFAULT 0,
                word_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (work_id) REFERENCES works(id) ON DELETE CASCADE
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                project_id INTEGER,
                work_id INTEGER,
                name TEXT NOT NULL,
                description TEXT,
                role TEXT,
                metadata_json TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY (work_id) REFERENCES works(id) ON DELETE CASCADE,
                CHECK ((project_id IS NULL) != (work_id IS NULL))
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                project_id INTEGER,
                work_id INTEGER,
                name TEXT NOT NULL,
                description TEXT,
                metadata_json TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY (work_id) REFERENCES works(id) ON DELETE CASCADE,
                CHECK ((project_id IS NULL) != (work_id IS NULL))
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS plot_points (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                project_id INTEGER,
                work_id INTEGER,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'open',
                metadata_json TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY (work_id) REFERENCES works(id) ON DELETE CASCADE,
                CHECK ((project_id IS NULL) != (work_id IS NULL))
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS lore_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                project_id INTEGER,
                work_id INTEGER,
                title TEXT NOT NULL,
                description TEXT,
                metadata_json TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY (work_id) REFERENCES works(id) ON DELETE CASCADE,
                CHECK ((project_id IS NULL) != (work_id IS NULL))
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS graph_nodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                project_id INTEGER NOT NULL,
                node_type TEXT NOT NULL,
                subtype TEXT,
                title TEXT NOT NULL,
                description TEXT,
                position_x REAL NOT NULL DEFAULT 0,
                position_y REAL NOT NULL DEFAULT 0,
                visual_style_json TEXT,
                metadata_json TEXT,
                word_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS text_blocks (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                node_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                order_index INTEGER NOT NULL DEFAULT 0,
                word_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (node_id) REFERENCES graph_nodes(id) ON DELETE CASCADE
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS graph_connections (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                project_id INTEGER NOT NULL,
                from_node_id INTEGER NOT NULL,
                to_node_id INTEGER NOT NULL,
                connection_type TEXT NOT NULL,
                strength INTEGER NOT NULL DEFAULT 1,
                visual_style_json TEXT,
                metadata_json TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY (from_node_id) REFERENCES graph_nodes(id) ON DELETE CASCADE,
                FOREIGN KEY (to_node_id) REFERENCES graph_nodes(id) ON DELETE CASCADE
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS ai_providers (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                name TEXT NOT NULL,
                provider_kind TEXT NOT NULL,
                base_url TEXT,
                api_key TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut conn)?;

        // Create indexes
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_works_project ON works(project_id)")
            .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_chapters_work ON chapters(work_id)")
            .execute(&mut conn)?;
        diesel::sql_query(
            "CREATE INDEX IF NOT EXISTS idx_nodes_project ON graph_nodes(project_id)",
        )
        .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_nodes_type ON graph_nodes(node_type)")
            .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_blocks_node ON text_blocks(node_id)")
            .execute(&mut conn)?;
        diesel::sql_query(
            "CREATE INDEX IF NOT EXISTS idx_connections_project ON graph_connections(project_id)",
        )
        .execute(&mut conn)?;
        diesel::sql_query(
            "CREATE INDEX IF NOT EXISTS idx_connections_from ON graph_connections(from_node_id)",
        )
        .execute(&mut conn)?;
        diesel::sql_query(
            "CREATE INDEX IF NOT EXISTS idx_connections_to ON graph_connections(to_node_id)",
        )
        .execute(&mut conn)?;

        Ok(())
    }

    fn last_insert_id(conn: &mut DbConn) -> Result<i32> {
        let id: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>(
            "last_insert_rowid()",
        ))
        .first(conn)?;
        Ok(id)
    }

    /// Resolve a codex owner: exactly one of project/work, and it must exist.
    fn check_owner(&self, conn: &mut DbConn, owner: &CodexOwner) -> Result<()> {
        match (owner.project_id, owner.work_id) {
            (Some(_), Some(_)) => Err(DbError::Validation(
                "Entity cannot belong to both a project and a work".to_string(),
            )),
            (None, None) => Err(DbError::Validation(
                "Entity must belong to a project or a work".to_string(),
            )),
            (Some(pid), None) => {
                let exists: Option<Project> = projects::table
                    .filter(projects::id.eq(pid))
                    .first(conn)
                    .optional()?;
                exists
                    .map(|_| ())
                    .ok_or_else(|| DbError::NotFound(format!("Project {} does not exist", pid)))
            }
            (None, Some(wid)) => {
                let exists: Option<Work> =
                    works::table.filter(works::id.eq(wid)).first(conn).optional()?;
                exists
                    .map(|_| ())
                    .ok_or_else(|| DbError::NotFound(format!("Work {} does not exist", wid)))
            }
        }
    }

    // ========================================================================
    // Project Operations
    // ========================================================================

    pub fn create_project(&self, input: &CreateProject) -> Result<Project> {
        let mut conn = self.get_conn()?;
        let now = now_rfc3339();

        let new_project = NewProject {
            name: &input.name,
            description: input.description.as_deref(),
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(projects::table)
            .values(&new_project)
            .execute(&mut conn)?;

        let id = Self::last_insert_id(&mut conn)?;
        self.fetch_project(&mut conn, id)
    }

    fn fetch_project(&self, conn: &mut DbConn, id: i32) -> Result<Project> {
        projects::table
            .filter(projects::id.eq(id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Project {} does not exist", id)))
    }

    pub fn get_project(&self, id: i32) -> Result<Project> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, id)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut conn = self.get_conn()?;
        let rows = projects::table
            .order(projects::created_at.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn update_project(&self, id: i32, changes: &ProjectChanges) -> Result<Project> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, id)?;
        let now = now_rfc3339();

        diesel::update(projects::table.filter(projects::id.eq(id)))
            .set((
                changes.name.as_deref().map(|v| projects::name.eq(v)),
                changes
                    .description
                    .as_deref()
                    .map(|v| projects::description.eq(v)),
                projects::updated_at.eq(&now),
            ))
            .execute(&mut conn)?;

        self.fetch_project(&mut conn, id)
    }

    pub fn delete_project(&self, id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let n = diesel::delete(projects::table.filter(projects::id.eq(id)))
            .execute(&mut conn)?;
        if n == 0 {
            return Err(DbError::NotFound(format!("Project {} does not exist", id)));
        }
        Ok(())
    }

    // ========================================================================
    // Work Operations
    // ========================================================================

    pub fn create_work(&self, project_id: i32, input: &CreateWork) -> Result<Work> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, project_id)?;

        let status = match &input.status {
            Some(s) => s.parse::<WorkStatus>()?,
            None => WorkStatus::Draft,
        };

        let now = now_rfc3339();
        let new_work = NewWork {
            project_id,
            title: &input.title,
            description: input.description.as_deref(),
            status: status.as_str(),
            order_index: input.order_index.unwrap_or(0),
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(works::table)
            .values(&new_work)
            .execute(&mut conn)?;

        let id = Self::last_insert_id(&mut conn)?;
        self.fetch_work(&mut conn, id)
    }

    fn fetch_work(&self, conn: &mut DbConn, id: i32) -> Result<Work> {
        works::table
            .filter(works::id.eq(id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Work {} does not exist", id)))
    }

    pub fn get_work(&self, id: i32) -> Result<Work> {
        let mut conn = self.get_conn()?;
        self.fetch_work(&mut conn, id)
    }

    pub fn list_works(&self, project_id: i32) -> Result<Vec<Work>> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, project_id)?;
        let rows = works::table
            .filter(works::project_id.eq(project_id))
            .order((works::order_index.asc(), works::id.asc()))
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn update_work(&self, id: i32, changes: &WorkChanges) -> Result<Work> {
        let mut conn = self.get_conn()?;
        self.fetch_work(&mut conn, id)?;

        let status = match &changes.status {
            Some(s) => Some(s.parse::<WorkStatus>()?),
            None => None,
        };

        let now = now_rfc3339();
        diesel::update(works::table.filter(works::id.eq(id)))
            .set((
                changes.title.as_deref().map(|v| works::title.eq(v)),
                changes
                    .description
                    .as_deref()
                    .map(|v| works::description.eq(v)),
                status.map(|s| works::status.eq(s.as_str())),
                changes.order_index.map(|v| works::order_index.eq(v)),
                works::updated_at.eq(&now),
            ))
            .execute(&mut conn)?;

        self.fetch_work(&mut conn, id)
    }

    pub fn delete_work(&self, id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let n = diesel::delete(works::table.filter(works::id.eq(id))).execute(&mut conn)?;
        if n == 0 {
            return Err(DbError::NotFound(format!("Work {} does not exist", id)));
        }
        Ok(())
    }

    // ========================================================================
    // Chapter Operations
    // ========================================================================

    pub fn create_chapter(&self, work_id: i32, input: &CreateChapter) -> Result<Chapter> {
        let mut conn = self.get_conn()?;
        self.fetch_work(&mut conn, work_id)?;

        let now = now_rfc3339();
        let word_count = input.content.as_deref().map(count_words).unwrap_or(0);
        let new_chapter = NewChapter {
            work_id,
            title: &input.title,
            summary: input.summary.as_deref(),
            content: input.content.as_deref(),
            order_index: input.order_index.unwrap_or(0),
            word_count,
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(chapters::table)
            .values(&new_chapter)
            .execute(&mut conn)?;

        let id = Self::last_insert_id(&mut conn)?;
        self.fetch_chapter(&mut conn, id)
    }

    fn fetch_chapter(&self, conn: &mut DbConn, id: i32) -> Result<Chapter> {
        chapters::table
            .filter(chapters::id.eq(id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Chapter {} does not exist", id)))
    }

    pub fn get_chapter(&self, id: i32) -> Result<Chapter> {
        let mut conn = self.get_conn()?;
        self.fetch_chapter(&mut conn, id)
    }

    pub fn list_chapters(&self, work_id: i32) -> Result<Vec<Chapter>> {
        let mut conn = self.get_conn()?;
        self.fetch_work(&mut conn, work_id)?;
        let rows = chapters::table
            .filter(chapters::work_id.eq(work_id))
            .order((chapters::order_index.asc(), chapters::id.asc()))
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn update_chapter(&self, id: i32, changes: &ChapterChanges) -> Result<Chapter> {
        let mut conn = self.get_conn()?;
        self.fetch_chapter(&mut conn, id)?;

        let word_count = changes.content.as_deref().map(count_words);
        let now = now_rfc3339();
        diesel::update(chapters::table.filter(chapters::id.eq(id)))
            .set((
                changes.title.as_deref().map(|v| chapters::title.eq(v)),
                changes.summary.as_deref().map(|v| chapters::summary.eq(v)),
                changes.content.as_deref().map(|v| chapters::content.eq(v)),
                changes.order_index.map(|v| chapters::order_index.eq(v)),
                word_count.map(|v| chapters::word_count.eq(v)),
                chapters::updated_at.eq(&now),
            ))
            .execute(&mut conn)?;

        self.fetch_chapter(&mut conn, id)
    }

    pub fn delete_chapter(&self, id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let n = diesel::delete(chapters::table.filter(chapters::id.eq(id))).execute(&mut conn)?;
        if n == 0 {
            return Err(DbError::NotFound(format!("Chapter {} does not exist", id)));
        }
        Ok(())
    }

    // ========================================================================
    // Codex Operations - characters, locations, plot points, lore
    // ========================================================================

    pub fn create_character(&self, input: &CreateCharacter) -> Result<Character> {
        let mut conn = self.get_conn()?;
        self.check_owner(&mut conn, &input.owner)?;

        let role = match &input.role {
            Some(r) => Some(r.parse::<CharacterRole>()?),
            None => None,
        };

        let now = now_rfc3339();
        let metadata = json_opt_string(&input.metadata);
        let new_character = NewCharacter {
            project_id: input.owner.project_id,
            work_id: input.owner.work_id,
            name: &input.name,
            description: input.description.as_deref(),
            role: role.map(|r| r.as_str()),
            metadata_json: metadata.as_deref(),
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(characters::table)
            .values(&new_character)
            .execute(&mut conn)?;

        let id = Self::last_insert_id(&mut conn)?;
        self.fetch_character(&mut conn, id)
    }

    fn fetch_character(&self, conn: &mut DbConn, id: i32) -> Result<Character> {
        characters::table
            .filter(characters::id.eq(id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Character {} does not exist", id)))
    }

    pub fn get_character(&self, id: i32) -> Result<Character> {
        let mut conn = self.get_conn()?;
        self.fetch_character(&mut conn, id)
    }

    pub fn list_characters(&self, project_id: i32) -> Result<Vec<Character>> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, project_id)?;
        let rows = characters::table
            .filter(characters::project_id.eq(project_id))
            .order(characters::name.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn update_character(&self, id: i32, changes: &CharacterChanges) -> Result<Character> {
        let mut conn = self.get_conn()?;
        self.fetch_character(&mut conn, id)?;

        let role = match &changes.role {
            Some(r) => Some(r.parse::<CharacterRole>()?),
            None => None,
        };

        let now = now_rfc3339();
        let metadata = json_opt_string(&changes.metadata);
        diesel::update(characters::table.filter(characters::id.eq(id)))
            .set((
                changes.name.as_deref().map(|v| characters::name.eq(v)),
                changes
                    .description
                    .as_deref()
                    .map(|v| characters::description.eq(v)),
                role.map(|r| characters::role.eq(r.as_str())),
                metadata.as_deref().map(|v| characters::metadata_json.eq(v)),
                characters::updated_at.eq(&now),
            ))
            .execute(&mut conn)?;

        self.fetch_character(&mut conn, id)
    }

    pub fn delete_character(&self, id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let n =
            diesel::delete(characters::table.filter(characters::id.eq(id))).execute(&mut conn)?;
        if n == 0 {
            return Err(DbError::NotFound(format!("Character {} does not exist", id)));
        }
        Ok(())
    }

    pub fn create_location(&self, input: &CreateLocation) -> Result<Location> {
        let mut conn = self.get_conn()?;
        self.check_owner(&mut conn, &input.owner)?;

        let now = now_rfc3339();
        let metadata = json_opt_string(&input.metadata);
        let new_location = NewLocation {
            project_id: input.owner.project_id,
            work_id: input.owner.work_id,
            name: &input.name,
            description: input.description.as_deref(),
            metadata_json: metadata.as_deref(),
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(locations::table)
            .values(&new_location)
            .execute(&mut conn)?;

        let id = Self::last_insert_id(&mut conn)?;
        self.fetch_location(&mut conn, id)
    }

    fn fetch_location(&self, conn: &mut DbConn, id: i32) -> Result<Location> {
        locations::table
            .filter(locations::id.eq(id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Location {} does not exist", id)))
    }

    pub fn get_location(&self, id: i32) -> Result<Location> {
        let mut conn = self.get_conn()?;
        self.fetch_location(&mut conn, id)
    }

    pub fn list_locations(&self, project_id: i32) -> Result<Vec<Location>> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, project_id)?;
        let rows = locations::table
            .filter(locations::project_id.eq(project_id))
            .order(locations::name.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn update_location(&self, id: i32, changes: &LocationChanges) -> Result<Location> {
        let mut conn = self.get_conn()?;
        self.fetch_location(&mut conn, id)?;

        let now = now_rfc3339();
        let metadata = json_opt_string(&changes.metadata);
        diesel::update(locations::table.filter(locations::id.eq(id)))
            .set((
                changes.name.as_deref().map(|v| locations::name.eq(v)),
                changes
                    .description
                    .as_deref()
                    .map(|v| locations::description.eq(v)),
                metadata.as_deref().map(|v| locations::metadata_json.eq(v)),
                locations::updated_at.eq(&now),
            ))
            .execute(&mut conn)?;

        self.fetch_location(&mut conn, id)
    }

    pub fn delete_location(&self, id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let n = diesel::delete(locations::table.filter(locations::id.eq(id))).execute(&mut conn)?;
        if n == 0 {
            return Err(DbError::NotFound(format!("Location {} does not exist", id)));
        }
        Ok(())
    }

    pub fn create_plot_point(&self, input: &CreatePlotPoint) -> Result<PlotPoint> {
        let mut conn = self.get_conn()?;
        self.check_owner(&mut conn, &input.owner)?;

        let status = match &input.status {
            Some(s) => s.parse::<PlotPointStatus>()?,
            None => PlotPointStatus::Open,
        };

        let now = now_rfc3339();
        let metadata = json_opt_string(&input.metadata);
        let new_plot_point = NewPlotPoint {
            project_id: input.owner.project_id,
            work_id: input.owner.work_id,
            title: &input.title,
            description: input.description.as_deref(),
            status: status.as_str(),
            metadata_json: metadata.as_deref(),
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(plot_points::table)
            .values(&new_plot_point)
            .execute(&mut conn)?;

        let id = Self::last_insert_id(&mut conn)?;
        self.fetch_plot_point(&mut conn, id)
    }

    fn fetch_plot_point(&self, conn: &mut DbConn, id: i32) -> Result<PlotPoint> {
        plot_points::table
            .filter(plot_points::id.eq(id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Plot point {} does not exist", id)))
    }

    pub fn get_plot_point(&self, id: i32) -> Result<PlotPoint> {
        let mut conn = self.get_conn()?;
        self.fetch_plot_point(&mut conn, id)
    }

    pub fn list_plot_points(&self, project_id: i32) -> Result<Vec<PlotPoint>> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, project_id)?;
        let rows = plot_points::table
            .filter(plot_points::project_id.eq(project_id))
            .order(plot_points::created_at.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn update_plot_point(&self, id: i32, changes: &PlotPointChanges) -> Result<PlotPoint> {
        let mut conn = self.get_conn()?;
        self.fetch_plot_point(&mut conn, id)?;

        let status = match &changes.status {
            Some(s) => Some(s.parse::<PlotPointStatus>()?),
            None => None,
        };

        let now = now_rfc3339();
        let metadata = json_opt_string(&changes.metadata);
        diesel::update(plot_points::table.filter(plot_points::id.eq(id)))
            .set((
                changes.title.as_deref().map(|v| plot_points::title.eq(v)),
                changes
                    .description
                    .as_deref()
                    .map(|v| plot_points::description.eq(v)),
                status.map(|s| plot_points::status.eq(s.as_str())),
                metadata
                    .as_deref()
                    .map(|v| plot_points::metadata_json.eq(v)),
                plot_points::updated_at.eq(&now),
            ))
            .execute(&mut conn)?;

        self.fetch_plot_point(&mut conn, id)
    }

    pub fn delete_plot_point(&self, id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let n = diesel::delete(plot_points::table.filter(plot_points::id.eq(id)))
            .execute(&mut conn)?;
        if n == 0 {
            return Err(DbError::NotFound(format!("Plot point {} does not exist", id)));
        }
        Ok(())
    }

    pub fn create_lore_entry(&self, input: &CreateLoreEntry) -> Result<LoreEntry> {
        let mut conn = self.get_conn()?;
        self.check_owner(&mut conn, &input.owner)?;

        let now = now_rfc3339();
        let metadata = json_opt_string(&input.metadata);
        let new_lore = NewLoreEntry {
            project_id: input.owner.project_id,
            work_id: input.owner.work_id,
            title: &input.title,
            description: input.description.as_deref(),
            metadata_json: metadata.as_deref(),
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(lore_entries::table)
            .values(&new_lore)
            .execute(&mut conn)?;

        let id = Self::last_insert_id(&mut conn)?;
        self.fetch_lore_entry(&mut conn, id)
    }

    fn fetch_lore_entry(&self, conn: &mut DbConn, id: i32) -> Result<LoreEntry> {
        lore_entries::table
            .filter(lore_entries::id.eq(id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Lore entry {} does not exist", id)))
    }

    pub fn get_lore_entry(&self, id: i32) -> Result<LoreEntry> {
        let mut conn = self.get_conn()?;
        self.fetch_lore_entry(&mut conn, id)
    }

    pub fn list_lore_entries(&self, project_id: i32) -> Result<Vec<LoreEntry>> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, project_id)?;
        let rows = lore_entries::table
            .filter(lore_entries::project_id.eq(project_id))
            .order(lore_entries::title.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn update_lore_entry(&self, id: i32, changes: &LoreEntryChanges) -> Result<LoreEntry> {
        let mut conn = self.get_conn()?;
        self.fetch_lore_entry(&mut conn, id)?;

        let now = now_rfc3339();
        let metadata = json_opt_string(&changes.metadata);
        diesel::update(lore_entries::table.filter(lore_entries::id.eq(id)))
            .set((
                changes.title.as_deref().map(|v| lore_entries::title.eq(v)),
                changes
                    .description
                    .as_deref()
                    .map(|v| lore_entries::description.eq(v)),
                metadata
                    .as_deref()
                    .map(|v| lore_entries::metadata_json.eq(v)),
                lore_entries::updated_at.eq(&now),
            ))
            .execute(&mut conn)?;

        self.fetch_lore_entry(&mut conn, id)
    }

    pub fn delete_lore_entry(&self, id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let n = diesel::delete(lore_entries::table.filter(lore_entries::id.eq(id)))
            .execute(&mut conn)?;
        if n == 0 {
            return Err(DbError::NotFound(format!("Lore entry {} does not exist", id)));
        }
        Ok(())
    }

    // ========================================================================
    // Graph Node Operations
    // ========================================================================

    pub fn create_node(&self, project_id: i32, input: &CreateNode) -> Result<GraphNode> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, project_id)?;

        let node_type = input.node_type.parse::<NodeType>()?;
        let subtype = match &input.subtype {
            Some(s) => {
                if node_type != NodeType::StoryElement {
                    return Err(DbError::Validation(format!(
                        "Subtype is only valid for story_element nodes, not {}",
                        node_type
                    )));
                }
                Some(s.parse::<StoryElementKind>()?)
            }
            None => None,
        };

        let now = now_rfc3339();
        let visual_style = json_opt_string(&input.visual_style);
        let metadata = json_opt_string(&input.metadata);
        let new_node = NewGraphNode {
            project_id,
            node_type: node_type.as_str(),
            subtype: subtype.map(|s| s.as_str()),
            title: &input.title,
            description: input.description.as_deref(),
            position_x: input.position_x,
            position_y: input.position_y,
            visual_style_json: visual_style.as_deref(),
            metadata_json: metadata.as_deref(),
            word_count: 0,
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(graph_nodes::table)
            .values(&new_node)
            .execute(&mut conn)?;

        let id = Self::last_insert_id(&mut conn)?;
        self.fetch_node(&mut conn, id)
    }

    fn fetch_node(&self, conn: &mut DbConn, id: i32) -> Result<GraphNode> {
        graph_nodes::table
            .filter(graph_nodes::id.eq(id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Node {} does not exist", id)))
    }

    pub fn get_node(&self, id: i32) -> Result<GraphNode> {
        let mut conn = self.get_conn()?;
        self.fetch_node(&mut conn, id)
    }

    /// List a project's nodes, optionally filtered by node type
    pub fn list_nodes(&self, project_id: i32, node_type: Option<NodeType>) -> Result<Vec<GraphNode>> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, project_id)?;

        let mut query = graph_nodes::table
            .filter(graph_nodes::project_id.eq(project_id))
            .into_boxed();
        if let Some(nt) = node_type {
            query = query.filter(graph_nodes::node_type.eq(nt.as_str()));
        }
        let rows = query.order(graph_nodes::created_at.asc()).load(&mut conn)?;
        Ok(rows)
    }

    pub fn update_node(&self, id: i32, changes: &NodeChanges) -> Result<GraphNode> {
        let mut conn = self.get_conn()?;
        let node = self.fetch_node(&mut conn, id)?;

        let subtype = match &changes.subtype {
            Some(s) => {
                if node.node_type != NodeType::StoryElement.as_str() {
                    return Err(DbError::Validation(format!(
                        "Subtype is only valid for story_element nodes, not {}",
                        node.node_type
                    )));
                }
                Some(s.parse::<StoryElementKind>()?)
            }
            None => None,
        };

        let now = now_rfc3339();
        let visual_style = json_opt_string(&changes.visual_style);
        let metadata = json_opt_string(&changes.metadata);
        diesel::update(graph_nodes::table.filter(graph_nodes::id.eq(id)))
            .set((
                subtype.map(|s| graph_nodes::subtype.eq(s.as_str())),
                changes.title.as_deref().map(|v| graph_nodes::title.eq(v)),
                changes
                    .description
                    .as_deref()
                    .map(|v| graph_nodes::description.eq(v)),
                changes.position_x.map(|v| graph_nodes::position_x.eq(v)),
                changes.position_y.map(|v| graph_nodes::position_y.eq(v)),
                visual_style
                    .as_deref()
                    .map(|v| graph_nodes::visual_style_json.eq(v)),
                metadata
                    .as_deref()
                    .map(|v| graph_nodes::metadata_json.eq(v)),
                graph_nodes::updated_at.eq(&now),
            ))
            .execute(&mut conn)?;

        self.fetch_node(&mut conn, id)
    }

    pub fn delete_node(&self, id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let n = diesel::delete(graph_nodes::table.filter(graph_nodes::id.eq(id)))
            .execute(&mut conn)?;
        if n == 0 {
            return Err(DbError::NotFound(format!("Node {} does not exist", id)));
        }
        Ok(())
    }

    // ========================================================================
    // Text Block Operations
    // ========================================================================

    /// Blocks attach to story-element nodes only; anything else is a
    /// validation error.
    fn check_block_host(&self, conn: &mut DbConn, node_id: i32) -> Result<GraphNode> {
        let node = self.fetch_node(conn, node_id)?;
        if node.node_type != NodeType::StoryElement.as_str() {
            return Err(DbError::Validation(format!(
                "Text blocks attach to story_element nodes; node {} is a {}",
                node_id, node.node_type
            )));
        }
        Ok(node)
    }

    /// Keep the node's denormalized word count equal to the sum of its blocks.
    fn refresh_node_word_count(&self, conn: &mut DbConn, node_id: i32) -> Result<()> {
        let total: Option<i64> = text_blocks::table
            .filter(text_blocks::node_id.eq(node_id))
            .select(diesel::dsl::sum(text_blocks::word_count))
            .first(conn)?;
        let now = now_rfc3339();
        diesel::update(graph_nodes::table.filter(graph_nodes::id.eq(node_id)))
            .set((
                graph_nodes::word_count.eq(total.unwrap_or(0) as i32),
                graph_nodes::updated_at.eq(&now),
            ))
            .execute(conn)?;
        Ok(())
    }

    pub fn create_text_block(&self, node_id: i32, input: &CreateTextBlock) -> Result<TextBlock> {
        let mut conn = self.get_conn()?;
        self.check_block_host(&mut conn, node_id)?;

        let now = now_rfc3339();
        let new_block = NewTextBlock {
            node_id,
            content: &input.content,
            order_index: input.order_index,
            word_count: count_words(&input.content),
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(text_blocks::table)
            .values(&new_block)
            .execute(&mut conn)?;

        let id = Self::last_insert_id(&mut conn)?;
        self.refresh_node_word_count(&mut conn, node_id)?;
        self.fetch_text_block(&mut conn, id)
    }

    fn fetch_text_block(&self, conn: &mut DbConn, id: i32) -> Result<TextBlock> {
        text_blocks::table
            .filter(text_blocks::id.eq(id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Text block {} does not exist", id)))
    }

    pub fn get_text_block(&self, id: i32) -> Result<TextBlock> {
        let mut conn = self.get_conn()?;
        self.fetch_text_block(&mut conn, id)
    }

    /// List a node's blocks in reading order. Order indexes are
    /// caller-assigned and may repeat; id breaks ties.
    pub fn list_text_blocks(&self, node_id: i32) -> Result<Vec<TextBlock>> {
        let mut conn = self.get_conn()?;
        self.fetch_node(&mut conn, node_id)?;
        let rows = text_blocks::table
            .filter(text_blocks::node_id.eq(node_id))
            .order((text_blocks::order_index.asc(), text_blocks::id.asc()))
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn update_text_block(&self, id: i32, changes: &TextBlockChanges) -> Result<TextBlock> {
        let mut conn = self.get_conn()?;
        let block = self.fetch_text_block(&mut conn, id)?;

        let word_count = changes.content.as_deref().map(count_words);
        let now = now_rfc3339();
        diesel::update(text_blocks::table.filter(text_blocks::id.eq(id)))
            .set((
                changes.content.as_deref().map(|v| text_blocks::content.eq(v)),
                changes.order_index.map(|v| text_blocks::order_index.eq(v)),
                word_count.map(|v| text_blocks::word_count.eq(v)),
                text_blocks::updated_at.eq(&now),
            ))
            .execute(&mut conn)?;

        self.refresh_node_word_count(&mut conn, block.node_id)?;
        self.fetch_text_block(&mut conn, id)
    }

    pub fn delete_text_block(&self, id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let block = self.fetch_text_block(&mut conn, id)?;
        diesel::delete(text_blocks::table.filter(text_blocks::id.eq(id))).execute(&mut conn)?;
        self.refresh_node_word_count(&mut conn, block.node_id)?;
        Ok(())
    }

    // ========================================================================
    // Connection Operations
    // ========================================================================

    pub fn create_connection(
        &self,
        project_id: i32,
        input: &CreateConnection,
    ) -> Result<GraphConnection> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, project_id)?;

        let connection_type = input.connection_type.parse::<ConnectionType>()?;
        let strength = input.strength.unwrap_or(MIN_STRENGTH);
        if !(MIN_STRENGTH..=MAX_STRENGTH).contains(&strength) {
            return Err(DbError::Validation(format!(
                "Strength must be between {} and {}, got {}",
                MIN_STRENGTH, MAX_STRENGTH, strength
            )));
        }

        // Validate both endpoints exist before the same-project check so the
        // caller gets the more specific message.
        let from_node = graph_nodes::table
            .filter(graph_nodes::id.eq(input.from_node_id))
            .first::<GraphNode>(&mut conn)
            .optional()?;
        let to_node = graph_nodes::table
            .filter(graph_nodes::id.eq(input.to_node_id))
            .first::<GraphNode>(&mut conn)
            .optional()?;

        let (from_node, to_node) = match (from_node, to_node) {
            (Some(f), Some(t)) => (f, t),
            (None, None) => {
                return Err(DbError::NotFound(format!(
                    "Both nodes {} and {} do not exist",
                    input.from_node_id, input.to_node_id
                )))
            }
            (None, _) => {
                return Err(DbError::NotFound(format!(
                    "Source node {} does not exist",
                    input.from_node_id
                )))
            }
            (_, None) => {
                return Err(DbError::NotFound(format!(
                    "Target node {} does not exist",
                    input.to_node_id
                )))
            }
        };

        // Connections never cross project boundaries.
        if from_node.project_id != project_id || to_node.project_id != project_id {
            return Err(DbError::Validation(format!(
                "Nodes {} and {} must both belong to project {}",
                input.from_node_id, input.to_node_id, project_id
            )));
        }

        let now = now_rfc3339();
        let visual_style = json_opt_string(&input.visual_style);
        let metadata = json_opt_string(&input.metadata);
        let new_connection = NewGraphConnection {
            project_id,
            from_node_id: input.from_node_id,
            to_node_id: input.to_node_id,
            connection_type: connection_type.as_str(),
            strength,
            visual_style_json: visual_style.as_deref(),
            metadata_json: metadata.as_deref(),
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(graph_connections::table)
            .values(&new_connection)
            .execute(&mut conn)?;

        let id = Self::last_insert_id(&mut conn)?;
        self.fetch_connection(&mut conn, id)
    }

    fn fetch_connection(&self, conn: &mut DbConn, id: i32) -> Result<GraphConnection> {
        graph_connections::table
            .filter(graph_connections::id.eq(id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Connection {} does not exist", id)))
    }

    pub fn get_connection(&self, id: i32) -> Result<GraphConnection> {
        let mut conn = self.get_conn()?;
        self.fetch_connection(&mut conn, id)
    }

    pub fn list_connections(&self, project_id: i32) -> Result<Vec<GraphConnection>> {
        let mut conn = self.get_conn()?;
        self.fetch_project(&mut conn, project_id)?;
        let rows = graph_connections::table
            .filter(graph_connections::project_id.eq(project_id))
            .order(graph_connections::created_at.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn update_connection(
        &self,
        id: i32,
        changes: &ConnectionChanges,
    ) -> Result<GraphConnection> {
        let mut conn = self.get_conn()?;
        self.fetch_connection(&mut conn, id)?;

        let connection_type = match &changes.connection_type {
            Some(t) => Some(t.parse::<ConnectionType>()?),
            None => None,
        };
        if let Some(strength) = changes.strength {
            if !(MIN_STRENGTH..=MAX_STRENGTH).contains(&strength) {
                return Err(DbError::Validation(format!(
                    "Strength must be between {} and {}, got {}",
                    MIN_STRENGTH, MAX_STRENGTH, strength
                )));
            }
        }

        let now = now_rfc3339();
        let visual_style = json_opt_string(&changes.visual_style);
        let metadata = json_opt_string(&changes.metadata);
        diesel::update(graph_connections::table.filter(graph_connections::id.eq(id)))
            .set((
                connection_type.map(|t| graph_connections::connection_type.eq(t.as_str())),
                changes.strength.map(|v| graph_connections::strength.eq(v)),
                visual_style
                    .as_deref()
                    .map(|v| graph_connections::visual_style_json.eq(v)),
                metadata
                    .as_deref()
                    .map(|v| graph_connections::metadata_json.eq(v)),
                graph_connections::updated_at.eq(&now),
            ))
            .execute(&mut conn)?;

        self.fetch_connection(&mut conn, id)
    }

    pub fn delete_connection(&self, id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let n = diesel::delete(graph_connections::table.filter(graph_connections::id.eq(id)))
            .execute(&mut conn)?;
        if n == 0 {
            return Err(DbError::NotFound(format!("Connection {} does not exist", id)));
        }
        Ok(())
    }

    /// Get one project's story graph as a JSON-serializable structure
    pub fn get_story_graph(&self, project_id: i32) -> Result<StoryGraph> {
        let nodes = self.list_nodes(project_id, None)?;
        let connections = self.list_connections(project_id)?;
        Ok(StoryGraph { nodes, connections })
    }

    // ========================================================================
    // AI Provider Operations
    // ========================================================================

    pub fn create_ai_provider(&self, input: &CreateAiProvider) -> Result<AiProvider> {
        let mut conn = self.get_conn()?;
        let kind = input.provider_kind.parse::<ProviderKind>()?;

        let now = now_rfc3339();
        let new_provider = NewAiProvider {
            name: &input.name,
            provider_kind: kind.as_str(),
            base_url: input.base_url.as_deref(),
            api_key: input.api_key.as_deref(),
            enabled: input.enabled.unwrap_or(true),
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(ai_providers::table)
            .values(&new_provider)
            .execute(&mut conn)?;

        let id = Self::last_insert_id(&mut conn)?;
        self.fetch_ai_provider(&mut conn, id)
    }

    fn fetch_ai_provider(&self, conn: &mut DbConn, id: i32) -> Result<AiProvider> {
        ai_providers::table
            .filter(ai_providers::id.eq(id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("Provider {} does not exist", id)))
    }

    pub fn get_ai_provider(&self, id: i32) -> Result<AiProvider> {
        let mut conn = self.get_conn()?;
        self.fetch_ai_provider(&mut conn, id)
    }

    pub fn list_ai_providers(&self) -> Result<Vec<AiProvider>> {
        let mut conn = self.get_conn()?;
        let rows = ai_providers::table
            .order(ai_providers::name.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    pub fn update_ai_provider(&self, id: i32, changes: &AiProviderChanges) -> Result<AiProvider> {
        let mut conn = self.get_conn()?;
        self.fetch_ai_provider(&mut conn, id)?;

        let kind = match &changes.provider_kind {
            Some(k) => Some(k.parse::<ProviderKind>()?),
            None => None,
        };

        let now = now_rfc3339();
        diesel::update(ai_providers::table.filter(ai_providers::id.eq(id)))
            .set((
                changes.name.as_deref().map(|v| ai_providers::name.eq(v)),
                kind.map(|k| ai_providers::provider_kind.eq(k.as_str())),
                changes
                    .base_url
                    .as_deref()
                    .map(|v| ai_providers::base_url.eq(v)),
                changes
                    .api_key
                    .as_deref()
                    .map(|v| ai_providers::api_key.eq(v)),
                changes.enabled.map(|v| ai_providers::enabled.eq(v)),
                ai_providers::updated_at.eq(&now),
            ))
            .execute(&mut conn)?;

        self.fetch_ai_provider(&mut conn, id)
    }

    pub fn delete_ai_provider(&self, id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let n = diesel::delete(ai_providers::table.filter(ai_providers::id.eq(id)))
            .execute(&mut conn)?;
        if n == 0 {
            return Err(DbError::NotFound(format!("Provider {} does not exist", id)));
        }
        Ok(())
    }
}
