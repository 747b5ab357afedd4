//! OpenWrite - story graph backend for novel writing
//!
//! Projects, works, chapters, and a codex of characters, locations, plot
//! points and lore, plus a 2D canvas of typed story nodes and connections,
//! all stored in SQLite and exposed over a JSON API.
//!
//! # Data Model
//!
//! | Entity | Purpose |
//! |--------|---------|
//! | `Project` | Top-level container for a writing effort |
//! | `Work` | A book or manuscript within a project |
//! | `Chapter` | Ordered prose within a work |
//! | `GraphNode` | A canvas node: story element, character, location, lore, plot thread |
//! | `TextBlock` | Ordered prose attached to a story-element node |
//! | `GraphConnection` | A typed, weighted edge between two nodes |
//!
//! Codex entities (characters, locations, plot points, lore) belong to
//! exactly one project or one work.
//!
//! # Quick Start
//!
//! ```no_run
//! use openwrite::db::{CreateNode, CreateProject, Database};
//!
//! let db = Database::new(".openwrite/openwrite.db").unwrap();
//!
//! let project = db.create_project(&CreateProject {
//!     name: "My Novel".to_string(),
//!     description: None,
//! }).unwrap();
//!
//! let node = db.create_node(project.id, &CreateNode {
//!     node_type: "character".to_string(),
//!     subtype: None,
//!     title: "Maeve".to_string(),
//!     description: None,
//!     position_x: 120.0,
//!     position_y: 80.0,
//!     visual_style: None,
//!     metadata: None,
//! }).unwrap();
//!
//! let graph = db.get_story_graph(project.id).unwrap();
//! println!("Nodes: {}, Connections: {}", graph.nodes.len(), graph.connections.len());
//! # let _ = node;
//! ```

pub mod config;
pub mod db;
pub mod export;
pub mod init;
pub mod schema;
pub mod serve;
pub mod types;

pub use config::Config;
pub use db::{
    AiProvider, Chapter, Character, Database, DbError, GraphConnection, GraphNode, Location,
    LoreEntry, PlotPoint, Project, StoryGraph, TextBlock, Work, count_words,
};
pub use export::{compile_manuscript, graph_to_dot, DotConfig, Manuscript};
pub use types::{
    CharacterRole, ConnectionType, NodeType, ParseEnumError, PlotPointStatus, ProviderKind,
    StoryElementKind, WorkStatus, MAX_STRENGTH, MIN_STRENGTH,
};
