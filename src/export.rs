//! Export utilities for story graphs and manuscripts
//!
//! Provides Graphviz DOT export of the canvas graph and Markdown
//! manuscript compilation from a work's chapters.

use crate::db::{Database, Result, StoryGraph};
use std::fmt::Write;

/// Configuration for DOT export
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Title for the graph
    pub title: Option<String>,
    /// Include node IDs in labels
    pub show_ids: bool,
    /// Orientation: "TB" (top-bottom), "LR" (left-right)
    pub rankdir: String,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            title: None,
            show_ids: true,
            rankdir: "TB".to_string(),
        }
    }
}

/// Get the shape for a node type
fn node_shape(node_type: &str) -> &'static str {
    match node_type {
        "story_element" => "box",
        "character" => "ellipse",
        "location" => "house",
        "lore" => "note",
        "plot_thread" => "diamond",
        _ => "box",
    }
}

/// Get the fill color for a node type
fn node_color(node_type: &str) -> &'static str {
    match node_type {
        "story_element" => "#FFE4B5",  // Moccasin (warm yellow)
        "character" => "#E0FFFF",      // Light cyan
        "location" => "#90EE90",       // Light green
        "lore" => "#DDA0DD",           // Plum
        "plot_thread" => "#E6E6FA",    // Lavender
        _ => "#F5F5F5",                // White smoke
    }
}

/// Get the edge style based on connection type
fn edge_style(connection_type: &str) -> &'static str {
    match connection_type {
        "story_flow" => "bold",
        "thematic" => "dashed",
        "reference" => "dotted",
        _ => "solid",
    }
}

/// Get the edge color based on connection type
fn edge_color(connection_type: &str) -> &'static str {
    match connection_type {
        "story_flow" => "#228B22",     // Forest green
        "character_arc" => "#4169E1",  // Royal blue
        "setting" => "#2E8B57",        // Sea green
        "plot_thread" => "#FF4500",    // Orange red
        "thematic" => "#9932CC",       // Dark orchid
        _ => "#333333",                // Dark gray
    }
}

/// Escape a string for DOT labels
fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Truncate a string to at most max_len bytes, never splitting a character
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut cut = max_len - 3;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &s[..cut])
    }
}

/// Convert a story graph to DOT format
pub fn graph_to_dot(graph: &StoryGraph, config: &DotConfig) -> String {
    let mut dot = String::new();

    // Graph header
    writeln!(dot, "digraph StoryGraph {{").unwrap();
    writeln!(dot, "  rankdir={};", config.rankdir).unwrap();
    writeln!(dot, "  node [fontname=\"Arial\" fontsize=10];").unwrap();
    writeln!(dot, "  edge [fontname=\"Arial\" fontsize=9];").unwrap();

    if let Some(title) = &config.title {
        writeln!(dot, "  label=\"{}\";", escape_dot(title)).unwrap();
        writeln!(dot, "  labelloc=t;").unwrap();
        writeln!(dot, "  fontsize=14;").unwrap();
    }
    writeln!(dot).unwrap();

    // Nodes
    for node in &graph.nodes {
        let mut label = String::new();

        if config.show_ids {
            write!(label, "[{}] ", node.id).unwrap();
        }

        label.push_str(&truncate(&node.title, 40));

        // Escape the user text before adding the \n separator, so DOT
        // sees a real line break
        let mut label = escape_dot(&label);
        if let Some(subtype) = &node.subtype {
            write!(label, "\\n({})", escape_dot(subtype)).unwrap();
        }

        writeln!(
            dot,
            "  {} [label=\"{}\" shape=\"{}\" fillcolor=\"{}\" style=\"filled\"];",
            node.id,
            label,
            node_shape(&node.node_type),
            node_color(&node.node_type)
        )
        .unwrap();
    }

    writeln!(dot).unwrap();

    // Connections; strength shows as line weight
    for connection in &graph.connections {
        let attrs = [
            format!("style=\"{}\"", edge_style(&connection.connection_type)),
            format!("color=\"{}\"", edge_color(&connection.connection_type)),
            format!("penwidth={}", connection.strength),
            format!(
                "label=\"{}\"",
                escape_dot(&connection.connection_type)
            ),
        ];

        writeln!(
            dot,
            "  {} -> {} [{}];",
            connection.from_node_id,
            connection.to_node_id,
            attrs.join(" ")
        )
        .unwrap();
    }

    writeln!(dot, "}}").unwrap();

    dot
}

/// A compiled manuscript: the Markdown text plus its total word count
#[derive(Debug, Clone)]
pub struct Manuscript {
    pub markdown: String,
    pub total_words: i32,
}

/// Compile a work's chapters into a single Markdown manuscript.
///
/// Chapters appear in order_index order (id breaks ties). Chapters
/// without prose still appear as headings so the outline survives.
pub fn compile_manuscript(db: &Database, work_id: i32, include_toc: bool) -> Result<Manuscript> {
    let work = db.get_work(work_id)?;
    let chapters = db.list_chapters(work_id)?;

    let mut markdown = String::new();
    writeln!(markdown, "# {}", work.title).unwrap();
    if let Some(desc) = &work.description {
        writeln!(markdown, "\n{}", desc).unwrap();
    }

    if include_toc && !chapters.is_empty() {
        writeln!(markdown, "\n## Contents\n").unwrap();
        for (i, chapter) in chapters.iter().enumerate() {
            writeln!(markdown, "{}. {}", i + 1, chapter.title).unwrap();
        }
    }

    let mut total_words = 0;
    for chapter in &chapters {
        writeln!(markdown, "\n## {}\n", chapter.title).unwrap();
        if let Some(content) = &chapter.content {
            writeln!(markdown, "{}", content).unwrap();
        }
        total_words += chapter.word_count;
    }

    writeln!(markdown, "\n---\n\n*{} words*", total_words).unwrap();

    Ok(Manuscript {
        markdown,
        total_words,
    })
}
