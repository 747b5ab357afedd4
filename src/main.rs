//! OpenWrite command-line interface
//!
//! Story graph backend for novel writing: projects, codex entities,
//! canvas nodes and typed connections over SQLite.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use openwrite::config::Config;
use openwrite::db::{
    CreateConnection, CreateNode, CreateProject, CreateTextBlock, Database,
};
use openwrite::export::{compile_manuscript, graph_to_dot, DotConfig};
use openwrite::{init, serve};

#[derive(Parser)]
#[command(name = "openwrite", version, about = "Story graph backend for novel writing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize openwrite in the current directory
    Init,

    /// Start the API server and canvas viewer
    Serve {
        /// Port to listen on (default from config, else 8040)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List all projects
    Projects,

    /// Manage a project
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// List a project's canvas nodes
    Nodes {
        /// Project ID
        project: i32,
        /// Filter by node type
        #[arg(short = 't', long = "type")]
        node_type: Option<String>,
    },

    /// Manage canvas nodes
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },

    /// Connect two nodes
    Connect {
        /// Source node ID
        from: i32,
        /// Target node ID
        to: i32,
        /// Connection type
        #[arg(short = 't', long = "type", default_value = "story_flow")]
        connection_type: String,
        /// Strength, 1-5
        #[arg(short, long, default_value_t = 1)]
        strength: i32,
    },

    /// List a node's text blocks in reading order
    Blocks {
        /// Node ID
        node: i32,
    },

    /// Manage text blocks
    Block {
        #[command(subcommand)]
        action: BlockAction,
    },

    /// Compile a work's chapters into a Markdown manuscript
    Compile {
        /// Work ID
        work: i32,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Export a project's story graph as Graphviz DOT
    Dot {
        /// Project ID
        project: i32,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
        /// Graph orientation: TB or LR
        #[arg(long, default_value = "TB")]
        rankdir: String,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a new project
    New {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a project and everything in it
    Rm { id: i32 },
}

#[derive(Subcommand)]
enum NodeAction {
    /// Add a node to a project's canvas
    Add {
        /// Project ID
        project: i32,
        /// Node type: story_element, character, location, lore, plot_thread
        node_type: String,
        /// Node title
        title: String,
        /// Story element subtype: act, chapter, scene, beat, plot_point
        #[arg(long)]
        subtype: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Canvas position
        #[arg(short = 'x', long, default_value_t = 0.0)]
        pos_x: f64,
        #[arg(short = 'y', long, default_value_t = 0.0)]
        pos_y: f64,
    },
    /// Delete a node (and its blocks and connections)
    Rm { id: i32 },
}

#[derive(Subcommand)]
enum BlockAction {
    /// Add a text block to a story-element node
    Add {
        /// Node ID
        node: i32,
        /// Prose content
        content: String,
        /// Position in reading order
        #[arg(short = 'i', long, default_value_t = 0)]
        order_index: i32,
    },
    /// Delete a text block
    Rm { id: i32 },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();

    match cli.command {
        Command::Init => init::init_workspace(),

        Command::Serve { port } => {
            let config = Config::load();
            let port = port.unwrap_or(config.server.port);
            serve::start_server(port).map_err(|e| e.to_string())
        }

        Command::Projects => {
            let db = open_db()?;
            let projects = db.list_projects().map_err(|e| e.to_string())?;
            if projects.is_empty() {
                println!("No projects yet. Create one with {}.", "openwrite project new".cyan());
                return Ok(());
            }
            println!("{:<5} {:<30} {}", "ID".bold(), "NAME".bold(), "CREATED".bold());
            for p in projects {
                println!("{:<5} {:<30} {}", p.id, p.name, p.created_at);
            }
            Ok(())
        }

        Command::Project { action } => {
            let db = open_db()?;
            match action {
                ProjectAction::New { name, description } => {
                    let project = db
                        .create_project(&CreateProject { name, description })
                        .map_err(|e| e.to_string())?;
                    println!(
                        "{} project {} ({})",
                        "Created".green(),
                        project.id,
                        project.name
                    );
                    Ok(())
                }
                ProjectAction::Rm { id } => {
                    db.delete_project(id).map_err(|e| e.to_string())?;
                    println!("{} project {}", "Deleted".green(), id);
                    Ok(())
                }
            }
        }

        Command::Nodes { project, node_type } => {
            let db = open_db()?;
            let filter = match node_type {
                Some(t) => Some(t.parse().map_err(|e: openwrite::types::ParseEnumError| e.to_string())?),
                None => None,
            };
            let nodes = db.list_nodes(project, filter).map_err(|e| e.to_string())?;
            println!(
                "{:<5} {:<14} {:<12} {:<30} {}",
                "ID".bold(),
                "TYPE".bold(),
                "SUBTYPE".bold(),
                "TITLE".bold(),
                "WORDS".bold()
            );
            for n in nodes {
                println!(
                    "{:<5} {:<14} {:<12} {:<30} {}",
                    n.id,
                    n.node_type,
                    n.subtype.as_deref().unwrap_or("-"),
                    n.title,
                    n.word_count
                );
            }
            Ok(())
        }

        Command::Node { action } => {
            let db = open_db()?;
            match action {
                NodeAction::Add {
                    project,
                    node_type,
                    title,
                    subtype,
                    description,
                    pos_x,
                    pos_y,
                } => {
                    let config = Config::load();
                    let visual_style = config
                        .default_color(&node_type)
                        .map(|color| serde_json::json!({ "color": color }));
                    let node = db
                        .create_node(
                            project,
                            &CreateNode {
                                node_type,
                                subtype,
                                title,
                                description,
                                position_x: pos_x,
                                position_y: pos_y,
                                visual_style,
                                metadata: None,
                            },
                        )
                        .map_err(|e| e.to_string())?;
                    println!("{} node {} ({})", "Created".green(), node.id, node.title);
                    Ok(())
                }
                NodeAction::Rm { id } => {
                    db.delete_node(id).map_err(|e| e.to_string())?;
                    println!("{} node {}", "Deleted".green(), id);
                    Ok(())
                }
            }
        }

        Command::Connect {
            from,
            to,
            connection_type,
            strength,
        } => {
            let db = open_db()?;
            // The connection lives in the source node's project
            let from_node = db.get_node(from).map_err(|e| e.to_string())?;
            let connection = db
                .create_connection(
                    from_node.project_id,
                    &CreateConnection {
                        from_node_id: from,
                        to_node_id: to,
                        connection_type,
                        strength: Some(strength),
                        visual_style: None,
                        metadata: None,
                    },
                )
                .map_err(|e| e.to_string())?;
            println!(
                "{} connection {}: {} -> {} ({})",
                "Created".green(),
                connection.id,
                from,
                to,
                connection.connection_type
            );
            Ok(())
        }

        Command::Blocks { node } => {
            let db = open_db()?;
            let blocks = db.list_text_blocks(node).map_err(|e| e.to_string())?;
            for b in blocks {
                println!(
                    "{} {} ({} words)",
                    format!("[{}]", b.order_index).bold(),
                    b.content,
                    b.word_count
                );
            }
            Ok(())
        }

        Command::Block { action } => {
            let db = open_db()?;
            match action {
                BlockAction::Add {
                    node,
                    content,
                    order_index,
                } => {
                    let block = db
                        .create_text_block(node, &CreateTextBlock { content, order_index })
                        .map_err(|e| e.to_string())?;
                    println!(
                        "{} block {} ({} words)",
                        "Created".green(),
                        block.id,
                        block.word_count
                    );
                    Ok(())
                }
                BlockAction::Rm { id } => {
                    db.delete_text_block(id).map_err(|e| e.to_string())?;
                    println!("{} block {}", "Deleted".green(), id);
                    Ok(())
                }
            }
        }

        Command::Compile { work, output } => {
            let db = open_db()?;
            let config = Config::load();
            let manuscript =
                compile_manuscript(&db, work, config.export.include_toc).map_err(|e| e.to_string())?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &manuscript.markdown)
                        .map_err(|e| format!("Could not write {}: {}", path, e))?;
                    println!(
                        "{} {} ({} words)",
                        "Wrote".green(),
                        path,
                        manuscript.total_words
                    );
                }
                None => print!("{}", manuscript.markdown),
            }
            Ok(())
        }

        Command::Dot {
            project,
            output,
            rankdir,
        } => {
            let db = open_db()?;
            let proj = db.get_project(project).map_err(|e| e.to_string())?;
            let graph = db.get_story_graph(project).map_err(|e| e.to_string())?;
            let dot = graph_to_dot(
                &graph,
                &DotConfig {
                    title: Some(proj.name),
                    show_ids: true,
                    rankdir,
                },
            );
            match output {
                Some(path) => {
                    std::fs::write(&path, &dot)
                        .map_err(|e| format!("Could not write {}: {}", path, e))?;
                    println!("{} {}", "Wrote".green(), path);
                }
                None => print!("{}", dot),
            }
            Ok(())
        }

        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "openwrite", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn open_db() -> Result<Database, String> {
    Database::open().map_err(|e| e.to_string())
}
