//! HTTP server for the story graph API and canvas viewer
//!
//! `openwrite serve` → starts server, serves the embedded viewer at `/`
//! and the JSON API under `/api/`.

use crate::config::Config;
use crate::db::{
    AiProviderChanges, ChapterChanges, CharacterChanges, CodexOwner, ConnectionChanges,
    CreateAiProvider, CreateChapter, CreateCharacter, CreateConnection, CreateLocation,
    CreateLoreEntry, CreateNode, CreatePlotPoint, CreateProject, CreateTextBlock, CreateWork,
    Database, DbError, LocationChanges, LoreEntryChanges, NodeChanges, PlotPointChanges,
    ProjectChanges, TextBlockChanges, WorkChanges,
};
use crate::types::NodeType;
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, Server};

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

// Embedded canvas viewer (single self-contained HTML file)
const CANVAS_VIEWER_HTML: &str = include_str!("viewer.html");

/// Start the story graph server
pub fn start_server(port: u16) -> std::io::Result<()> {
    let db = Database::open()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let config = Config::load();

    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let url = format!("http://localhost:{}", port);

    eprintln!("\n\x1b[1;32m✒ OpenWrite\x1b[0m");
    eprintln!("   Canvas viewer: {}", url);
    eprintln!("   API base:      {}/api", url);
    eprintln!("   Press Ctrl+C to stop\n");

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(&db, &config, request) {
            eprintln!("Error: {}", e);
        }
    }

    Ok(())
}

fn handle_request(db: &Database, config: &Config, mut request: Request) -> std::io::Result<()> {
    let url = request.url().to_string();
    let (path, query) = match url.split_once('?') {
        Some((p, q)) => (p, q),
        None => (url.as_str(), ""),
    };
    let method = request.method().clone();

    // Serve the canvas viewer UI
    if method == Method::Get && (path == "/" || path == "/canvas") {
        let response = Response::from_string(CANVAS_VIEWER_HTML)
            .with_header(Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..]).unwrap());
        return request.respond(response);
    }

    let mut body = String::new();
    if matches!(method, Method::Post | Method::Put) {
        if request.as_reader().read_to_string(&mut body).is_err() {
            let (status, json) = error_reply(400, "Failed to read body".to_string());
            return respond_json(request, status, json);
        }
    }

    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let (status, json) = route(db, config, &method, &segments, query, &body);
    respond_json(request, status, json)
}

fn respond_json(request: Request, status: u16, json: String) -> std::io::Result<()> {
    let response = Response::from_string(json)
        .with_status_code(status)
        .with_header(Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap());
    request.respond(response)
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| format!(r#"{{"ok":false,"data":null,"error":"{}"}}"#, e))
}

fn error_reply(status: u16, message: String) -> (u16, String) {
    let body = ApiResponse::<()> {
        ok: false,
        data: None,
        error: Some(message),
    };
    (status, to_json(&body))
}

/// Map a database result to the JSON envelope and an HTTP status
fn api_reply<T: Serialize>(result: crate::db::Result<T>) -> (u16, String) {
    match result {
        Ok(data) => (200, to_json(&ApiResponse::success(data))),
        Err(DbError::Validation(msg)) => error_reply(400, msg),
        Err(DbError::NotFound(msg)) => error_reply(404, msg),
        Err(e) => error_reply(500, format!("Database error: {}", e)),
    }
}

/// Parse the JSON body, then run the database operation
fn with_body<T, R, F>(body: &str, f: F) -> (u16, String)
where
    T: serde::de::DeserializeOwned,
    R: Serialize,
    F: FnOnce(T) -> crate::db::Result<R>,
{
    match serde_json::from_str::<T>(body) {
        Ok(input) => api_reply(f(input)),
        Err(e) => error_reply(400, format!("Invalid JSON: {}", e)),
    }
}

/// Bind a codex create body to the project named in the path. A body
/// with no owner inherits the path project; a body project_id that
/// names a different project is rejected.
fn scope_codex_owner(owner: &mut CodexOwner, project_id: i32) -> crate::db::Result<()> {
    match owner.project_id {
        Some(body_pid) if body_pid != project_id => Err(DbError::Validation(format!(
            "Body project_id {} does not match project {} in the path",
            body_pid, project_id
        ))),
        Some(_) => Ok(()),
        None => {
            if owner.work_id.is_none() {
                owner.project_id = Some(project_id);
            }
            Ok(())
        }
    }
}

fn not_found() -> (u16, String) {
    error_reply(404, "Not found".to_string())
}

fn method_not_allowed() -> (u16, String) {
    error_reply(405, "Method not allowed".to_string())
}

#[derive(serde::Deserialize, Default)]
struct NodeListQuery {
    #[serde(rename = "type")]
    node_type: Option<String>,
}

fn route(
    db: &Database,
    config: &Config,
    method: &Method,
    segments: &[&str],
    query: &str,
    body: &str,
) -> (u16, String) {
    // Integer path segments; anything else falls through to 404
    let id = |s: &str| s.parse::<i32>().ok();

    match segments {
        ["api", "projects"] => match method {
            Method::Get => api_reply(db.list_projects()),
            Method::Post => with_body(body, |input: CreateProject| db.create_project(&input)),
            _ => method_not_allowed(),
        },

        ["api", "projects", pid] => match id(pid) {
            Some(pid) => match method {
                Method::Get => api_reply(db.get_project(pid)),
                Method::Put => with_body(body, |c: ProjectChanges| db.update_project(pid, &c)),
                Method::Delete => api_reply(db.delete_project(pid).map(|_| true)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "projects", pid, "graph"] => match id(pid) {
            Some(pid) => match method {
                Method::Get => api_reply(db.get_story_graph(pid)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "projects", pid, "nodes"] => match id(pid) {
            Some(pid) => match method {
                Method::Get => {
                    let filter: NodeListQuery =
                        serde_urlencoded::from_str(query).unwrap_or_default();
                    let node_type = match filter.node_type.as_deref() {
                        Some(t) => match t.parse::<NodeType>() {
                            Ok(nt) => Some(nt),
                            Err(e) => return error_reply(400, e.to_string()),
                        },
                        None => None,
                    };
                    api_reply(db.list_nodes(pid, node_type))
                }
                Method::Post => with_body(body, |mut input: CreateNode| {
                    // Fill in the configured default color when the client
                    // did not style the node
                    if input.visual_style.is_none() {
                        if let Some(color) = config.default_color(&input.node_type) {
                            input.visual_style = Some(serde_json::json!({ "color": color }));
                        }
                    }
                    db.create_node(pid, &input)
                }),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "nodes", nid] => match id(nid) {
            Some(nid) => match method {
                Method::Get => api_reply(db.get_node(nid)),
                Method::Put => with_body(body, |c: NodeChanges| db.update_node(nid, &c)),
                Method::Delete => api_reply(db.delete_node(nid).map(|_| true)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "nodes", nid, "blocks"] => match id(nid) {
            Some(nid) => match method {
                Method::Get => api_reply(db.list_text_blocks(nid)),
                Method::Post => {
                    with_body(body, |input: CreateTextBlock| db.create_text_block(nid, &input))
                }
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "blocks", bid] => match id(bid) {
            Some(bid) => match method {
                Method::Get => api_reply(db.get_text_block(bid)),
                Method::Put => with_body(body, |c: TextBlockChanges| db.update_text_block(bid, &c)),
                Method::Delete => api_reply(db.delete_text_block(bid).map(|_| true)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "projects", pid, "connections"] => match id(pid) {
            Some(pid) => match method {
                Method::Get => api_reply(db.list_connections(pid)),
                Method::Post => {
                    with_body(body, |input: CreateConnection| db.create_connection(pid, &input))
                }
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "connections", cid] => match id(cid) {
            Some(cid) => match method {
                Method::Get => api_reply(db.get_connection(cid)),
                Method::Put => {
                    with_body(body, |c: ConnectionChanges| db.update_connection(cid, &c))
                }
                Method::Delete => api_reply(db.delete_connection(cid).map(|_| true)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "projects", pid, "works"] => match id(pid) {
            Some(pid) => match method {
                Method::Get => api_reply(db.list_works(pid)),
                Method::Post => with_body(body, |input: CreateWork| db.create_work(pid, &input)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "works", wid] => match id(wid) {
            Some(wid) => match method {
                Method::Get => api_reply(db.get_work(wid)),
                Method::Put => with_body(body, |c: WorkChanges| db.update_work(wid, &c)),
                Method::Delete => api_reply(db.delete_work(wid).map(|_| true)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "works", wid, "chapters"] => match id(wid) {
            Some(wid) => match method {
                Method::Get => api_reply(db.list_chapters(wid)),
                Method::Post => {
                    with_body(body, |input: CreateChapter| db.create_chapter(wid, &input))
                }
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "chapters", cid] => match id(cid) {
            Some(cid) => match method {
                Method::Get => api_reply(db.get_chapter(cid)),
                Method::Put => with_body(body, |c: ChapterChanges| db.update_chapter(cid, &c)),
                Method::Delete => api_reply(db.delete_chapter(cid).map(|_| true)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        // Codex collections scoped to a project
        ["api", "projects", pid, "characters"] => match id(pid) {
            Some(pid) => match method {
                Method::Get => api_reply(db.list_characters(pid)),
                Method::Post => with_body(body, |mut input: CreateCharacter| {
                    scope_codex_owner(&mut input.owner, pid)?;
                    db.create_character(&input)
                }),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "characters", cid] => match id(cid) {
            Some(cid) => match method {
                Method::Get => api_reply(db.get_character(cid)),
                Method::Put => with_body(body, |c: CharacterChanges| db.update_character(cid, &c)),
                Method::Delete => api_reply(db.delete_character(cid).map(|_| true)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "projects", pid, "locations"] => match id(pid) {
            Some(pid) => match method {
                Method::Get => api_reply(db.list_locations(pid)),
                Method::Post => with_body(body, |mut input: CreateLocation| {
                    scope_codex_owner(&mut input.owner, pid)?;
                    db.create_location(&input)
                }),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "locations", lid] => match id(lid) {
            Some(lid) => match method {
                Method::Get => api_reply(db.get_location(lid)),
                Method::Put => with_body(body, |c: LocationChanges| db.update_location(lid, &c)),
                Method::Delete => api_reply(db.delete_location(lid).map(|_| true)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "projects", pid, "plot-points"] => match id(pid) {
            Some(pid) => match method {
                Method::Get => api_reply(db.list_plot_points(pid)),
                Method::Post => with_body(body, |mut input: CreatePlotPoint| {
                    scope_codex_owner(&mut input.owner, pid)?;
                    db.create_plot_point(&input)
                }),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "plot-points", pid] => match id(pid) {
            Some(pid) => match method {
                Method::Get => api_reply(db.get_plot_point(pid)),
                Method::Put => with_body(body, |c: PlotPointChanges| db.update_plot_point(pid, &c)),
                Method::Delete => api_reply(db.delete_plot_point(pid).map(|_| true)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "projects", pid, "lore"] => match id(pid) {
            Some(pid) => match method {
                Method::Get => api_reply(db.list_lore_entries(pid)),
                Method::Post => with_body(body, |mut input: CreateLoreEntry| {
                    scope_codex_owner(&mut input.owner, pid)?;
                    db.create_lore_entry(&input)
                }),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "lore", lid] => match id(lid) {
            Some(lid) => match method {
                Method::Get => api_reply(db.get_lore_entry(lid)),
                Method::Put => with_body(body, |c: LoreEntryChanges| db.update_lore_entry(lid, &c)),
                Method::Delete => api_reply(db.delete_lore_entry(lid).map(|_| true)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        ["api", "providers"] => match method {
            Method::Get => api_reply(db.list_ai_providers()),
            Method::Post => with_body(body, |input: CreateAiProvider| db.create_ai_provider(&input)),
            _ => method_not_allowed(),
        },

        ["api", "providers", pid] => match id(pid) {
            Some(pid) => match method {
                Method::Get => api_reply(db.get_ai_provider(pid)),
                Method::Put => {
                    with_body(body, |c: AiProviderChanges| db.update_ai_provider(pid, &c))
                }
                Method::Delete => api_reply(db.delete_ai_provider(pid).map(|_| true)),
                _ => method_not_allowed(),
            },
            None => not_found(),
        },

        _ => not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // === ApiResponse Tests ===

    #[test]
    fn test_api_response_success() {
        let response: ApiResponse<String> = ApiResponse::success("hello".to_string());
        assert!(response.ok);
        assert_eq!(response.data, Some("hello".to_string()));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_serializes_to_json() {
        let response: ApiResponse<String> = ApiResponse::success("test".to_string());
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"ok\":true"));
        assert!(json.contains("\"data\":\"test\""));
        assert!(json.contains("\"error\":null"));
    }

    // === Viewer HTML Tests ===

    #[test]
    fn test_viewer_html_is_valid() {
        assert!(
            CANVAS_VIEWER_HTML.contains("<!DOCTYPE html>") || CANVAS_VIEWER_HTML.contains("<html")
        );
        assert!(CANVAS_VIEWER_HTML.contains("</html>"));
    }

    #[test]
    fn test_viewer_html_fetches_graph() {
        assert!(CANVAS_VIEWER_HTML.contains("/api/projects"));
    }

    // === Routing Tests ===
    //
    // route() is pure given a database, so the full surface is testable
    // without binding a socket.

    fn test_db() -> (TempDir, Database) {
        let dir = TempDir::new().expect("temp dir");
        let db = Database::open_at(dir.path().join("test.db")).expect("open db");
        (dir, db)
    }

    fn call(
        db: &Database,
        method: Method,
        path: &str,
        body: &str,
    ) -> (u16, serde_json::Value) {
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        let segments: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let (status, json) = route(db, &Config::default(), &method, &segments, query, body);
        (status, serde_json::from_str(&json).unwrap())
    }

    #[test]
    fn test_project_crud_over_routes() {
        let (_dir, db) = test_db();

        let (status, v) = call(&db, Method::Post, "/api/projects", r#"{"name":"Novel"}"#);
        assert_eq!(status, 200);
        assert_eq!(v["ok"], true);
        let pid = v["data"]["id"].as_i64().unwrap();

        let (status, v) = call(&db, Method::Get, &format!("/api/projects/{}", pid), "");
        assert_eq!(status, 200);
        assert_eq!(v["data"]["name"], "Novel");

        let (status, v) = call(
            &db,
            Method::Put,
            &format!("/api/projects/{}", pid),
            r#"{"description":"about things"}"#,
        );
        assert_eq!(status, 200);
        assert_eq!(v["data"]["name"], "Novel");
        assert_eq!(v["data"]["description"], "about things");

        let (status, _) = call(&db, Method::Delete, &format!("/api/projects/{}", pid), "");
        assert_eq!(status, 200);

        let (status, v) = call(&db, Method::Get, &format!("/api/projects/{}", pid), "");
        assert_eq!(status, 404);
        assert_eq!(v["ok"], false);
    }

    #[test]
    fn test_malformed_json_is_400() {
        let (_dir, db) = test_db();
        let (status, v) = call(&db, Method::Post, "/api/projects", "{not json");
        assert_eq!(status, 400);
        assert!(v["error"].as_str().unwrap().contains("Invalid JSON"));
    }

    #[test]
    fn test_unknown_route_is_404() {
        let (_dir, db) = test_db();
        let (status, _) = call(&db, Method::Get, "/api/nonsense", "");
        assert_eq!(status, 404);
        let (status, _) = call(&db, Method::Get, "/api/projects/abc", "");
        assert_eq!(status, 404);
    }

    #[test]
    fn test_wrong_method_is_405() {
        let (_dir, db) = test_db();
        let (status, _) = call(&db, Method::Delete, "/api/projects", "");
        assert_eq!(status, 405);
    }

    #[test]
    fn test_validation_failure_is_400() {
        let (_dir, db) = test_db();
        let (_, v) = call(&db, Method::Post, "/api/projects", r#"{"name":"P"}"#);
        let pid = v["data"]["id"].as_i64().unwrap();

        let (status, v) = call(
            &db,
            Method::Post,
            &format!("/api/projects/{}/nodes", pid),
            r#"{"node_type":"villain","title":"X"}"#,
        );
        assert_eq!(status, 400);
        assert!(v["error"].as_str().unwrap().contains("node type"));
    }

    #[test]
    fn test_node_type_filter() {
        let (_dir, db) = test_db();
        let (_, v) = call(&db, Method::Post, "/api/projects", r#"{"name":"P"}"#);
        let pid = v["data"]["id"].as_i64().unwrap();

        let nodes_path = format!("/api/projects/{}/nodes", pid);
        call(
            &db,
            Method::Post,
            &nodes_path,
            r#"{"node_type":"character","title":"Maeve"}"#,
        );
        call(
            &db,
            Method::Post,
            &nodes_path,
            r#"{"node_type":"location","title":"The Spire"}"#,
        );

        let (status, v) = call(&db, Method::Get, &format!("{}?type=character", nodes_path), "");
        assert_eq!(status, 200);
        assert_eq!(v["data"].as_array().unwrap().len(), 1);

        let (status, _) = call(&db, Method::Get, &format!("{}?type=junk", nodes_path), "");
        assert_eq!(status, 400);
    }

    #[test]
    fn test_graph_endpoint_returns_nodes_and_connections() {
        let (_dir, db) = test_db();
        let (_, v) = call(&db, Method::Post, "/api/projects", r#"{"name":"P"}"#);
        let pid = v["data"]["id"].as_i64().unwrap();
        let nodes_path = format!("/api/projects/{}/nodes", pid);

        let (_, a) = call(
            &db,
            Method::Post,
            &nodes_path,
            r#"{"node_type":"character","title":"A"}"#,
        );
        let (_, b) = call(
            &db,
            Method::Post,
            &nodes_path,
            r#"{"node_type":"plot_thread","title":"B"}"#,
        );

        let conn_body = format!(
            r#"{{"from_node_id":{},"to_node_id":{},"connection_type":"plot_thread","strength":4}}"#,
            a["data"]["id"], b["data"]["id"]
        );
        let (status, _) = call(
            &db,
            Method::Post,
            &format!("/api/projects/{}/connections", pid),
            &conn_body,
        );
        assert_eq!(status, 200);

        let (status, v) = call(&db, Method::Get, &format!("/api/projects/{}/graph", pid), "");
        assert_eq!(status, 200);
        assert_eq!(v["data"]["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(v["data"]["connections"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_default_color_applied_from_config() {
        let (_dir, db) = test_db();
        let toml = r##"
[canvas.default_colors]
character = "#E0FFFF"
"##;
        let config: Config = toml::from_str(toml).unwrap();

        let (_, v) = call(&db, Method::Post, "/api/projects", r#"{"name":"P"}"#);
        let pid = v["data"]["id"].as_i64().unwrap();

        let body = r#"{"node_type":"character","title":"Maeve"}"#;
        let path = format!("api/projects/{}/nodes", pid);
        let segs: Vec<&str> = path.split('/').collect();
        let (status, json) = route(&db, &config, &Method::Post, &segs, "", body);
        assert_eq!(status, 200);
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        let style = v["data"]["visual_style_json"].as_str().unwrap();
        assert!(style.contains("#E0FFFF"));
    }

    #[test]
    fn test_codex_create_inherits_path_project() {
        let (_dir, db) = test_db();
        let (_, v) = call(&db, Method::Post, "/api/projects", r#"{"name":"P"}"#);
        let pid = v["data"]["id"].as_i64().unwrap();

        // No owner in the body: the path project owns the row
        let (status, v) = call(
            &db,
            Method::Post,
            &format!("/api/projects/{}/characters", pid),
            r#"{"name":"Maeve"}"#,
        );
        assert_eq!(status, 200);
        assert_eq!(v["data"]["project_id"].as_i64().unwrap(), pid);

        let (status, v) = call(&db, Method::Get, &format!("/api/projects/{}/characters", pid), "");
        assert_eq!(status, 200);
        assert_eq!(v["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_codex_create_rejects_mismatched_project() {
        let (_dir, db) = test_db();
        let (_, v) = call(&db, Method::Post, "/api/projects", r#"{"name":"One"}"#);
        let p1 = v["data"]["id"].as_i64().unwrap();
        let (_, v) = call(&db, Method::Post, "/api/projects", r#"{"name":"Two"}"#);
        let p2 = v["data"]["id"].as_i64().unwrap();

        let body = format!(r#"{{"project_id":{},"name":"Stray"}}"#, p2);
        let (status, v) = call(
            &db,
            Method::Post,
            &format!("/api/projects/{}/characters", p1),
            &body,
        );
        assert_eq!(status, 400);
        assert!(v["error"].as_str().unwrap().contains("does not match"));

        // Neither project gained the row
        let (_, v) = call(&db, Method::Get, &format!("/api/projects/{}/characters", p1), "");
        assert_eq!(v["data"].as_array().unwrap().len(), 0);
        let (_, v) = call(&db, Method::Get, &format!("/api/projects/{}/characters", p2), "");
        assert_eq!(v["data"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_codex_create_on_missing_project_is_404() {
        let (_dir, db) = test_db();
        let (status, _) = call(
            &db,
            Method::Post,
            "/api/projects/99/lore",
            r#"{"title":"The Sundering"}"#,
        );
        assert_eq!(status, 404);
    }

    #[test]
    fn test_block_routes_roll_up_word_counts() {
        let (_dir, db) = test_db();
        let (_, v) = call(&db, Method::Post, "/api/projects", r#"{"name":"P"}"#);
        let pid = v["data"]["id"].as_i64().unwrap();

        let (_, node) = call(
            &db,
            Method::Post,
            &format!("/api/projects/{}/nodes", pid),
            r#"{"node_type":"story_element","subtype":"scene","title":"Opening"}"#,
        );
        let nid = node["data"]["id"].as_i64().unwrap();

        let (status, block) = call(
            &db,
            Method::Post,
            &format!("/api/nodes/{}/blocks", nid),
            r#"{"content":"five whole words right here","order_index":0}"#,
        );
        assert_eq!(status, 200);
        assert_eq!(block["data"]["word_count"], 5);

        let (_, node) = call(&db, Method::Get, &format!("/api/nodes/{}", nid), "");
        assert_eq!(node["data"]["word_count"], 5);
    }
}
