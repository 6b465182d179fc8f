//! MCP test server binary for integration tests
//!
//! Stands in for the interpreter: integration tests configure its path as
//! the Python or Node command, so it is launched as
//! `mcp_test_server <script>`. The script's file stem selects a behaviour:
//!
//! - `malformed` -- answers `initialize` with a result missing `serverInfo`
//! - `silent`    -- never answers anything
//! - `outdated`  -- answers `initialize` with an unsupported protocol version
//! - `crash`     -- exits as soon as a `tools/call` arrives
//! - anything else -- a well-behaved server
//!
//! The well-behaved server lists two tools over two pages: `echo` (returns
//! its `text` argument unchanged) and `explode` (always reports `isError`).
//! `ping` is answered; other methods get `-32601`.

use std::io::{self, BufRead, Write};
use std::path::Path;

use serde_json::{json, Value};

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Normal,
    Malformed,
    Silent,
    Outdated,
    Crash,
}

fn mode_from_args() -> Mode {
    let stem = std::env::args()
        .nth(1)
        .and_then(|arg| {
            Path::new(&arg)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_default();
    match stem.as_str() {
        "malformed" => Mode::Malformed,
        "silent" => Mode::Silent,
        "outdated" => Mode::Outdated,
        "crash" => Mode::Crash,
        _ => Mode::Normal,
    }
}

fn main() {
    let mode = mode_from_args();
    eprintln!("mcp_test_server: starting");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let trimmed = line.trim();
        if trimmed.is_empty() || mode == Mode::Silent {
            continue;
        }

        let Ok(request) = serde_json::from_str::<Value>(trimmed) else {
            respond(&mut out, &make_error(&Value::Null, -32700, "Parse error"));
            continue;
        };

        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let Some(id) = request.get("id").cloned() else {
            // notification
            continue;
        };

        let response = match method {
            "initialize" => handle_initialize(&id, mode),
            "tools/list" => handle_tools_list(&id, &request),
            "tools/call" if mode == Mode::Crash => std::process::exit(3),
            "tools/call" => handle_tools_call(&id, &request),
            "ping" => make_result(&id, json!({})),
            _ => make_error(&id, -32601, &format!("Method not found: {}", method)),
        };

        if !respond(&mut out, &response) {
            break;
        }
    }
}

fn respond(out: &mut impl Write, response: &Value) -> bool {
    writeln!(out, "{}", response).is_ok() && out.flush().is_ok()
}

fn handle_initialize(id: &Value, mode: Mode) -> Value {
    match mode {
        Mode::Malformed => make_result(id, json!({ "protocolVersion": "2025-06-18" })),
        Mode::Outdated => make_result(
            id,
            json!({
                "protocolVersion": "1999-01-01",
                "capabilities": {},
                "serverInfo": { "name": "mcp-test-server", "version": "0.1.0" }
            }),
        ),
        _ => make_result(
            id,
            json!({
                "protocolVersion": "2025-06-18",
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "mcp-test-server", "version": "0.1.0" }
            }),
        ),
    }
}

fn handle_tools_list(id: &Value, request: &Value) -> Value {
    let cursor = request
        .get("params")
        .and_then(|p| p.get("cursor"))
        .and_then(|c| c.as_str());

    match cursor {
        None => make_result(
            id,
            json!({
                "tools": [{
                    "name": "echo",
                    "description": "returns input",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "text": { "type": "string" } },
                        "required": ["text"]
                    }
                }],
                "nextCursor": "page-2"
            }),
        ),
        Some(_) => make_result(
            id,
            json!({
                "tools": [{
                    "name": "explode",
                    "description": "always fails",
                    "inputSchema": { "type": "object", "properties": {} }
                }]
            }),
        ),
    }
}

fn handle_tools_call(id: &Value, request: &Value) -> Value {
    let params = request.get("params").unwrap_or(&Value::Null);
    let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");

    match tool_name {
        "echo" => {
            let text = params
                .get("arguments")
                .and_then(|a| a.get("text"))
                .and_then(|t| t.as_str())
                .unwrap_or("");
            make_result(id, json!({ "content": [{ "type": "text", "text": text }] }))
        }
        "explode" => make_result(
            id,
            json!({
                "content": [{ "type": "text", "text": "kaboom" }],
                "isError": true
            }),
        ),
        other => make_error(id, -32602, &format!("Unknown tool: {}", other)),
    }
}

fn make_result(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn make_error(id: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}
