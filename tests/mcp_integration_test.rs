//! MCP Server Integration Tests
//!
//! These tests spawn the server binary and talk JSON-RPC to it over stdio,
//! using the in-process memory backend so no Mem0 account is needed.

#![allow(deprecated)] // Allow deprecated cargo_bin for now

use assert_cmd::cargo::CommandCargoExt;
use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

/// MCP Test Client that communicates with the server via stdio
struct McpTestClient {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    request_id: i64,
    _cwd: TempDir,
}

impl McpTestClient {
    /// Spawn a new MCP server and connect to it
    fn spawn() -> Result<Self, Box<dyn std::error::Error>> {
        // Run from an empty directory so no stray .env is picked up.
        let cwd = TempDir::new()?;
        let mut child = Command::cargo_bin("mem0-mcp")?
            .current_dir(cwd.path())
            .arg("--transport")
            .arg("stdio")
            .arg("--backend")
            .arg("memory")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child.stdin.take().expect("Failed to get stdin");
        let stdout = BufReader::new(child.stdout.take().expect("Failed to get stdout"));

        Ok(Self {
            child,
            stdin,
            stdout,
            request_id: 0,
            _cwd: cwd,
        })
    }

    fn send_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error>> {
        writeln!(self.stdin, "{}", line)?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Read the next line that carries a response, skipping notifications.
    fn read_response(&mut self) -> Result<Value, Box<dyn std::error::Error>> {
        loop {
            let mut line = String::new();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err("server closed stdout".into());
            }
            let message: Value = serde_json::from_str(&line)?;
            if message.get("method").is_none() {
                return Ok(message);
            }
        }
    }

    /// Send a JSON-RPC request and get the response
    fn request(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<Value, Box<dyn std::error::Error>> {
        self.request_id += 1;
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.request_id,
            "method": method,
            "params": params
        });

        self.send_line(&serde_json::to_string(&request)?)?;
        self.read_response()
    }

    fn initialize(&mut self) -> Result<Value, Box<dyn std::error::Error>> {
        self.request(
            "initialize",
            json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "1.0.0" }
            }),
        )
    }

    fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<Value, Box<dyn std::error::Error>> {
        self.request(
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        )
    }
}

impl Drop for McpTestClient {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

#[test]
fn test_binary_help() {
    AssertCommand::cargo_bin("mem0-mcp")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MCP server"))
        .stdout(predicate::str::contains("--backend"));
}

#[test]
fn test_binary_version() {
    AssertCommand::cargo_bin("mem0-mcp")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mem0-mcp"));
}

#[test]
fn test_missing_api_key_is_fatal() {
    let cwd = TempDir::new().unwrap();
    AssertCommand::cargo_bin("mem0-mcp")
        .unwrap()
        .current_dir(cwd.path())
        .env_remove("MEM0_API_KEY")
        .args(["--backend", "mem0", "--port", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("MEM0_API_KEY"));
}

#[test]
fn test_mcp_initialize() {
    let mut client = McpTestClient::spawn().expect("Failed to spawn MCP server");

    let response = client.initialize().expect("Failed to initialize");
    let result = &response["result"];
    assert_eq!(result["protocolVersion"], "2025-03-26");
    assert_eq!(result["serverInfo"]["name"], "mem0-mcp");
    assert!(result["capabilities"]["tools"].is_object());
}

#[test]
fn test_mcp_list_tools() {
    let mut client = McpTestClient::spawn().expect("Failed to spawn MCP server");

    client.initialize().expect("Failed to initialize");
    let response = client
        .request("tools/list", json!({}))
        .expect("Failed to list tools");

    let tools = response["result"]["tools"]
        .as_array()
        .expect("tools should be array");
    let tool_names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(tool_names, vec!["add-memory", "search-memories"]);
}

#[test]
fn test_mcp_store_then_search() {
    let mut client = McpTestClient::spawn().expect("Failed to spawn MCP server");
    client.initialize().expect("Failed to initialize");

    let response = client
        .call_tool("add-memory", json!({ "content": "I like tea", "userId": "u1" }))
        .expect("Failed to call add-memory");
    assert_eq!(
        response["result"]["content"][0]["text"],
        "Memory added successfully"
    );

    let response = client
        .call_tool("search-memories", json!({ "query": "tea", "userId": "u1" }))
        .expect("Failed to call search-memories");
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("Expected text");
    assert!(text.starts_with("I like tea\nrelevance: "));
}

#[test]
fn test_mcp_unknown_tool() {
    let mut client = McpTestClient::spawn().expect("Failed to spawn MCP server");

    client.initialize().expect("Failed to initialize");
    let response = client
        .call_tool("delete-memory", json!({}))
        .expect("Failed to call tool");

    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(
        response["result"]["content"][0]["text"],
        "Unknown tool: delete-memory"
    );

    // The server keeps serving afterwards.
    let response = client.request("ping", json!({})).expect("Failed to ping");
    assert_eq!(response["result"], json!({}));
}

#[test]
fn test_mcp_malformed_line() {
    let mut client = McpTestClient::spawn().expect("Failed to spawn MCP server");

    client.send_line("{not json").expect("Failed to write");
    let response = client.read_response().expect("Failed to read");
    assert_eq!(response["error"]["code"], -32700);

    let response = client.initialize().expect("Failed to initialize");
    assert!(response.get("result").is_some());
}
