use anyhow::Context as _;
use serde_json::{Value, json};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

pub use swagger_mcp_test_support::MockApi;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// The server binary with a clean environment for config discovery.
pub fn server_command() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_swagger-mcp-server"));
    cmd.env_remove("OPEN_API_URL")
        .env_remove("OPEN_API_BASE_URL")
        .env_remove("SWAGGER_MCP_CONFIG")
        .env_remove("RUST_LOG")
        .arg("--log-level")
        .arg("warn");
    cmd
}

/// Minimal MCP client speaking newline-delimited JSON-RPC over the server's stdio.
pub struct McpStdioSession {
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl McpStdioSession {
    pub async fn start(spec: &str) -> anyhow::Result<Self> {
        let mut cmd = server_command();
        cmd.env("OPEN_API_URL", spec);
        Self::spawn(cmd).await
    }

    pub async fn spawn(mut cmd: Command) -> anyhow::Result<Self> {
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("spawn swagger-mcp-server")?;

        let stdin = child.stdin.take().context("missing child stdin")?;
        let stdout = child.stdout.take().context("missing child stdout")?;

        let mut session = Self {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let init = session
            .request(
                0,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "swagger-mcp-integration-tests", "version": "0" }
                }),
            )
            .await?;
        anyhow::ensure!(init.get("result").is_some(), "initialize failed: {init}");

        session
            .send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await?;

        Ok(session)
    }

    pub async fn request(&mut self, id: u64, method: &str, params: Value) -> anyhow::Result<Value> {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
        .await?;

        tokio::time::timeout(RESPONSE_TIMEOUT, self.read_response(id))
            .await
            .with_context(|| format!("timeout waiting for response to {method}"))?
    }

    /// `tools/call` and return the `result` object.
    pub async fn call_tool(
        &mut self,
        id: u64,
        name: &str,
        arguments: Value,
    ) -> anyhow::Result<Value> {
        let msg = self
            .request(id, "tools/call", json!({"name": name, "arguments": arguments}))
            .await?;
        msg.get("result")
            .cloned()
            .with_context(|| format!("tools/call {name} returned no result: {msg}"))
    }

    async fn send(&mut self, msg: &Value) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(msg)?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .context("write to server stdin")?;
        self.stdin.flush().await.context("flush server stdin")?;
        Ok(())
    }

    async fn read_response(&mut self, id: u64) -> anyhow::Result<Value> {
        while let Some(line) = self.stdout.next_line().await.context("read server stdout")? {
            if line.trim().is_empty() {
                continue;
            }
            let msg: Value = serde_json::from_str(&line)
                .with_context(|| format!("server wrote non-JSON line: {line}"))?;
            if msg.get("id") == Some(&json!(id)) {
                return Ok(msg);
            }
        }
        anyhow::bail!("server closed stdout before answering request {id}")
    }
}

/// Text of the first content block of a tool result.
pub fn result_text(result: &Value) -> anyhow::Result<&str> {
    result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("text"))
        .and_then(Value::as_str)
        .context("tool result missing content[0].text")
}

/// Tool result text parsed as JSON.
pub fn result_json(result: &Value) -> anyhow::Result<Value> {
    serde_json::from_str(result_text(result)?).context("tool result text is not JSON")
}

pub fn is_error(result: &Value) -> bool {
    result.get("isError").and_then(Value::as_bool).unwrap_or(false)
}

pub const PETSTORE_YAML: &str = r"
openapi: 3.0.3
info:
  title: Petstore
  version: 1.0.0
servers:
  - url: /v3
paths:
  /pets:
    get:
      summary: List pets
      operationId: listPets
      parameters:
        - $ref: '#/components/parameters/Limit'
      responses:
        '200':
          description: OK
    post:
      summary: Add a new pet
      operationId: addPet
      requestBody:
        required: true
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Pet'
      responses:
        '201':
          description: Created
  /pets/{petId}:
    get:
      summary: Get Pet by ID
      operationId: getPet
      parameters:
        - name: petId
          in: path
          required: true
          schema:
            type: integer
      responses:
        '200':
          description: OK
    options:
      summary: Preflight
      responses:
        '204':
          description: No Content
components:
  parameters:
    Limit:
      name: limit
      in: query
      schema:
        type: integer
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        name:
          type: string
";

pub fn write_spec(dir: &tempfile::TempDir, name: &str, contents: &str) -> anyhow::Result<String> {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(path.to_string_lossy().into_owned())
}
