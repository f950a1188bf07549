mod common;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use common::{
    McpStdioSession, MockApi, PETSTORE_YAML, is_error, result_json, result_text, server_command,
    write_spec,
};
use serde_json::{Value, json};

#[tokio::test]
async fn lists_the_three_tools() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(&dir, "openapi.yaml", PETSTORE_YAML)?;
    let mut session = McpStdioSession::start(&spec).await?;

    let msg = session.request(1, "tools/list", json!({})).await?;
    let mut names: Vec<String> = msg["result"]["tools"]
        .as_array()
        .map(|tools| {
            tools
                .iter()
                .filter_map(|t| t["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    assert_eq!(names, vec!["call_api", "find_operations", "list_operations"]);

    Ok(())
}

#[tokio::test]
async fn list_operations_from_a_local_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(&dir, "openapi.yaml", PETSTORE_YAML)?;
    let mut session = McpStdioSession::start(&spec).await?;

    let result = session.call_tool(1, "list_operations", json!({})).await?;
    assert!(!is_error(&result));
    assert_eq!(
        result_json(&result)?,
        json!([
            { "Function": "List pets" },
            { "Function": "Add a new pet" },
            { "Function": "Get Pet by ID" }
        ])
    );

    let result = session
        .call_tool(2, "list_operations", json!({ "verbose": true }))
        .await?;
    let ops = result_json(&result)?;
    let ops = ops.as_array().cloned().unwrap_or_default();
    assert_eq!(ops.len(), 3);

    // A file location has no origin, so URLs keep the relative server base.
    assert_eq!(ops[0]["url"], "/v3/pets");
    assert_eq!(ops[0]["method"], "GET");
    assert_eq!(ops[0]["parameters"][0]["name"], "limit");
    assert_eq!(
        ops[1]["requestBody"],
        json!({
            "required": true,
            "content": {
                "application/json": {
                    "type": "object",
                    "required": ["name"],
                    "properties": { "name": { "type": "string" } }
                }
            }
        })
    );
    assert!(ops[1].get("parameters").is_none());

    Ok(())
}

#[tokio::test]
async fn spec_fetched_over_http_composes_urls_from_its_origin() -> anyhow::Result<()> {
    let api = MockApi::start(Router::new().route(
        "/specs/openapi.yaml",
        get(|| async { PETSTORE_YAML }),
    ))
    .await?;
    let mut session = McpStdioSession::start(&api.url("/specs/openapi.yaml")).await?;

    let result = session
        .call_tool(1, "find_operations", json!({ "summary": "pet by id" }))
        .await?;
    let op = result_json(&result)?;
    assert_eq!(op["url"], format!("{}/v3/pets/{{petId}}", api.base_url()));
    assert_eq!(op["method"], "GET");
    assert_eq!(op["summary"], "Get Pet by ID");
    assert_eq!(op["operationId"], "getPet");

    let result = session
        .call_tool(2, "find_operations", json!({ "summary": "no such operation" }))
        .await?;
    assert!(!is_error(&result));
    assert_eq!(result_json(&result)?, Value::Null);

    Ok(())
}

#[tokio::test]
async fn call_api_returns_json_or_an_error_string() -> anyhow::Result<()> {
    let api = MockApi::start(
        Router::new()
            .route("/a", get(|| async { axum::Json(json!({"a": 1})) }))
            .route("/teapot", get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") })),
    )
    .await?;

    let dir = tempfile::tempdir()?;
    let spec = write_spec(&dir, "openapi.yaml", PETSTORE_YAML)?;
    let mut session = McpStdioSession::start(&spec).await?;

    let ok = session
        .call_tool(1, "call_api", json!({ "url": api.url("/a"), "method": "GET" }))
        .await?;
    assert!(!is_error(&ok));
    assert_eq!(result_json(&ok)?, json!({"a": 1}));

    let missing = session
        .call_tool(2, "call_api", json!({ "url": api.url("/missing"), "method": "GET" }))
        .await?;
    assert!(is_error(&missing));
    assert!(result_text(&missing)?.contains("404"));

    let teapot = session
        .call_tool(3, "call_api", json!({ "url": api.url("/teapot"), "method": "get" }))
        .await?;
    assert!(is_error(&teapot));
    assert!(result_text(&teapot)?.contains("418"));
    assert!(result_text(&teapot)?.contains("short and stout"));

    Ok(())
}

#[tokio::test]
async fn config_file_supplies_spec_and_base_url() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let spec = write_spec(&dir, "openapi.yaml", PETSTORE_YAML)?;
    let config = write_spec(
        &dir,
        "swagger-mcp.yaml",
        &format!("spec: '{spec}'\nbaseUrl: https://api.example.com/v9/\n"),
    )?;

    let mut cmd = server_command();
    cmd.arg("--config").arg(&config);
    let mut session = McpStdioSession::spawn(cmd).await?;

    let result = session
        .call_tool(1, "find_operations", json!({ "summary": "" }))
        .await?;
    assert_eq!(result_json(&result)?["url"], "https://api.example.com/v9/pets");

    Ok(())
}

#[tokio::test]
async fn missing_spec_location_exits_nonzero() -> anyhow::Result<()> {
    let output = server_command().output().await?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPEN_API_URL"), "{stderr}");
    assert!(output.stdout.is_empty());
    Ok(())
}

#[tokio::test]
async fn invalid_spec_exits_nonzero_before_serving() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    for (name, contents) in [
        ("not-openapi.yaml", "hello: world\n"),
        ("broken.yaml", "openapi: [unclosed\n"),
    ] {
        let spec = write_spec(&dir, name, contents)?;
        let output = server_command().env("OPEN_API_URL", &spec).output().await?;
        assert!(!output.status.success(), "{name}");
        assert!(output.stdout.is_empty(), "{name}");
    }

    let output = server_command()
        .env("OPEN_API_URL", dir.path().join("absent.yaml"))
        .output()
        .await?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("absent.yaml"), "{stderr}");

    Ok(())
}
