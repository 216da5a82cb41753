//! End-to-end conversion and invocation against a live HTTP endpoint.

use axum::Router;
use axum::extract::Request;
use axum::routing::any;
use openapi_mcp_converter::{ApiDocument, ConvertOptions, Converter, Invoker};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const PETSTORE: &str = r#"
openapi: "3.0.0"
info:
  title: Petstore
  version: "1.0"
paths:
  /pets:
    get:
      operationId: listPets
      summary: List all pets
      parameters:
        - name: limit
          in: query
          schema:
            type: integer
      responses:
        "200":
          description: A paged array of pets
    post:
      operationId: createPet
      summary: Create a pet
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              properties:
                name:
                  type: string
              required: [name]
      responses:
        "201":
          description: Created
  /pets/{petId}:
    delete:
      operationId: deletePet
      parameters:
        - name: petId
          in: path
          required: true
          schema:
            type: integer
      responses:
        "204":
          description: Deleted
"#;

async fn spawn_echo() -> (String, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    async fn echo(request: Request) -> axum::Json<Value> {
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        axum::Json(json!({
            "method": parts.method.as_str(),
            "uri": parts.uri.to_string(),
            "body": String::from_utf8_lossy(&bytes),
        }))
    }

    let app = Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo));
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });

    (format!("http://{addr}"), tx)
}

#[tokio::test]
async fn converted_tools_execute_against_a_live_server() {
    let doc = ApiDocument::from_bytes(PETSTORE.as_bytes()).unwrap();
    let tools = Converter::new(&doc, ConvertOptions::default())
        .convert()
        .unwrap();

    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["listPets", "createPet", "deletePet"]);

    // The document declares no servers, so every tool requires the address.
    for tool in &tools {
        let schema = tool.input_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("openapi|server_addr")), "{}", tool.name);
    }

    let (server, shutdown) = spawn_echo().await;
    let client = reqwest::Client::new();

    let create = Invoker::new(client.clone(), &tools[1], None);
    let args: Map<String, Value> = serde_json::from_value(json!({
        "openapi|server_addr": server,
        "body": {"name": "rex"},
    }))
    .unwrap();
    let outcome = create.invoke(&args).await.unwrap();
    assert_eq!(outcome.status, 200);
    let echoed: Value = serde_json::from_str(&outcome.body).unwrap();
    assert_eq!(echoed["method"], json!("POST"));
    assert_eq!(echoed["uri"], json!("/pets"));
    assert_eq!(echoed["body"], json!(r#"{"name":"rex"}"#));

    let delete = Invoker::new(client, &tools[2], None);
    let args: Map<String, Value> = serde_json::from_value(json!({
        "openapi|server_addr": server,
        "path|petId": 42,
    }))
    .unwrap();
    let outcome = delete.invoke(&args).await.unwrap();
    let echoed: Value = serde_json::from_str(&outcome.body).unwrap();
    assert_eq!(echoed["method"], json!("DELETE"));
    assert_eq!(echoed["uri"], json!("/pets/42"));

    assert!(outcome.to_text().starts_with("status code: 200\nresponse body: "));

    let _ = shutdown.send(());
}
