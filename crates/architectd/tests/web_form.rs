//! Web form end to end: real listener, scripted model, scripted compiler.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use architect_core::fakes::ScriptedBackend;
use architect_core::{Architect, ArchitectConfig, ArchitectError, ImageFormat, SequentialNames};
use architectd::{router, AppState};
use tempfile::TempDir;

const FAKE_COMPILER: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then echo "10.9.1"; exit 0; fi
in=""; out=""; bg=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    -b) bg="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if grep -q BROKEN "$in"; then
  printf 'Error: Parse error on line 2:\nBROKEN\n^' >&2
  exit 1
fi
cp "$in" "$out"
echo "$bg" > "$(dirname "$out")/background.log"
"#;

struct Server {
    base: String,
    dir: TempDir,
    http: reqwest::Client,
}

impl Server {
    async fn start(backend: ScriptedBackend) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let compiler = dir.path().join("fake-mmdc");
        std::fs::write(&compiler, FAKE_COMPILER).unwrap();
        std::fs::set_permissions(&compiler, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = ArchitectConfig::default();
        config.compiler.binary = compiler.to_string_lossy().into_owned();
        config.compiler.background = Some("transparent".to_string());
        config.compiler.keep_transient = false;
        config.compiler.work_dir = None;
        config.output_dir = dir.path().join("output");
        config.format = ImageFormat::Svg;
        config.ollama.default_model = "llama3".to_string();

        let architect =
            Architect::with_backend(config, backend, Arc::new(SequentialNames::new()));
        architect.ensure_renderer().await.unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::new(AppState::new(architect)));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            dir,
            http: reqwest::Client::new(),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .unwrap()
    }

    async fn post(&self, path: &str, form: &[(&str, &str)]) -> (u16, String) {
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .form(form)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }
}

#[tokio::test]
async fn test_index_without_catalog_offers_manual_model() {
    let server = Server::start(ScriptedBackend::new()).await;
    let response = server.get("/").await;
    assert_eq!(response.status().as_u16(), 200);
    let html = response.text().await.unwrap();
    assert!(html.contains("name=\"custom_model\" value=\"llama3\""));
    assert!(html.contains("action=\"/generate\""));
}

#[tokio::test]
async fn test_index_lists_catalog() {
    let server = Server::start(ScriptedBackend::new().with_models(&["mistral", "llama3"])).await;
    let html = server.get("/").await.text().await.unwrap();
    assert!(html.contains("<option value=\"llama3\" selected>llama3</option>"));
    assert!(html.contains("<option value=\"mistral\">mistral</option>"));
}

#[tokio::test]
async fn test_artifact_before_render_is_not_found() {
    let server = Server::start(ScriptedBackend::new()).await;
    assert_eq!(server.get("/artifact").await.status().as_u16(), 404);
}

#[tokio::test]
async fn test_generate_renders_transparent_svg() {
    let backend = ScriptedBackend::new()
        .with_models(&["llama3"])
        .with_reply(Ok("```mermaid\ngraph TD\nA[Web]B-->C\n```".to_string()));
    let server = Server::start(backend).await;

    let (status, html) = server
        .post(
            "/generate",
            &[("prompt", "a web flow"), ("model", "llama3"), ("custom_model", "")],
        )
        .await;
    assert_eq!(status, 200);
    assert!(html.contains("Diagram saved to"));
    assert!(html.contains("<textarea name=\"source\" rows=\"16\">graph TD\nA[Web]\nB--&gt;C</textarea>"));
    assert!(html.contains("<img src=\"/artifact\""));

    let response = server.get("/artifact").await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()[reqwest::header::CONTENT_TYPE],
        "image/svg+xml"
    );
    assert_eq!(response.text().await.unwrap(), "graph TD\nA[Web]\nB-->C");

    let bg = std::fs::read_to_string(server.root().join("output/background.log")).unwrap();
    assert_eq!(bg.trim(), "transparent");
}

#[tokio::test]
async fn test_render_failure_shows_diagnostics_then_edit_fixes_it() {
    let backend = ScriptedBackend::new().with_reply(Ok("graph TD\nBROKEN".to_string()));
    let server = Server::start(backend).await;

    let (status, html) = server
        .post("/generate", &[("prompt", "broken"), ("custom_model", "phi3")])
        .await;
    assert_eq!(status, 422);
    assert!(html.contains("<pre class=\"diag\">Error: Parse error on line 2:\nBROKEN\n^</pre>"));
    assert_eq!(server.get("/artifact").await.status().as_u16(), 404);

    let (status, html) = server
        .post("/render", &[("source", "graph TD\nFixed-->Done")])
        .await;
    assert_eq!(status, 200);
    assert!(html.contains("Diagram saved to"));
    let body = server.get("/artifact").await.text().await.unwrap();
    assert_eq!(body, "graph TD\nFixed-->Done");
}

#[tokio::test]
async fn test_failed_update_keeps_serving_last_diagram() {
    let backend = ScriptedBackend::new().with_reply(Ok("graph TD\nA-->B".to_string()));
    let server = Server::start(backend).await;

    let (status, _) = server
        .post("/generate", &[("prompt", "flow"), ("custom_model", "llama3")])
        .await;
    assert_eq!(status, 200);

    let (status, html) = server
        .post("/render", &[("source", "graph TD\nBROKEN")])
        .await;
    assert_eq!(status, 422);
    assert!(html.contains("<pre class=\"diag\">Error: Parse error on line 2:"));

    let response = server.get("/artifact").await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "graph TD\nA-->B");
    assert!(server.root().join("output/chart_0.svg").exists());
}

#[tokio::test]
async fn test_generate_rejects_blank_prompt() {
    let server = Server::start(ScriptedBackend::new()).await;
    let (status, html) = server.post("/generate", &[("prompt", "   ")]).await;
    assert_eq!(status, 400);
    assert!(html.contains("Enter a description first."));
}

#[tokio::test]
async fn test_generation_failure_is_bad_gateway() {
    let backend = ScriptedBackend::new().with_reply(Err(ArchitectError::GenerationFailure(
        "Ollama returned 404 Not Found: model \"phi3\" not found".to_string(),
    )));
    let server = Server::start(backend).await;

    let (status, html) = server.post("/generate", &[("prompt", "x")]).await;
    assert_eq!(status, 502);
    assert!(html.contains("model &quot;phi3&quot; not found"));
}

#[tokio::test]
async fn test_render_empty_source_is_bad_request() {
    let server = Server::start(ScriptedBackend::new()).await;
    let (status, _) = server.post("/render", &[("source", "```mermaid\n```")]).await;
    assert_eq!(status, 400);
}
