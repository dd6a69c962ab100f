//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Form, State, rejection::FormRejection},
    response::Html,
    routing::get,
};
use serde::Deserialize;

use super::page::{PageView, render_page};
use crate::service::LauncherService;

#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub prompt: String,
}

async fn show_page(State(service): State<Arc<LauncherService>>) -> Html<String> {
    let status = service.status().await;
    Html(render_page(&PageView {
        status: Some(&status),
        ..Default::default()
    }))
}

async fn submit_task(
    State(service): State<Arc<LauncherService>>,
    form: Result<Form<SubmitForm>, FormRejection>,
) -> Html<String> {
    // A body we cannot decode carries no usable prompt; treat it as empty.
    let prompt = match form {
        Ok(Form(form)) => form.prompt,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable submission body");
            String::new()
        }
    };

    let submission = service.submit(&prompt).await;
    let status = service.status().await;
    Html(render_page(&PageView {
        status: Some(&status),
        prompt: &submission.prompt,
        result: Some(&submission.result),
    }))
}

pub fn routes(service: Arc<LauncherService>) -> Router {
    Router::new()
        .route("/", get(show_page).post(submit_task))
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::LauncherConfig;

    async fn response_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_form(body: &'static str) -> Request<Body> {
        Request::post("/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    fn service_in(dir: &std::path::Path) -> Arc<LauncherService> {
        Arc::new(LauncherService::new(LauncherConfig::new(dir)))
    }

    #[tokio::test]
    async fn get_renders_status_and_empty_form() {
        let dir = tempfile::tempdir().unwrap();
        let app = routes(service_in(dir.path()));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        let page = response_text(response).await;
        assert!(page.contains("Configuration pending:</strong> config not found"));
        assert!(page.contains("></textarea>"));
        assert!(!page.contains("Exit code"));
    }

    #[tokio::test]
    async fn blank_prompt_renders_exit_code_one() {
        let dir = tempfile::tempdir().unwrap();
        let app = routes(service_in(dir.path()));

        let response = app.oneshot(post_form("prompt=+++%0A")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let page = response_text(response).await;
        assert!(page.contains("<strong>Exit code:</strong> 1</p>"));
        assert!(page.contains("<pre>empty prompt</pre>"));
    }

    #[tokio::test]
    async fn missing_or_malformed_body_counts_as_blank() {
        let dir = tempfile::tempdir().unwrap();
        let app = routes(service_in(dir.path()));

        let response = app.clone().oneshot(post_form("other=1")).await.unwrap();
        assert!(response_text(response).await.contains("<pre>empty prompt</pre>"));

        let response = app
            .oneshot(
                Request::post("/")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prompt":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response_text(response).await.contains("<pre>empty prompt</pre>"));
    }

    #[tokio::test]
    async fn unknown_paths_and_methods_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = routes(service_in(dir.path()));

        let response = app
            .oneshot(Request::get("/api/tasks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = routes(service_in(dir.path()))
            .oneshot(Request::delete("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn submission_renders_escaped_worker_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.sh"),
            "printf '<b>%s</b>' \"$2\"\nexit 3\n",
        )
        .unwrap();
        let config = LauncherConfig::new(dir.path()).with_worker(
            crate::config::WorkerConfig::for_root(dir.path())
                .with_interpreter("/bin/sh")
                .with_entry_point("main.sh"),
        );
        let app = routes(Arc::new(LauncherService::new(config)));

        let response = app
            .oneshot(post_form("prompt=%3Cscript%3Ehi%3C%2Fscript%3E"))
            .await
            .unwrap();

        let page = response_text(response).await;
        assert!(page.contains("<strong>Exit code:</strong> 3</p>"));
        assert!(page.contains(
            "<pre>&lt;b&gt;&lt;script&gt;hi&lt;/script&gt;&lt;/b&gt;</pre>"
        ));
        assert!(page.contains("&lt;script&gt;hi&lt;/script&gt;</textarea>"));
        assert!(!page.contains("<script>"));
    }
}
