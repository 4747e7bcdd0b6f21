// Transport and HTTP failures mapped to classified errors, plus the headers every
// call carries.

#[cfg(test)]
mod test {

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::Router;
    use http::StatusCode;
    use httpmock::Method::{GET, POST, PUT};
    use httpmock::MockServer;
    use serde_json::{json, Value};

    use crate::auth::token::AccessToken;
    use crate::client::request::{FormData, RequestOptions};
    use crate::errors::ClientError;
    use crate::observability::diagnostics::DiagnosticsSink;
    use crate::tests::common::{
        build_client, build_client_with, spawn_axum, RecordingDiagnostics, ACCOUNT,
    };

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        // grab a free port and close it again
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = build_client(format!("http://{}", addr), Some(ACCOUNT));
        let mut events = client.auth_state().subscribe();

        let err = client
            .get::<Value>("/pools", RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::NetworkUnreachable { .. }), "{:?}", err);
        assert!(err.to_string().contains("Unable to connect"));
        assert!(!client.is_refreshing());
        assert!(events.try_recv().is_err(), "no refresh for transport failures");
    }

    #[tokio::test]
    async fn classifies_http_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/quotes");
                then.status(429);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/swaps");
                then.status(422)
                    .header("content-type", "application/json")
                    .json_body(json!({ "message": "slippage too high" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/pools");
                then.status(500);
            })
            .await;

        let client = build_client(server.base_url(), Some(ACCOUNT));

        let busy = client
            .get::<Value>("/quotes", RequestOptions::default())
            .await
            .unwrap_err();
        assert!(busy.is_busy(), "{:?}", busy);

        let api = client
            .post::<Value, _>("/swaps", &json!({ "amount": "1" }), RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            api,
            ClientError::ApiError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: "slippage too high".into()
            }
        );

        let generic = client
            .get::<Value>("/pools", RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(generic.to_string(), "HTTP 500 error");
    }

    #[tokio::test]
    async fn slow_response_is_server_busy() {
        let router = Router::new().route(
            "/pools",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "[]"
            }),
        );
        let (server, addr) = spawn_axum(router).await;
        let client = build_client_with(format!("http://{}", addr), None, Some(100), None);

        let err = client
            .get::<Value>("/pools", RequestOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_busy(), "{:?}", err);
        server.abort();
    }

    #[tokio::test]
    async fn kyc_write_failures_reach_diagnostics() {
        let server = MockServer::start_async().await;
        for (method, path) in [
            (POST, "/kyc/applications"),
            (PUT, "/kyc/applications/7"),
            (GET, "/kyc/applications/7"),
        ] {
            server
                .mock_async(|when, then| {
                    when.method(method).path(path);
                    then.status(400)
                        .header("content-type", "application/json")
                        .json_body(json!({ "message": "document unreadable" }));
                })
                .await;
        }

        let recorder = Arc::new(RecordingDiagnostics::default());
        let sink: Arc<dyn DiagnosticsSink> = recorder.clone();
        let client = build_client_with(server.base_url(), Some(ACCOUNT), None, Some(sink));

        let _ = client
            .post::<Value, _>("/kyc/applications", &json!({ "country": "DE" }), RequestOptions::default())
            .await;
        let _ = client
            .put::<Value, _>("/kyc/applications/7", &json!({ "status": "review" }), RequestOptions::default())
            .await;
        let _ = client
            .get::<Value>("/kyc/applications/7", RequestOptions::default())
            .await;

        let breadcrumbs = recorder.breadcrumbs.lock().unwrap();
        assert_eq!(breadcrumbs.len(), 2);
        assert_eq!(breadcrumbs[0].category, "kyc");
        assert_eq!(breadcrumbs[0].data["path"], "/kyc/applications");
        assert_eq!(breadcrumbs[1].data["method"], "PUT");
        let messages = recorder.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("document unreadable"));
    }

    #[tokio::test]
    async fn json_call_carries_tenant_auth_and_content_type() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/orders")
                    .query_param("chain", "1")
                    .header("x-tenant-domain", "app.example.com")
                    .header("authorization", "Bearer stored")
                    .header("content-type", "application/json")
                    .json_body(json!({ "pair": "ETH/USDC" }));
                then.status(201)
                    .header("content-type", "application/json")
                    .json_body(json!({ "id": 7 }));
            })
            .await;

        let client = build_client(server.base_url(), Some(ACCOUNT));
        client.auth_state().tokens.set(ACCOUNT, AccessToken::new("stored")).await;

        let created: Value = client
            .post(
                "/orders",
                &json!({ "pair": "ETH/USDC" }),
                RequestOptions::default().query("chain", "1"),
            )
            .await
            .unwrap();

        assert_eq!(created["id"], 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn form_upload_is_multipart() {
        let seen: Arc<Mutex<Vec<HeaderMap>>> = Arc::default();
        let router = Router::new().route(
            "/kyc/documents",
            post({
                let seen = seen.clone();
                move |headers: HeaderMap| {
                    let seen = seen.clone();
                    async move {
                        seen.lock().unwrap().push(headers);
                        (axum::http::StatusCode::CREATED, "")
                    }
                }
            }),
        );
        let (server, addr) = spawn_axum(router).await;
        let client = build_client(format!("http://{}", addr), None);

        let form = FormData::new()
            .text("kind", "passport")
            .file("front", "front.png", Some("image/png"), vec![0x89, 0x50, 0x4e, 0x47]);
        client
            .post_form::<()>("/kyc/documents", form, RequestOptions::default())
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let content_type = seen[0]["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"), "{}", content_type);
        assert_eq!(seen[0]["x-tenant-domain"], "app.example.com");
        assert!(seen[0].get("authorization").is_none());
        server.abort();
    }
}
