//! Minimal CKAN action API (v3) client.

use reqwest::StatusCode;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::catalog::{Catalog, Resource, Upload};
use crate::error::CatalogError;

pub struct CkanClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionResponse<T> {
    success: bool,
    result: Option<T>,
    error: Option<ActionError>,
}

#[derive(Debug, Deserialize)]
struct ActionError {
    #[serde(rename = "__type")]
    kind: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Package {
    #[serde(default)]
    resources: Vec<Resource>,
}

impl CkanClient {
    /// `host` may be a bare hostname (`http://` is assumed) or a full URL.
    pub fn new(
        host: &str,
        api_key: Option<String>,
        user_agent: &str,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder().user_agent(user_agent.to_string()).build()?;
        Ok(Self {
            client,
            base_url: base_url_for(host),
            api_key,
        })
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/api/3/action/{action}", self.base_url)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.header(reqwest::header::AUTHORIZATION, key),
            None => req,
        }
    }

    fn upload_form(upload: &Upload<'_>) -> Form {
        let part = Part::bytes(upload.bytes.to_vec()).file_name(upload.filename.to_string());
        Form::new().part("upload", part)
    }
}

impl Catalog for CkanClient {
    fn package_resources(&self, package_id: &str) -> Result<Vec<Resource>, CatalogError> {
        let req = self
            .client
            .get(self.action_url("package_show"))
            .query(&[("id", package_id)]);
        let package: Package = read_action(self.authorized(req).send()?, package_id)?;
        debug!(package_id, resources = package.resources.len(), "package fetched");
        Ok(package.resources)
    }

    fn create_resource(
        &self,
        package_id: &str,
        upload: &Upload<'_>,
    ) -> Result<Resource, CatalogError> {
        let form = Self::upload_form(upload)
            .text("package_id", package_id.to_string())
            .text("name", upload.name.to_string())
            .text("format", upload.format.to_string());
        let req = self.client.post(self.action_url("resource_create")).multipart(form);
        read_action(self.authorized(req).send()?, package_id)
    }

    fn update_resource(
        &self,
        resource_id: &str,
        upload: &Upload<'_>,
    ) -> Result<Resource, CatalogError> {
        let form = Self::upload_form(upload).text("id", resource_id.to_string());
        let req = self.client.post(self.action_url("resource_update")).multipart(form);
        read_action(self.authorized(req).send()?, resource_id)
    }
}

fn base_url_for(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

fn read_action<T: DeserializeOwned>(resp: Response, subject: &str) -> Result<T, CatalogError> {
    let status = resp.status();
    let body = resp.text()?;
    parse_action(status, &body, subject)
}

fn parse_action<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    subject: &str,
) -> Result<T, CatalogError> {
    let parsed: ActionResponse<T> = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) if status == StatusCode::NOT_FOUND => {
            return Err(CatalogError::NotFound(subject.to_string()));
        }
        Err(e) => {
            return Err(CatalogError::Api(format!(
                "HTTP {status}: unreadable response ({e})"
            )));
        }
    };

    if let Some(err) = &parsed.error {
        if status == StatusCode::NOT_FOUND || err.kind.as_deref() == Some("Not Found Error") {
            return Err(CatalogError::NotFound(subject.to_string()));
        }
    }

    match parsed {
        ActionResponse {
            success: true,
            result: Some(result),
            ..
        } => Ok(result),
        ActionResponse { error, .. } => {
            let detail = error
                .map(|e| {
                    format!(
                        "{}: {}",
                        e.kind.unwrap_or_else(|| "error".to_string()),
                        e.message.unwrap_or_default()
                    )
                })
                .unwrap_or_else(|| "request was not successful".to_string());
            Err(CatalogError::Api(format!("HTTP {status}: {detail}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::runtime::Runtime;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::catalog::{PublishOutcome, publish};

    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn ok(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "result": result}))
    }

    fn mount(rt: &Runtime, server: &MockServer, mock: Mock) {
        rt.block_on(mock.mount(server));
    }

    fn upload(bytes: &[u8]) -> Upload<'_> {
        Upload {
            name: "Precios SANTA_CRUZ",
            format: "csv",
            filename: "sic_SANTA_CRUZ.csv",
            bytes,
        }
    }

    fn secret_client(server: &MockServer) -> CkanClient {
        CkanClient::new(&server.uri(), Some("secret".to_string()), "odbo-test").unwrap()
    }

    fn package_show(resources: serde_json::Value) -> Mock {
        Mock::given(method("GET"))
            .and(path("/api/3/action/package_show"))
            .and(query_param("id", "precios"))
            .and(header("authorization", "secret"))
            .respond_with(ok(json!({"name": "precios", "resources": resources})))
    }

    #[test]
    fn base_url_defaults_to_http() {
        assert_eq!(base_url_for("datos.example.bo"), "http://datos.example.bo");
        assert_eq!(base_url_for("https://datos.example.bo/"), "https://datos.example.bo");
    }

    #[test]
    fn parses_package_resources() {
        let body = r#"{"success": true, "result": {"name": "precios", "resources": [
            {"id": "r1", "name": "precios SANTA_CRUZ", "url": "http://x/sic.csv"},
            {"id": "r2", "name": null}
        ]}}"#;
        let package: Package = parse_action(StatusCode::OK, body, "precios").unwrap();
        assert_eq!(package.resources.len(), 2);
        assert_eq!(package.resources[0].name.as_deref(), Some("precios SANTA_CRUZ"));
        assert!(package.resources[1].name.is_none());
    }

    #[test]
    fn not_found_errors_are_recognized() {
        let body = r#"{"success": false,
            "error": {"__type": "Not Found Error", "message": "Not found"}}"#;
        let err = parse_action::<Package>(StatusCode::NOT_FOUND, body, "precios").unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(id) if id == "precios"));

        let err = parse_action::<Package>(StatusCode::NOT_FOUND, "<html></html>", "precios")
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[test]
    fn other_failures_are_api_errors() {
        let body = r#"{"success": false,
            "error": {"__type": "Authorization Error", "message": "Access denied"}}"#;
        match parse_action::<Package>(StatusCode::FORBIDDEN, body, "precios") {
            Err(CatalogError::Api(msg)) => assert!(msg.contains("Authorization Error")),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn publish_creates_missing_resource() {
        let rt = runtime();
        let server = rt.block_on(MockServer::start());
        mount(&rt, &server, package_show(json!([])));
        mount(
            &rt,
            &server,
            Mock::given(method("POST"))
                .and(path("/api/3/action/resource_create"))
                .and(header("authorization", "secret"))
                .and(body_string_contains(
                    r#"name="upload"; filename="sic_SANTA_CRUZ.csv""#,
                ))
                .and(body_string_contains("fecha,producto\n"))
                .and(body_string_contains("Precios SANTA_CRUZ"))
                .respond_with(ok(json!({"id": "r9", "name": "Precios SANTA_CRUZ"}))),
        );

        let client = secret_client(&server);
        match publish(&client, "precios", &upload(b"fecha,producto\n")).unwrap() {
            PublishOutcome::Created(r) => assert_eq!(r.id, "r9"),
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn publish_updates_existing_resource() {
        let rt = runtime();
        let server = rt.block_on(MockServer::start());
        mount(
            &rt,
            &server,
            package_show(json!([
                {"id": "r1", "name": "Precios SANTA_CRUZ"},
                {"id": "r2", "name": "Precios COCHABAMBA"}
            ])),
        );
        mount(
            &rt,
            &server,
            Mock::given(method("POST"))
                .and(path("/api/3/action/resource_update"))
                .and(header("authorization", "secret"))
                .and(body_string_contains(r#"name="upload"; filename="sic_SANTA_CRUZ.csv""#))
                .and(body_string_contains("r1"))
                .respond_with(ok(json!({"id": "r1", "name": "Precios SANTA_CRUZ"}))),
        );

        let client = secret_client(&server);
        match publish(&client, "precios", &upload(b"fecha,producto\n")).unwrap() {
            PublishOutcome::Updated(r) => assert_eq!(r.id, "r1"),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn missing_package_is_not_found() {
        let rt = runtime();
        let server = rt.block_on(MockServer::start());
        mount(
            &rt,
            &server,
            Mock::given(method("GET"))
                .and(path("/api/3/action/package_show"))
                .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                    "success": false,
                    "error": {"__type": "Not Found Error", "message": "Not found"}
                }))),
        );

        let client = CkanClient::new(&server.uri(), None, "odbo-test").unwrap();
        let err = client.package_resources("precios").unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(id) if id == "precios"));
    }
}
