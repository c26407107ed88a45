use super::wire::{
    GateListResponse, GateShowResponse, ProfileSearchResponse, ProjectSearchResponse,
    StatusResponse, TokenResponse, ValidateResponse,
};
use super::{CallError, CallResult, QualityServer, TokenRequest};
use crate::config::ServerSettings;
use reqwest::blocking::{Client, RequestBuilder, multipart};
use serde::de::DeserializeOwned;
use sonarup_types::{
    Credential, GateCondition, Presence, Project, QualityGate, QualityProfile, ServerStatus,
};
use std::time::Duration;

const MAX_DETAIL_CHARS: usize = 200;

/// [`QualityServer`] over the server's Web API, authenticated with the
/// administrator identity from settings.
pub struct HttpQualityServer {
    base_url: String,
    login: String,
    password: String,
    client: Client,
}

impl HttpQualityServer {
    pub fn new(
        base_url: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> CallResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| CallError::transport(err.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            login: login.into(),
            password: password.into(),
            client,
        })
    }

    pub fn from_settings(settings: &ServerSettings) -> CallResult<Self> {
        Self::new(
            &settings.url,
            &settings.admin_login,
            &settings.admin_password,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.login, Some(&self.password))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> CallResult<T> {
        let request = self.authed(self.client.get(self.url(path)).query(query));
        let body = send(request)?;
        parse(&body)
    }

    fn post_form(&self, path: &str, form: &[(&str, &str)]) -> CallResult<String> {
        let request = self.authed(self.client.post(self.url(path)).form(form));
        send(request)
    }
}

fn send(request: RequestBuilder) -> CallResult<String> {
    let response = request
        .send()
        .map_err(|err| CallError::transport(err.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| CallError::new(Some(i32::from(status.as_u16())), err.to_string()))?;

    if !status.is_success() {
        return Err(CallError::new(
            Some(i32::from(status.as_u16())),
            error_detail(&body),
        ));
    }
    Ok(body)
}

fn parse<T: DeserializeOwned>(body: &str) -> CallResult<T> {
    serde_json::from_str(body)
        .map_err(|err| CallError::transport(format!("unexpected response body: {}", err)))
}

/// Pull `errors[].msg` out of an error body, else a truncated copy of it.
fn error_detail(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        errors: Vec<ErrorMessage>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorMessage {
        msg: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && !parsed.errors.is_empty()
    {
        return parsed
            .errors
            .into_iter()
            .map(|e| e.msg)
            .collect::<Vec<_>>()
            .join("; ");
    }
    body.chars().take(MAX_DETAIL_CHARS).collect()
}

impl QualityServer for HttpQualityServer {
    fn status(&self) -> CallResult<ServerStatus> {
        let response: StatusResponse = self.get_json("/api/system/status", &[])?;
        Ok(response.status)
    }

    fn find_project(&self, name: &str) -> CallResult<Presence<Project>> {
        let response: ProjectSearchResponse =
            self.get_json("/api/projects/search", &[("q", name), ("ps", "500")])?;
        // `q` is a substring search; only an exact name counts
        Ok(response
            .components
            .into_iter()
            .find(|project| project.name == name)
            .into())
    }

    fn create_project(&self, key: &str, name: &str, main_branch: &str) -> CallResult<()> {
        self.post_form(
            "/api/projects/create",
            &[("project", key), ("name", name), ("mainBranch", main_branch)],
        )?;
        Ok(())
    }

    fn find_quality_gate(&self, name: &str) -> CallResult<Presence<QualityGate>> {
        let response: GateListResponse = self.get_json("/api/qualitygates/list", &[])?;
        Ok(response
            .qualitygates
            .into_iter()
            .find(|gate| gate.name == name)
            .into())
    }

    fn create_quality_gate(&self, name: &str) -> CallResult<()> {
        self.post_form("/api/qualitygates/create", &[("name", name)])?;
        Ok(())
    }

    fn set_default_quality_gate(&self, name: &str) -> CallResult<()> {
        self.post_form("/api/qualitygates/set_as_default", &[("name", name)])?;
        Ok(())
    }

    fn gate_conditions(&self, gate: &str) -> CallResult<Vec<GateCondition>> {
        let response: GateShowResponse =
            self.get_json("/api/qualitygates/show", &[("name", gate)])?;
        Ok(response
            .conditions
            .into_iter()
            .filter_map(|c| c.into_condition())
            .collect())
    }

    fn update_gate_condition(&self, condition: &GateCondition) -> CallResult<()> {
        self.post_form(
            "/api/qualitygates/update_condition",
            &[
                ("id", condition.id.as_str()),
                ("metric", condition.metric.as_str()),
                ("op", condition.op.as_str()),
                ("error", condition.error.as_str()),
            ],
        )?;
        Ok(())
    }

    fn find_quality_profile(
        &self,
        name: &str,
        language: &str,
    ) -> CallResult<Presence<QualityProfile>> {
        let response: ProfileSearchResponse =
            self.get_json("/api/qualityprofiles/search", &[("language", language)])?;
        Ok(response
            .profiles
            .into_iter()
            .find(|profile| profile.name == name && profile.language == language)
            .into())
    }

    fn restore_quality_profile(&self, backup: &str) -> CallResult<()> {
        let part = multipart::Part::text(backup.to_string())
            .file_name("quality-profile.xml")
            .mime_str("application/xml")
            .map_err(|err| CallError::transport(err.to_string()))?;
        let form = multipart::Form::new().part("backup", part);

        let request = self.authed(
            self.client
                .post(self.url("/api/qualityprofiles/restore"))
                .multipart(form),
        );
        send(request)?;
        Ok(())
    }

    fn set_default_quality_profile(&self, name: &str, language: &str) -> CallResult<()> {
        self.post_form(
            "/api/qualityprofiles/set_default",
            &[("language", language), ("qualityProfile", name)],
        )?;
        Ok(())
    }

    fn generate_token(&self, request: &TokenRequest) -> CallResult<String> {
        let body = self.post_form(
            "/api/user_tokens/generate",
            &[
                ("login", request.login.as_str()),
                ("name", request.token_name.as_str()),
                ("type", "PROJECT_ANALYSIS_TOKEN"),
                ("projectKey", request.project_key.as_str()),
            ],
        )?;
        let response: TokenResponse = parse(&body)?;
        Ok(response.token)
    }

    fn validate_token(&self, credential: &Credential) -> CallResult<bool> {
        let request = self
            .client
            .get(self.url("/api/authentication/validate"))
            .basic_auth(credential.expose(), None::<&str>);
        let body = send(request)?;
        let response: ValidateResponse = parse(&body)?;
        Ok(response.valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    // base64("admin:admin")
    const ADMIN_AUTH: &str = "Basic YWRtaW46YWRtaW4=";

    fn client(server: &Server) -> HttpQualityServer {
        HttpQualityServer::new(server.url(), "admin", "admin").unwrap()
    }

    #[test]
    fn test_status_up() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/api/system/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"x","version":"10.4","status":"UP"}"#)
            .create();

        let status = client(&server).status().unwrap();
        assert!(status.is_up());
        mock.assert();
    }

    #[test]
    fn test_find_project_requires_exact_name() {
        let mut server = Server::new();
        server
            .mock("GET", "/api/projects/search")
            .match_query(Matcher::UrlEncoded("q".into(), "billing".into()))
            .match_header("authorization", ADMIN_AUTH)
            .with_status(200)
            .with_body(r#"{"components":[{"key":"b2","name":"billing-v2"}]}"#)
            .create();

        let presence = client(&server).find_project("billing").unwrap();
        assert_eq!(presence, Presence::Absent);
    }

    #[test]
    fn test_find_quality_gate_present() {
        let mut server = Server::new();
        server
            .mock("GET", "/api/qualitygates/list")
            .with_status(200)
            .with_body(
                r#"{"qualitygates":[{"name":"Sonar way","isDefault":true},{"name":"Strict Gate","isDefault":false}]}"#,
            )
            .create();

        let presence = client(&server).find_quality_gate("Strict Gate").unwrap();
        let gate = presence.into_option().unwrap();
        assert_eq!(gate.name, "Strict Gate");
        assert!(!gate.is_default);
    }

    #[test]
    fn test_create_gate_posts_form() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/api/qualitygates/create")
            .match_body(Matcher::UrlEncoded("name".into(), "Strict Gate".into()))
            .with_status(200)
            .with_body(r#"{"name":"Strict Gate"}"#)
            .create();

        client(&server).create_quality_gate("Strict Gate").unwrap();
        mock.assert();
    }

    #[test]
    fn test_error_status_and_message() {
        let mut server = Server::new();
        server
            .mock("POST", "/api/projects/create")
            .with_status(400)
            .with_body(r#"{"errors":[{"msg":"Could not create Project with key: \"k\". A similar key already exists: \"k\""}]}"#)
            .create();

        let err = client(&server).create_project("k", "n", "main").unwrap_err();
        assert_eq!(err.status, Some(400));
        assert!(err.message.contains("already exists"));
    }

    #[test]
    fn test_gate_conditions_accept_numeric_ids() {
        let mut server = Server::new();
        server
            .mock("GET", "/api/qualitygates/show")
            .match_query(Matcher::UrlEncoded("name".into(), "Strict Gate".into()))
            .with_status(200)
            .with_body(
                r#"{"name":"Strict Gate","conditions":[
                    {"id":12,"metric":"new_coverage","op":"LT","error":"80"},
                    {"id":"AY-13","metric":"new_duplicated_lines_density","op":"GT","error":"3"}
                ]}"#,
            )
            .create();

        let conditions = client(&server).gate_conditions("Strict Gate").unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].id, "12");
        assert_eq!(conditions[1].id, "AY-13");
    }

    #[test]
    fn test_generate_token_missing_field_is_empty() {
        let mut server = Server::new();
        server
            .mock("POST", "/api/user_tokens/generate")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("login".into(), "admin".into()),
                Matcher::UrlEncoded("name".into(), "tkn".into()),
                Matcher::UrlEncoded("projectKey".into(), "k".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"login":"admin","name":"tkn"}"#)
            .create();

        let token = client(&server)
            .generate_token(&TokenRequest {
                login: "admin".to_string(),
                token_name: "tkn".to_string(),
                project_key: "k".to_string(),
            })
            .unwrap();
        assert!(token.is_empty());
    }

    #[test]
    fn test_validate_token_uses_token_auth() {
        let mut server = Server::new();
        // base64("squ_abc:")
        server
            .mock("GET", "/api/authentication/validate")
            .match_header("authorization", "Basic c3F1X2FiYzo=")
            .with_status(200)
            .with_body(r#"{"valid":true}"#)
            .create();

        let credential = Credential::new("squ_abc").unwrap();
        assert!(client(&server).validate_token(&credential).unwrap());
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        let api = HttpQualityServer::new("http://127.0.0.1:1", "admin", "admin").unwrap();
        let err = api.status().unwrap_err();
        assert_eq!(err.status, None);
    }
}
