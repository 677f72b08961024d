// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Request handlers. Each one performs a single logical supervisor operation
//! and keeps nothing between requests.

use crate::api::codec::{
    self, ApiBody, BoxError, BulkResult, INVALID_REQUEST, INVALID_REQUEST_FORMAT,
    OperationResult, ProgramOutcome, SHUTDOWN_MESSAGE,
};
use crate::api::options::{ApiOptions, BulkMode, ReloadAck};
use crate::api::routes::{self, Endpoint, Resolution};
use crate::errors::SupervisorError;
use crate::program::ProgramDefinition;
use crate::supervisor::{ProcessRequest, Supervisor};
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy)]
enum Action {
    Start,
    Stop,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
        }
    }
}

pub struct ControlApi {
    supervisor: Arc<dyn Supervisor>,
    options: ApiOptions,
}

impl ControlApi {
    pub fn new(supervisor: Arc<dyn Supervisor>, options: ApiOptions) -> Self {
        Self {
            supervisor,
            options,
        }
    }

    pub fn options(&self) -> &ApiOptions {
        &self.options
    }

    /// Route and answer one request. Never fails: every outcome, including
    /// unknown paths and supervisor errors, is a response.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<ApiBody>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!("{method} {path}");

        match routes::resolve(method.as_str(), &path) {
            Resolution::Matched { endpoint, params } => {
                let name = params.get("name").unwrap_or_default();
                self.dispatch(endpoint, name, req.into_body()).await
            }
            Resolution::MethodNotAllowed(allowed) => {
                info!("{method} not allowed on {path}");
                codec::method_not_allowed(&allowed)
            }
            Resolution::NotFound => {
                info!("{method} Request to unknown endpoint: {path}");
                codec::not_found()
            }
        }
    }

    async fn dispatch<B>(&self, endpoint: Endpoint, name: &str, body: B) -> Response<ApiBody>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        match endpoint {
            Endpoint::ListPrograms => self.list_programs().await,
            Endpoint::StartProgram => self.single(Action::Start, name).await,
            Endpoint::StopProgram => self.single(Action::Stop, name).await,
            // Log retrieval is not wired up; the route exists so clients get a
            // defined answer.
            Endpoint::ReadStdoutLog => codec::empty(),
            Endpoint::StartPrograms => self.bulk(Action::Start, body).await,
            Endpoint::StopPrograms => self.bulk(Action::Stop, body).await,
            Endpoint::CreateProgram => self.create_program(name, body).await,
            Endpoint::RevokeProgram => self.revoke_program(name).await,
            Endpoint::Shutdown => self.shutdown().await,
            Endpoint::Reload => self.reload().await,
        }
    }

    /// Run a supervisor call under the configured timeout and log failures.
    async fn call<T>(
        &self,
        op: &str,
        target: &str,
        fut: impl Future<Output = Result<T, SupervisorError>>,
    ) -> Result<T, SupervisorError> {
        let result = match self.options.call_timeout {
            Some(limit) => timeout(limit, fut)
                .await
                .unwrap_or(Err(SupervisorError::Timeout(limit))),
            None => fut.await,
        };
        if let Err(e) = &result {
            warn!("{op} {target} failed: {e}");
        }
        result
    }

    /// Start or stop one program, waiting for the transition. `true` only when
    /// the call succeeded and the supervisor reports success.
    async fn run(&self, action: Action, name: &str) -> bool {
        let request = ProcessRequest::waiting(name);
        let result = match action {
            Action::Start => {
                self.call(action.as_str(), name, self.supervisor.start_process(request))
                    .await
            }
            Action::Stop => {
                self.call(action.as_str(), name, self.supervisor.stop_process(request))
                    .await
            }
        };
        result.unwrap_or(false)
    }

    async fn list_programs(&self) -> Response<ApiBody> {
        match self
            .call("list", "programs", self.supervisor.list_processes())
            .await
        {
            Ok(infos) => codec::json(&infos),
            Err(_) => codec::json(&OperationResult::new(false)),
        }
    }

    async fn single(&self, action: Action, name: &str) -> Response<ApiBody> {
        let success = self.run(action, name).await;
        info!("{} {name}: success={success}", action.as_str());
        codec::json(&OperationResult::new(success))
    }

    async fn bulk<B>(&self, action: Action, body: B) -> Response<ApiBody>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let bytes = match codec::read_body(body).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {} request body: {e}", action.as_str());
                return codec::bad_request(INVALID_REQUEST);
            }
        };
        let names: Vec<String> = match serde_json::from_slice(&bytes) {
            Ok(names) => names,
            Err(e) => {
                warn!("Failed to parse {} program list: {e}", action.as_str());
                return codec::bad_request(INVALID_REQUEST);
            }
        };

        // Sequential, in request order, and never short-circuits.
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let success = self.run(action, &name).await;
            results.push(ProgramOutcome { name, success });
        }
        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            "bulk {}: {succeeded}/{} succeeded",
            action.as_str(),
            results.len()
        );

        match self.options.bulk_mode {
            BulkMode::BestEffort => codec::json(&OperationResult::new(true)),
            BulkMode::Strict => codec::json(&BulkResult {
                success: succeeded == results.len(),
                results,
            }),
        }
    }

    async fn create_program<B>(&self, name: &str, body: B) -> Response<ApiBody>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let bytes = match codec::read_body(body).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read create request body: {e}");
                return codec::bad_request(INVALID_REQUEST);
            }
        };
        let mut definition: ProgramDefinition = match serde_json::from_slice(&bytes) {
            Ok(definition) => definition,
            Err(e) => {
                warn!("Failed to parse program definition: {e}");
                return codec::bad_request(INVALID_REQUEST_FORMAT);
            }
        };

        if definition.name.is_empty() {
            definition.name = name.to_string();
        }
        definition.normalize_name();
        let target = definition.name.clone();

        let success = self
            .call("create", &target, self.supervisor.create_process(definition))
            .await
            .is_ok();
        info!("create {target}: success={success}");
        codec::json(&OperationResult::new(success))
    }

    async fn revoke_program(&self, name: &str) -> Response<ApiBody> {
        let success = self
            .call(
                "revoke",
                name,
                self.supervisor.revoke_process(ProcessRequest::detached(name)),
            )
            .await
            .unwrap_or(false);
        info!("revoke {name}: success={success}");
        codec::json(&OperationResult::new(success))
    }

    async fn shutdown(&self) -> Response<ApiBody> {
        info!("Shutdown requested through the API");
        // The acknowledgment is not part of the response.
        let _ = self
            .call("shutdown", "supervisor", self.supervisor.shutdown())
            .await;
        codec::text(StatusCode::OK, SHUTDOWN_MESSAGE)
    }

    async fn reload(&self) -> Response<ApiBody> {
        let result = self
            .call("reload", "supervisor", self.supervisor.reload_config(false))
            .await;
        let success = match self.options.reload_ack {
            ReloadAck::Reported => result.unwrap_or(false),
            ReloadAck::Legacy => false,
        };
        info!("reload: success={success}");
        codec::json(&OperationResult::new(success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Call, InMemorySupervisor};
    use crate::state::ProcessState;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Bytes;

    fn request(method: &str, path: &str, body: &'static str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    async fn body_string(response: Response<ApiBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_start_passes_wait_and_name_verbatim() {
        let supervisor =
            Arc::new(InMemorySupervisor::new().with_program("web", ProcessState::Stopped));
        let api = ControlApi::new(supervisor.clone(), ApiOptions::default());

        let response = api.handle(request("PUT", "/program/start/web", "")).await;
        assert_eq!(body_string(response).await, "{\"success\":true}\n");
        assert_eq!(
            supervisor.calls().await,
            vec![Call::Start(ProcessRequest::waiting("web"))]
        );
    }

    #[tokio::test]
    async fn test_declined_operation_is_failure() {
        let supervisor = Arc::new(
            InMemorySupervisor::new()
                .with_program("web", ProcessState::Running)
                .with_declined("web"),
        );
        let api = ControlApi::new(supervisor, ApiOptions::default());

        let response = api.handle(request("POST", "/program/stop/web", "")).await;
        assert_eq!(body_string(response).await, "{\"success\":false}\n");
    }

    #[tokio::test]
    async fn test_revoke_does_not_wait() {
        let supervisor =
            Arc::new(InMemorySupervisor::new().with_program("web", ProcessState::Running));
        let api = ControlApi::new(supervisor.clone(), ApiOptions::default());

        let response = api.handle(request("POST", "/program/revoke/web", "")).await;
        assert_eq!(body_string(response).await, "{\"success\":true}\n");
        assert_eq!(
            supervisor.calls().await,
            vec![Call::Revoke(ProcessRequest::detached("web"))]
        );
    }

    #[tokio::test]
    async fn test_create_falls_back_to_path_name() {
        let supervisor = Arc::new(InMemorySupervisor::new());
        let api = ControlApi::new(supervisor.clone(), ApiOptions::default());

        let response = api
            .handle(request("POST", "/program/create/web", r#"{"command":"/bin/true"}"#))
            .await;
        assert_eq!(body_string(response).await, "{\"success\":true}\n");
        let created = supervisor.created().await;
        assert_eq!(created[0].name, "program:web");
        assert_eq!(created[0].config.command, "/bin/true");
    }

    #[tokio::test]
    async fn test_reload_is_full_reload() {
        let supervisor = Arc::new(InMemorySupervisor::new().with_reload_ack(true));
        let api = ControlApi::new(supervisor.clone(), ApiOptions::default());

        let response = api.handle(request("PUT", "/supervisor/reload", "")).await;
        assert_eq!(body_string(response).await, "{\"success\":true}\n");
        assert_eq!(
            supervisor.calls().await,
            vec![Call::Reload { incremental: false }]
        );
    }

    #[tokio::test]
    async fn test_log_route_is_empty() {
        let supervisor = Arc::new(InMemorySupervisor::new());
        let api = ControlApi::new(supervisor.clone(), ApiOptions::default());

        let response = api.handle(request("GET", "/program/log/web/stdout", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "");
        assert!(supervisor.calls().await.is_empty());
    }
}
