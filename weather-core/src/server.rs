//! MCP server exposing the weather tools.
//!
//! [`WeatherServer`] puts a [`ToolDispatcher`] behind rmcp's [`ServerHandler`].
//! The protocol lifecycle (`initialize`, `ping`, request ids) is rmcp's; the
//! framing is [`line_transport`], which answers unreadable lines itself.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, InitializeResult,
        ListToolsResult, PaginatedRequestParam, ProtocolVersion, ServerCapabilities, Tool,
    },
    service::{RequestContext, RoleServer},
};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{debug, info};

use crate::{
    tools::{ToolDescriptor, ToolDispatcher, ToolResult},
    transport::line_transport,
};

pub const SERVER_NAME: &str = "openweather-mcp";

#[derive(Debug, Clone)]
pub struct WeatherServer {
    dispatcher: Arc<ToolDispatcher>,
}

impl WeatherServer {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher: Arc::new(dispatcher) }
    }

    /// Serve on the process's stdin/stdout until stdin closes.
    pub async fn run_stdio(self) -> Result<()> {
        self.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
    }

    pub async fn run<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!(server = SERVER_NAME, version = env!("CARGO_PKG_VERSION"), "serving on stdio");

        let service = self
            .serve(line_transport(reader, writer))
            .await
            .map_err(|e| anyhow!("MCP initialization failed: {e}"))?;
        let reason = service.waiting().await?;

        info!(?reason, "input closed, shutting down");
        Ok(())
    }
}

impl ServerHandler for WeatherServer {
    fn get_info(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: ProtocolVersion::V_2025_03_26,
            server_info: Implementation {
                name: SERVER_NAME.into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: Some("OpenWeather MCP Server".into()),
                icons: None,
                website_url: None,
            },
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Weather data from OpenWeather One Call 3.0. Use search_location to turn a \
                 place name into coordinates, then get_current_weather or get_weather_history."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools: Vec<Tool> = self.dispatcher.list_tools().iter().map(to_tool).collect();
        debug!("ListTools returning {} tools", tools.len());
        Ok(ListToolsResult { tools, next_cursor: None })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = request.arguments.map(Value::Object).unwrap_or(Value::Null);

        let result = self
            .dispatcher
            .call(&request.name, arguments)
            .await
            .map_err(|err| McpError::invalid_params(err.to_string(), None))?;

        Ok(to_call_result(result))
    }
}

fn to_tool(descriptor: &ToolDescriptor) -> Tool {
    Tool {
        name: descriptor.name.clone().into(),
        title: None,
        description: Some(descriptor.description.clone().into()),
        input_schema: Arc::new(descriptor.input_schema.as_object().cloned().unwrap_or_default()),
        output_schema: None,
        annotations: None,
        icons: None,
    }
}

fn to_call_result(result: ToolResult) -> CallToolResult {
    let content = result.content.into_iter().map(|block| Content::text(block.text)).collect();
    if result.is_error { CallToolResult::error(content) } else { CallToolResult::success(content) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::FakeGateway;
    use rmcp::{
        model::ErrorCode,
        service::{RoleClient, RunningService, ServiceError},
    };
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, DuplexStream, Lines};

    fn weather_server(gateway: FakeGateway) -> WeatherServer {
        WeatherServer::new(ToolDispatcher::new(Arc::new(gateway)))
    }

    /// Starts the server on one end of an in-memory pipe and returns the other.
    fn spawn_server(gateway: FakeGateway) -> DuplexStream {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let (read, write) = tokio::io::split(server_io);
        tokio::spawn(weather_server(gateway).run(BufReader::new(read), write));
        client_io
    }

    async fn connect(gateway: FakeGateway) -> RunningService<RoleClient, ()> {
        ().serve(spawn_server(gateway)).await.unwrap()
    }

    fn arguments(value: Value) -> Option<serde_json::Map<String, Value>> {
        value.as_object().cloned()
    }

    fn first_text(result: &CallToolResult) -> String {
        let encoded = serde_json::to_value(result).unwrap();
        encoded["content"][0]["text"].as_str().unwrap().to_string()
    }

    #[test]
    fn get_info_advertises_tools() {
        let info = weather_server(FakeGateway::default()).get_info();

        assert_eq!(info.server_info.name, SERVER_NAME);
        assert_eq!(info.server_info.version, env!("CARGO_PKG_VERSION"));
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_none());
    }

    #[tokio::test]
    async fn list_tools_returns_three_fixed_names() {
        let client = connect(FakeGateway::default()).await;

        let result = client.list_tools(Default::default()).await.unwrap();

        let names: Vec<&str> = result.tools.iter().map(|t| &*t.name).collect();
        assert_eq!(names, ["get_current_weather", "get_weather_history", "search_location"]);
        assert!(result.tools.iter().all(|t| t.input_schema["type"] == "object"));

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn call_tool_wraps_payload_in_text_content() {
        let payload = json!({"lat": 51.5, "lon": -0.12, "daily": []});
        let client = connect(FakeGateway::returning(payload.clone())).await;

        let result = client
            .call_tool(CallToolRequestParam {
                name: "get_current_weather".into(),
                arguments: arguments(json!({"lat": 51.5, "lon": -0.12})),
            })
            .await
            .unwrap();

        assert_ne!(result.is_error, Some(true));
        assert_eq!(serde_json::from_str::<Value>(&first_text(&result)).unwrap(), payload);

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn gateway_failure_is_a_result_not_an_error() {
        let client = connect(FakeGateway::failing(401, "Invalid API key")).await;

        let result = client
            .call_tool(CallToolRequestParam {
                name: "search_location".into(),
                arguments: arguments(json!({"query": "London"})),
            })
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        assert_eq!(first_text(&result), "Error: OpenWeather API error: Invalid API key");

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn validation_failure_is_a_result_not_an_error() {
        let client = connect(FakeGateway::default()).await;

        let result = client
            .call_tool(CallToolRequestParam {
                name: "get_current_weather".into(),
                arguments: arguments(json!({"lat": 51.5})),
            })
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        assert!(first_text(&result).starts_with("Error: Invalid arguments for get_current_weather"));

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_tool_is_a_protocol_error() {
        let client = connect(FakeGateway::default()).await;

        let err = client
            .call_tool(CallToolRequestParam { name: "bogus_tool".into(), arguments: None })
            .await
            .unwrap_err();

        match err {
            ServiceError::McpError(err) => {
                assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
                assert_eq!(err.message, "Unknown tool: bogus_tool");
            }
            other => panic!("expected an MCP error, got {other:?}"),
        }

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn identical_calls_produce_identical_results() {
        let client = connect(FakeGateway::returning(json!({"timezone": "UTC"}))).await;
        let call = || CallToolRequestParam {
            name: "get_weather_history".into(),
            arguments: arguments(json!({"lat": 1, "lon": 2, "dt": 1_700_000_000})),
        };

        let first = client.call_tool(call()).await.unwrap();
        let second = client.call_tool(call()).await.unwrap();

        assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());

        client.cancel().await.unwrap();
    }

    /// Raw line-level access to a running server, for inputs a well-behaved
    /// client never sends.
    struct RawClient {
        lines: Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>,
        writer: tokio::io::WriteHalf<DuplexStream>,
    }

    impl RawClient {
        async fn start(gateway: FakeGateway) -> Self {
            let (read, writer) = tokio::io::split(spawn_server(gateway));
            let mut client = Self { lines: BufReader::new(read).lines(), writer };

            client
                .send(br#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","capabilities":{},"clientInfo":{"name":"test","version":"0"}}}"#)
                .await;
            let init = client.recv().await;
            assert_eq!(init["result"]["serverInfo"]["name"], SERVER_NAME);

            client.send(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;
            client
        }

        async fn send(&mut self, line: &[u8]) {
            self.writer.write_all(line).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
            self.writer.flush().await.unwrap();
        }

        async fn recv(&mut self) -> Value {
            let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
                .await
                .expect("server did not answer")
                .unwrap()
                .expect("server closed the stream");
            serde_json::from_str(&line).unwrap()
        }
    }

    #[tokio::test]
    async fn invalid_utf8_line_gets_parse_error_and_session_continues() {
        let mut client = RawClient::start(FakeGateway::default()).await;

        client.send(&[0xff, 0xfe]).await;
        client.send(br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#).await;

        let error = client.recv().await;
        assert_eq!(error["id"], Value::Null);
        assert_eq!(error["error"]["code"], -32700);

        let pong = client.recv().await;
        assert_eq!(pong["id"], 2);
        assert_eq!(pong["result"], json!({}));
    }

    #[tokio::test]
    async fn null_id_request_is_rejected_not_ignored() {
        let mut client = RawClient::start(FakeGateway::default()).await;

        client.send(br#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).await;

        let error = client.recv().await;
        assert_eq!(error["id"], Value::Null);
        assert_eq!(error["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn unsupported_method_is_not_found() {
        let mut client = RawClient::start(FakeGateway::default()).await;

        client.send(br#"{"jsonrpc":"2.0","id":8,"method":"resources/list"}"#).await;

        let error = client.recv().await;
        assert_eq!(error["id"], 8);
        assert_eq!(error["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn blank_lines_are_ignored_between_requests() {
        let mut client = RawClient::start(FakeGateway::default()).await;

        client.send(b"").await;
        client.send(br#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#).await;

        let listed = client.recv().await;
        assert_eq!(listed["id"], 3);
        assert_eq!(listed["result"]["tools"].as_array().unwrap().len(), 3);
    }
}
