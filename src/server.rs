use crate::config::ServerConfig;
use crate::error::{ToolDisabledError, to_mcp_error};
use crate::format::FormatCatalog;
use crate::logging::tool_span;
use crate::model::{
    ConvertDataResponse, ConvertSchemaResponse, DataInfoResponse, InferSchemaResponse,
    SchemaInfoResponse, ValidateResponse,
};
use crate::state::AppState;
use crate::tools;
use crate::with_metrics;
use anyhow::Result;
use rmcp::{
    ErrorData as McpError, Json, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
};
use std::sync::Arc;
use tracing::Instrument;

const INSTRUCTIONS: &str = "\
RDF shape validation: validate RDF data against ShEx or SHACL schemas.

WORKFLOW:
1) list_formats for the accepted data formats, schema engines, schema formats and shape map formats
2) data_info / schema_info to check that inputs parse and to see their prefixes and shapes
3) validate with data, schema and either a shape map, a node+shape pair, or target declarations
4) infer_schema to bootstrap a schema from example nodes; convert_schema to change syntax or engine

INPUTS:
- Data comes from exactly one active source: data (inline text), dataUrl, dataFile, endpoint \
(SPARQL) or compoundData (a JSON array of sources). activeDataSource picks one explicitly.
- Schemas: schema, schemaUrl or schemaFile, with schemaEngine (ShEx, SHACL) and schemaFormat. \
schemaEmbedded=true reads SHACL shapes from the data.
- Shape maps use compact syntax: `ex:alice@ex:Person, {FOCUS a ex:Person}@ex:Person`.
- triggerMode: ShapeMap, TargetDecls (SHACL targets) or NodeShape (node + shape).

RESULTS:
validate never fails as a call: unresolvable inputs come back with isError=true and the reason \
in message. elapsedNanos is 0 when the engine never ran.";

#[derive(Clone)]
pub struct RdfShapeServer {
    state: Arc<AppState>,
    tool_router: ToolRouter<RdfShapeServer>,
}

impl RdfShapeServer {
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        let state = Arc::new(AppState::new(config)?);
        Ok(Self::from_state(state))
    }

    pub fn from_state(state: Arc<AppState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }

    pub async fn run_stdio(self) -> Result<()> {
        let service = self
            .serve(stdio())
            .await
            .inspect_err(|error| tracing::error!("serving error: {:?}", error))?;
        service.waiting().await?;
        Ok(())
    }

    fn ensure_tool_enabled(&self, tool: &str) -> Result<()> {
        tracing::info!(tool = tool, "tool invocation requested");
        if self.state.config().is_tool_enabled(tool) {
            Ok(())
        } else {
            Err(ToolDisabledError::new(tool).into())
        }
    }
}

#[tool_router]
impl RdfShapeServer {
    #[tool(
        name = "validate",
        description = "Validate RDF data against a ShEx or SHACL schema. \
Returns the result shape map or SHACL report, the trigger used and the engine time."
    )]
    pub async fn validate(
        &self,
        Parameters(params): Parameters<tools::ValidateParams>,
    ) -> Result<Json<ValidateResponse>, McpError> {
        let state = self.state.clone();
        with_metrics!("validate", async {
            self.ensure_tool_enabled("validate")?;
            tools::validate(state, params).await
        }
        .instrument(tool_span("validate", "mcp"))
        .await)
        .map(Json)
        .map_err(to_mcp_error)
    }

    #[tool(
        name = "convert_schema",
        description = "Convert a schema to another format, or a SHACL schema to ShEx. \
Returns the converted text and a shape map reproducing the SHACL targets."
    )]
    pub async fn convert_schema(
        &self,
        Parameters(params): Parameters<tools::ConvertSchemaParams>,
    ) -> Result<Json<ConvertSchemaResponse>, McpError> {
        let state = self.state.clone();
        with_metrics!("convert_schema", async {
            self.ensure_tool_enabled("convert_schema")?;
            tools::convert_schema(state, params).await
        }
        .instrument(tool_span("convert_schema", "mcp"))
        .await)
        .map(Json)
        .map_err(to_mcp_error)
    }

    #[tool(
        name = "infer_schema",
        description = "Infer a ShEx or SHACL shape from the nodes a selector picks out of the data"
    )]
    pub async fn infer_schema(
        &self,
        Parameters(params): Parameters<tools::InferSchemaParams>,
    ) -> Result<Json<InferSchemaResponse>, McpError> {
        let state = self.state.clone();
        with_metrics!("infer_schema", async {
            self.ensure_tool_enabled("infer_schema")?;
            tools::infer_schema(state, params).await
        }
        .instrument(tool_span("infer_schema", "mcp"))
        .await)
        .map(Json)
        .map_err(to_mcp_error)
    }

    #[tool(
        name = "schema_info",
        description = "Parse a schema and list its engine, format, shapes and prefixes"
    )]
    pub async fn schema_info(
        &self,
        Parameters(params): Parameters<tools::SchemaInfoParams>,
    ) -> Result<Json<SchemaInfoResponse>, McpError> {
        let state = self.state.clone();
        with_metrics!("schema_info", async {
            self.ensure_tool_enabled("schema_info")?;
            tools::schema_info(state, params).await
        }
        .instrument(tool_span("schema_info", "mcp"))
        .await)
        .map(Json)
        .map_err(to_mcp_error)
    }

    #[tool(
        name = "data_info",
        description = "Resolve RDF data and summarise it: triples, subjects, predicates and prefixes"
    )]
    pub async fn data_info(
        &self,
        Parameters(params): Parameters<tools::DataParamsWithBase>,
    ) -> Result<Json<DataInfoResponse>, McpError> {
        let state = self.state.clone();
        with_metrics!("data_info", async {
            self.ensure_tool_enabled("data_info")?;
            tools::data_info(state, params).await
        }
        .instrument(tool_span("data_info", "mcp"))
        .await)
        .map(Json)
        .map_err(to_mcp_error)
    }

    #[tool(
        name = "convert_data",
        description = "Resolve RDF data and serialise it in targetDataFormat (Turtle by default)"
    )]
    pub async fn convert_data(
        &self,
        Parameters(params): Parameters<tools::DataParamsWithBase>,
    ) -> Result<Json<ConvertDataResponse>, McpError> {
        let state = self.state.clone();
        with_metrics!("convert_data", async {
            self.ensure_tool_enabled("convert_data")?;
            tools::convert_data(state, params).await
        }
        .instrument(tool_span("convert_data", "mcp"))
        .await)
        .map(Json)
        .map_err(to_mcp_error)
    }

    #[tool(
        name = "list_formats",
        description = "List supported data formats, schema engines and formats, shape map formats, \
trigger modes, inference engines and defaults"
    )]
    pub async fn list_formats(
        &self,
        Parameters(params): Parameters<tools::ListFormatsParams>,
    ) -> Result<Json<FormatCatalog>, McpError> {
        let state = self.state.clone();
        with_metrics!("list_formats", async {
            self.ensure_tool_enabled("list_formats")?;
            tools::list_formats(state, params).await
        }
        .instrument(tool_span("list_formats", "mcp"))
        .await)
        .map(Json)
        .map_err(to_mcp_error)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for RdfShapeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_string()),
            ..ServerInfo::default()
        }
    }
}
