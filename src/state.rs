use crate::config::ServerConfig;
use crate::convert::ConversionService;
use crate::infer::InferenceService;
use crate::info::{DataService, SchemaService};
use crate::rdf::remote::HttpClient;
use crate::resolve::{ResourceTracker, Resolver};
use crate::validation::ValidationService;
use anyhow::Result;
use std::sync::Arc;

/// Services shared by every transport, built once from the configuration.
pub struct AppState {
    config: Arc<ServerConfig>,
    resolver: Resolver,
    validation: ValidationService,
    conversion: ConversionService,
    inference: InferenceService,
    data: DataService,
    schema: SchemaService,
}

impl AppState {
    /// Uses one HTTP client for documents and SPARQL endpoints.
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        let client = Arc::new(HttpClient::new(config.fetch_timeout(), config.max_fetch_bytes)?);
        let resolver = Resolver::new(client.clone(), client);
        Ok(Self::with_resolver(config, resolver))
    }

    /// Builds the services around an existing resolver.
    pub fn with_resolver(config: Arc<ServerConfig>, resolver: Resolver) -> Self {
        let base = config.default_base_iri.clone();
        let validation = ValidationService::new(resolver.clone())
            .with_follow_depth(config.endpoint_follow_depth)
            .with_default_base(base.clone());
        let conversion = ConversionService::new(resolver.clone()).with_default_base(base.clone());
        let inference = InferenceService::new(resolver.clone())
            .with_follow_depth(config.endpoint_follow_depth)
            .with_default_base(base.clone());
        let data = DataService::new(resolver.clone()).with_default_base(base.clone());
        let schema = SchemaService::new(resolver.clone()).with_default_base(base);
        tracing::debug!(
            follow_depth = config.endpoint_follow_depth,
            base = %config.default_base_iri,
            "application state ready"
        );
        Self {
            config,
            resolver,
            validation,
            conversion,
            inference,
            data,
            schema,
        }
    }

    /// Swaps the validation service, keeping everything else.
    pub fn with_validation(mut self, validation: ValidationService) -> Self {
        self.validation = validation;
        self
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.resolver.tracker
    }

    pub fn validation(&self) -> &ValidationService {
        &self.validation
    }

    pub fn conversion(&self) -> &ConversionService {
        &self.conversion
    }

    pub fn inference(&self) -> &InferenceService {
        &self.inference
    }

    pub fn data(&self) -> &DataService {
        &self.data
    }

    pub fn schema(&self) -> &SchemaService {
        &self.schema
    }
}
