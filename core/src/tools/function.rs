use crate::tools::render_output;
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// A tool backed by a closure. Lets callers expose plain functions without
/// implementing [`Tool`] by hand.
pub struct FunctionTool {
    name: String,
    description: String,
    parameters_schema: Value,
    handler: Handler,
}

impl FunctionTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
            handler: Arc::new(move |args| handler(args).boxed()),
        }
    }

    /// Arguments are deserialized into `A`; the return value is serialized back.
    pub fn typed<A, R, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        handler: F,
    ) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(name, description, parameters_schema, move |raw: Value| {
            let handler = handler.clone();
            async move {
                let args: A = serde_json::from_value(raw)?;
                let out = handler(args).await?;
                Ok::<_, anyhow::Error>(serde_json::to_value(out)?)
            }
        })
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        let output = (self.handler)(args).await?;
        Ok(ToolResult::success(render_output(&output)))
    }
}
