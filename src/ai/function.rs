//! Function-calling schema types and the `ToolCall` trait the agent
//! runtime dispatches through.

use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::calendar::public::{ToolError, ToolResult};

#[derive(Serialize)]
pub struct Items {
    pub r#type: String,
}

#[derive(Serialize)]
pub struct Property {
    pub r#type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,
}

impl Property {
    pub fn string(description: &str) -> Self {
        Self::of("string", description)
    }

    pub fn integer(description: &str) -> Self {
        Self::of("integer", description)
    }

    pub fn strings(description: &str) -> Self {
        Self {
            items: Some(Items {
                r#type: String::from("string"),
            }),
            ..Self::of("array", description)
        }
    }

    fn of(r#type: &str, description: &str) -> Self {
        Self {
            r#type: r#type.to_string(),
            description: description.to_string(),
            items: None,
        }
    }
}

#[derive(Serialize)]
pub struct Parameters<Props: Serialize> {
    pub r#type: String,
    pub properties: Props,
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

#[derive(Serialize)]
pub struct Function<Props: Serialize> {
    pub name: String,
    pub description: String,
    pub parameters: Parameters<Props>,
    pub strict: bool,
}

#[derive(Serialize)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

// `serde::Serialize` isn't object safe, `erased_serde` lets a list of
// boxed tools serialize to their schemas.
#[async_trait]
pub trait ToolCall: erased_serde::Serialize {
    /// Run the tool with JSON encoded `args` and return the JSON
    /// encoded result.
    async fn call(&self, args: &str) -> Result<String, Error>;
    fn function_name(&self) -> String;
}
erased_serde::serialize_trait_object!(ToolCall);

pub type BoxedToolCall = Box<dyn ToolCall + Send + Sync + 'static>;

/// Call the tool named `name`. Always returns a result document, even
/// when the tool is unknown or fails outright.
pub async fn dispatch(tools: &[BoxedToolCall], name: &str, args: &str) -> String {
    let Some(tool) = tools.iter().find(|t| t.function_name() == name) else {
        tracing::warn!("Unknown tool '{}'", name);
        let err = ToolError::invalid_arguments(&format!("Unknown tool '{}'", name));
        return ToolResult::<()>::Error(err).to_json();
    };

    tracing::debug!("Calling tool '{}' with {}", name, args);
    match tool.call(args).await {
        Ok(out) => out,
        Err(e) => {
            tracing::error!("Tool '{}' failed: {:#}", name, e);
            ToolResult::<()>::Error(ToolError::unexpected()).to_json()
        }
    }
}
