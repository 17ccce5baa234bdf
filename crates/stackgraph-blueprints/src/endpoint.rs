//! Hosted model endpoint stack: model → endpoint config → endpoint, with the
//! endpoint's name and ARN exported for other stacks.

use crate::params::{EndpointParams, StackParams};
use stackgraph_core::{Error, OutputValue, PropertyValue, Result};
use stackgraph_graph::{NameGenerator, ResourceNode, StackGraph};
use tracing::info;

pub const MODEL_ID: &str = "LLMEndpointModel";
pub const ENDPOINT_CONFIG_ID: &str = "LLMEndpointConfig";
pub const ENDPOINT_ID: &str = "LLMEndpoint";

/// `<prefix>-<7 distinct digits>`
pub fn endpoint_name(params: &EndpointParams, names: &mut dyn NameGenerator) -> String {
    format!("{}-{}", params.name_prefix, names.sample_digits(7))
}

fn check_params(params: &EndpointParams) -> Result<()> {
    if !params.accept_eula {
        return Err(Error::configuration(format!(
            "model {} requires accepting its end user license agreement",
            params.model_id
        )));
    }
    for (field, value) in [
        ("model_id", &params.model_id),
        ("instance_type", &params.instance_type),
        ("name_prefix", &params.name_prefix),
    ] {
        if value.trim().is_empty() {
            return Err(Error::configuration(format!("endpoint {} must not be blank", field)));
        }
    }
    Ok(())
}

/// Declare the endpoint stack. The returned graph is still `Building`.
pub fn endpoint_stack(
    stack: &StackParams,
    params: &EndpointParams,
    names: &mut dyn NameGenerator,
) -> Result<StackGraph> {
    check_params(params)?;
    let name = endpoint_name(params, names);

    let mut graph = StackGraph::new(stack.name.as_str());
    graph.add_node(
        ResourceNode::new(MODEL_ID, "SageMaker::Model")
            .with_property("model_name", format!("{}-model", name))
            .with_property("jumpstart_model", params.model_id.as_str())
            .with_property("jumpstart_model_version", params.model_version.as_str())
            .with_property("accept_eula", PropertyValue::literal(params.accept_eula)),
    )?;
    graph.add_node(
        ResourceNode::new(ENDPOINT_CONFIG_ID, "SageMaker::EndpointConfig")
            .with_property("endpoint_config_name", format!("{}-config", name))
            .with_property("model_name", PropertyValue::reference(MODEL_ID, "model_name"))
            .with_property("instance_type", params.instance_type.as_str())
            .with_property("initial_instance_count", PropertyValue::literal(1)),
    )?;
    graph.add_node(
        ResourceNode::new(ENDPOINT_ID, "SageMaker::Endpoint")
            .with_property("endpoint_name", name.as_str())
            .with_property(
                "endpoint_config",
                PropertyValue::reference(ENDPOINT_CONFIG_ID, "endpoint_config_name"),
            ),
    )?;

    graph.add_exported_output(
        "LLMEndpointName",
        OutputValue::reference(ENDPOINT_ID, "endpoint_name"),
        format!("{}-LLMEndpointName", stack.name),
    )?;
    graph.add_exported_output(
        "LLMEndpointArn",
        OutputValue::reference(ENDPOINT_ID, "arn"),
        format!("{}-LLMEndpointArn", stack.name),
    )?;

    info!(stack = %stack.name, endpoint = %name, model = %params.model_id, "endpoint stack declared");
    Ok(graph)
}
