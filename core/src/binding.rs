//! Precomputed call-site binding strategies
//!
//! Capability parameter shapes are discovered once when a job is constructed
//! and cached as strategy enums. Executors consult the cached strategy on
//! every call instead of re-inspecting the capability per item.

use crate::item::Item;
use crate::traits::{Metric, MetricArgs, MetricArity, ParameterShape, TaskInvoker};
use serde_json::{json, Value};

/// How an item is turned into the task invocation payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgBinding {
    /// Pass the item input through unchanged
    Input,
    /// Pass the input's fields as a named-field object; non-object inputs
    /// are wrapped under an `input` key
    Fields,
    /// Pass the whole item (input, expected, metadata) as one object
    Item,
}

impl ArgBinding {
    /// Resolve the strategy for a capability's advertised shape
    pub fn resolve(invoker: &dyn TaskInvoker) -> Self {
        match invoker.parameter_shape() {
            ParameterShape::Single => ArgBinding::Input,
            ParameterShape::NamedFields => ArgBinding::Fields,
            ParameterShape::WholeItem => ArgBinding::Item,
        }
    }

    /// Build the invocation payload for one item under this strategy
    pub fn payload(&self, item: &Item) -> Value {
        match self {
            ArgBinding::Input => item.input.clone(),
            ArgBinding::Fields => match &item.input {
                Value::Object(_) => item.input.clone(),
                other => json!({ "input": other }),
            },
            ArgBinding::Item => json!({
                "input": item.input,
                "expected": item.expected,
                "metadata": item.metadata,
            }),
        }
    }
}

/// Which argument set a metric receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricBinding {
    /// Output alone
    OutputOnly,
    /// Output plus the item's expected output
    OutputExpected,
    /// Output, expected output, and input
    Full,
}

impl MetricBinding {
    /// Resolve the strategy for a metric's advertised arity
    pub fn resolve(metric: &dyn Metric) -> Self {
        match metric.arity() {
            MetricArity::OutputOnly => MetricBinding::OutputOnly,
            MetricArity::OutputExpected => MetricBinding::OutputExpected,
            MetricArity::Full => MetricBinding::Full,
        }
    }

    /// Assemble the argument set for one computation under this strategy
    pub fn args<'a>(&self, output: &'a Value, item: &'a Item) -> MetricArgs<'a> {
        match self {
            MetricBinding::OutputOnly => MetricArgs {
                output,
                expected: None,
                input: None,
            },
            MetricBinding::OutputExpected => MetricArgs {
                output,
                expected: item.expected.as_ref(),
                input: None,
            },
            MetricBinding::Full => MetricArgs {
                output,
                expected: item.expected.as_ref(),
                input: Some(&item.input),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_binding_passes_through() {
        let item = Item::new(0, json!({"question": "2+2?"}));
        let payload = ArgBinding::Input.payload(&item);
        assert_eq!(payload, json!({"question": "2+2?"}));
    }

    #[test]
    fn test_fields_binding_wraps_scalars() {
        let object = Item::new(0, json!({"a": 1}));
        assert_eq!(ArgBinding::Fields.payload(&object), json!({"a": 1}));

        let scalar = Item::new(0, json!("plain"));
        assert_eq!(
            ArgBinding::Fields.payload(&scalar),
            json!({"input": "plain"})
        );
    }

    #[test]
    fn test_item_binding_carries_whole_item() {
        let item = Item::new(0, json!("in")).with_expected(json!("out"));
        let payload = ArgBinding::Item.payload(&item);
        assert_eq!(payload["input"], json!("in"));
        assert_eq!(payload["expected"], json!("out"));
        assert!(payload["metadata"].is_object());
    }

    #[test]
    fn test_metric_binding_argument_sets() {
        let item = Item::new(0, json!("in")).with_expected(json!("out"));
        let output = json!("answer");

        let args = MetricBinding::OutputOnly.args(&output, &item);
        assert!(args.expected.is_none());
        assert!(args.input.is_none());

        let args = MetricBinding::OutputExpected.args(&output, &item);
        assert_eq!(args.expected, Some(&json!("out")));
        assert!(args.input.is_none());

        let args = MetricBinding::Full.args(&output, &item);
        assert_eq!(args.expected, Some(&json!("out")));
        assert_eq!(args.input, Some(&json!("in")));
    }
}
