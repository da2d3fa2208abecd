//! Built-in task capability and metrics for dry runs
//!
//! The echo invoker returns each item's payload unchanged, optionally after
//! a simulated delay taken from the target options. Together with the
//! string metrics below it lets a batch file be exercised end to end without
//! any external task backend.

use async_trait::async_trait;
use evalstream_core::{
    InvokeContext, InvokeError, Metric, MetricArgs, MetricError, TaskInvoker,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Task capability that echoes the payload back
///
/// Honors a `delay_ms` target option to simulate backend latency.
#[derive(Debug, Default)]
pub struct EchoInvoker;

#[async_trait]
impl TaskInvoker for EchoInvoker {
    fn name(&self) -> &str {
        "echo"
    }

    async fn invoke(&self, payload: Value, ctx: &InvokeContext) -> Result<Value, InvokeError> {
        if let Some(delay_ms) = ctx.target_options.get("delay_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        Ok(payload)
    }
}

/// Scores 1.0 when the output equals the expected output
struct ExactMatch;

#[async_trait]
impl Metric for ExactMatch {
    fn name(&self) -> &str {
        "exact_match"
    }

    async fn compute(&self, args: MetricArgs<'_>) -> Result<f64, MetricError> {
        let expected = args.expected.ok_or(MetricError::MissingExpected)?;
        Ok(if args.output == expected { 1.0 } else { 0.0 })
    }
}

/// Scores 1.0 when the output string contains the expected string
struct Contains;

#[async_trait]
impl Metric for Contains {
    fn name(&self) -> &str {
        "contains"
    }

    async fn compute(&self, args: MetricArgs<'_>) -> Result<f64, MetricError> {
        let expected = args.expected.ok_or(MetricError::MissingExpected)?;
        let output = args.output.as_str().ok_or_else(|| {
            MetricError::UnsupportedShape("output is not a string".to_string())
        })?;
        let needle = expected.as_str().ok_or_else(|| {
            MetricError::UnsupportedShape("expected output is not a string".to_string())
        })?;
        Ok(if output.contains(needle) { 1.0 } else { 0.0 })
    }
}

/// Look up a built-in metric by name
pub fn metric_by_name(name: &str) -> Option<Arc<dyn Metric>> {
    match name {
        "exact_match" => Some(Arc::new(ExactMatch)),
        "contains" => Some(Arc::new(Contains)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_echo_returns_payload() {
        let invoker = EchoInvoker;
        let ctx = InvokeContext::default();
        let output = invoker.invoke(json!("hello"), &ctx).await.unwrap();
        assert_eq!(output, json!("hello"));
    }

    #[tokio::test]
    async fn test_exact_match_scores() {
        let metric = metric_by_name("exact_match").unwrap();
        let output = json!("4");
        let expected = json!("4");

        let args = MetricArgs {
            output: &output,
            expected: Some(&expected),
            input: None,
        };
        assert_eq!(metric.compute(args).await.unwrap(), 1.0);

        let wrong = json!("5");
        let args = MetricArgs {
            output: &wrong,
            expected: Some(&expected),
            input: None,
        };
        assert_eq!(metric.compute(args).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_exact_match_requires_expected() {
        let metric = metric_by_name("exact_match").unwrap();
        let output = json!("4");
        let args = MetricArgs {
            output: &output,
            expected: None,
            input: None,
        };
        assert!(matches!(
            metric.compute(args).await,
            Err(MetricError::MissingExpected)
        ));
    }

    #[tokio::test]
    async fn test_contains_rejects_non_strings() {
        let metric = metric_by_name("contains").unwrap();
        let output = json!(42);
        let expected = json!("4");
        let args = MetricArgs {
            output: &output,
            expected: Some(&expected),
            input: None,
        };
        assert!(matches!(
            metric.compute(args).await,
            Err(MetricError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn test_unknown_metric_name() {
        assert!(metric_by_name("bleu").is_none());
    }
}
