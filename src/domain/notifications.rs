use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::errors::McpError;
use crate::mcp::envelope::UI_NOTIFICATION_FAMILY_KEY;
use crate::mcp::server::{redact_audit_params, MethodHandler, Outcome, RequestContext};

/// Handles `notifications/<type>` and `ui/notifications/<type>`: log and acknowledge.
pub struct NotificationHandler;

#[async_trait]
impl MethodHandler for NotificationHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<Outcome, McpError> {
        let kind = ctx.route.notification_type.as_deref().unwrap_or_default();
        let params = match redact_audit_params(ctx.params.as_ref()) {
            Value::Null => Value::Object(Map::new()),
            params => params,
        };

        info!(
            notification_type = kind,
            from_ui = ctx.route.key == UI_NOTIFICATION_FAMILY_KEY,
            params = %params,
            "mcp notification received"
        );

        Ok(Outcome::Acknowledged)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::system::tests::context;

    #[tokio::test]
    async fn notifications_are_acknowledged() {
        for method in ["notifications/initialized", "ui/notifications/size-changed"] {
            let outcome = NotificationHandler
                .handle(&context(method, Some(json!({"width": 300}))))
                .await
                .expect("acknowledged");
            assert_eq!(outcome, Outcome::Acknowledged);
        }
    }
}
