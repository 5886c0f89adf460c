//! HTTP handler for the API Gateway authorizer.

use axum::{Json, body::Bytes, extract::State};
use tracing::{instrument, warn};

use crate::AppState;
use crate::auth::authorizer::ANONYMOUS_PRINCIPAL;
use crate::auth::policy::{AuthorizerRequest, Effect, PolicyResponse};

/// Evaluate a REQUEST authorizer event.
///
/// Always answers 200: API Gateway treats anything else as an authorizer failure, so denials
/// are expressed in the policy document. A body that is not an authorizer event is denied on
/// every resource.
#[instrument(skip_all)]
pub async fn authorize(State(state): State<AppState>, body: Bytes) -> Json<PolicyResponse> {
    let request: AuthorizerRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "authorizer: malformed event");
            return Json(PolicyResponse::new(ANONYMOUS_PRINCIPAL, Effect::Deny, "*"));
        }
    };

    Json(state.authorizer.authorize(&request).await)
}

#[cfg(test)]
mod tests {
    use crate::auth::policy::{Effect, PolicyResponse};
    use crate::config::WebhooksConfig;
    use crate::secrets::memory::StaticSecretStore;
    use crate::test_utils::{create_test_server, test_tenant};
    use axum::http::StatusCode;
    use serde_json::json;

    const ARN_PREFIX: &str = "arn:aws:execute-api:eu-west-1:123456789012:abc123/prod";

    fn server() -> axum_test::TestServer {
        let secrets = StaticSecretStore::default().with_secret(
            "tenant-TestMerchant-config",
            json!({ "apiKey": "storefront-key", "ipAllowlist": ["198.51.100.0/24"] }).to_string(),
        );
        create_test_server(
            vec![test_tenant("TestMerchant")],
            Default::default(),
            secrets,
            WebhooksConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_public_route_is_allowed() {
        let response = server()
            .post("/authorize")
            .json(&json!({ "methodArn": format!("{ARN_PREFIX}/GET/health") }))
            .await;

        response.assert_status(StatusCode::OK);
        let policy: PolicyResponse = response.json();
        assert_eq!(policy.effect(), Some(Effect::Allow));
        assert_eq!(policy.principal_id, "anonymous");
    }

    #[tokio::test]
    async fn test_api_key_route() {
        let server = server();
        let event = |ip: &str| {
            json!({
                "methodArn": format!("{ARN_PREFIX}/POST/api/paymentmethods"),
                "headers": { "X-Api-Key": "storefront-key" },
                "queryStringParameters": { "merchantAccount": "TestMerchant" },
                "requestContext": { "identity": { "sourceIp": ip } }
            })
        };

        let policy: PolicyResponse = server.post("/authorize").json(&event("198.51.100.20")).await.json();
        assert_eq!(policy.effect(), Some(Effect::Allow));
        assert_eq!(policy.principal_id, "TestMerchant");

        let policy: PolicyResponse = server.post("/authorize").json(&event("192.0.2.1")).await.json();
        assert_eq!(policy.effect(), Some(Effect::Deny));
        assert_eq!(policy.principal_id, "anonymous");
        assert_eq!(
            policy.policy_document.statement[0].resource,
            vec![format!("{ARN_PREFIX}/POST/api/paymentmethods")]
        );
    }

    #[tokio::test]
    async fn test_malformed_event_is_denied() {
        let response = server().post("/authorize").text("not an event").await;

        response.assert_status(StatusCode::OK);
        let policy: PolicyResponse = response.json();
        assert_eq!(policy.effect(), Some(Effect::Deny));
        assert_eq!(policy.policy_document.statement[0].resource, vec!["*".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_arn_is_denied() {
        let response = server().post("/authorize").json(&json!({ "headers": {} })).await;

        let body: serde_json::Value = response.json();
        assert_eq!(body["principalId"], "anonymous");
        assert_eq!(body["policyDocument"]["Version"], "2012-10-17");
        assert_eq!(body["policyDocument"]["Statement"][0]["Effect"], "Deny");
        assert_eq!(body["policyDocument"]["Statement"][0]["Action"][0], "execute-api:Invoke");
        assert_eq!(body["policyDocument"]["Statement"][0]["Resource"][0], "*");
    }
}
