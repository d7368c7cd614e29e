//! 中继请求处理
//!
//! 与 HTTP 框架无关的处理逻辑。常驻服务和单次调用两种部署形态
//! 都只做一件事：把方法和请求体交给 [`RelayHandler::handle`]，再把
//! [`RelayReply`] 原样写回。

use actix_web::http::Method;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::Relay;
use crate::error::Error;
use crate::models::AnalysisRequest;

/// 所有响应都带的 CORS 头
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Credentials", "true"),
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Methods",
        "GET,OPTIONS,PATCH,DELETE,POST,PUT",
    ),
    (
        "Access-Control-Allow-Headers",
        "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, Content-Length, Content-MD5, Content-Type, Date, X-Api-Version",
    ),
];

/// 中继响应
#[derive(Debug, Clone, PartialEq)]
pub struct RelayReply {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    /// `None` 表示空响应体
    pub body: Option<serde_json::Value>,
}

impl RelayReply {
    fn new(status: u16, body: Option<serde_json::Value>) -> Self {
        Self {
            status,
            headers: CORS_HEADERS.to_vec(),
            body,
        }
    }

    pub(crate) fn error(status: u16, message: impl Into<String>) -> Self {
        Self::new(
            status,
            Some(serde_json::json!({ "error": message.into() })),
        )
    }

    /// 失败响应中的错误文本
    pub fn error_message(&self) -> Option<&str> {
        self.body.as_ref()?.get("error")?.as_str()
    }
}

impl From<Error> for RelayReply {
    fn from(err: Error) -> Self {
        RelayReply::error(err.status_code(), err.to_string())
    }
}

/// 中继请求处理器
pub struct RelayHandler {
    relay: Relay,
}

impl RelayHandler {
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// 处理一次请求
    ///
    /// 顺序：预检 → 方法检查 → 密钥检查 → 解析请求体 → 转发。
    /// 密钥检查在读取请求体之前，因此未配置密钥时结果与请求内容无关。
    pub async fn handle(&self, method: &Method, body: &[u8]) -> RelayReply {
        if method == Method::OPTIONS {
            return RelayReply::new(200, None);
        }

        if method != Method::POST {
            return RelayReply::error(405, "Method not allowed");
        }

        let request_id = Uuid::new_v4();
        info!("[{}] Analysis request received ({} bytes)", request_id, body.len());

        if let Err(e) = self.relay.ensure_configured() {
            error!("[{}] {}", request_id, e);
            return e.into();
        }

        let request: AnalysisRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                warn!("[{}] Rejecting request body: {}", request_id, e);
                return Error::InvalidRequest(format!("Expected {{\"image\": <base64>}}: {}", e))
                    .into();
            }
        };

        match self.relay.relay(&request).await {
            Ok(response) => {
                info!("[{}] Inference response relayed", request_id);
                RelayReply::new(200, Some(response.into_inner()))
            }
            Err(e) => {
                error!("[{}] Relay failed: {}", request_id, e);
                e.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::tests::{relay_for, spawn_upstream};

    const BODY: &[u8] = br#"{"image":"/9j/4AAQSkZJRg=="}"#;

    fn assert_cors(reply: &RelayReply) {
        for (name, value) in CORS_HEADERS {
            assert!(
                reply.headers.contains(&(name, value)),
                "missing header {}",
                name
            );
        }
    }

    #[actix_web::test]
    async fn test_preflight_without_credential() {
        for key in [None, Some("sk-test")] {
            let handler = RelayHandler::new(relay_for(None, key));
            let reply = handler.handle(&Method::OPTIONS, b"").await;
            assert_eq!(reply.status, 200);
            assert!(reply.body.is_none());
            assert_cors(&reply);
        }
    }

    #[actix_web::test]
    async fn test_other_methods_rejected() {
        let handler = RelayHandler::new(relay_for(None, Some("sk-test")));
        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
            let reply = handler.handle(&method, BODY).await;
            assert_eq!(reply.status, 405);
            assert_eq!(reply.error_message(), Some("Method not allowed"));
            assert_cors(&reply);
        }
    }

    #[actix_web::test]
    async fn test_missing_credential_ignores_payload() {
        let handler = RelayHandler::new(relay_for(None, None));
        let bodies: [&[u8]; 3] = [BODY, b"", b"not json"];
        for body in bodies {
            let reply = handler.handle(&Method::POST, body).await;
            assert_eq!(reply.status, 500);
            assert!(reply.error_message().is_some());
            assert_cors(&reply);
        }
    }

    #[actix_web::test]
    async fn test_invalid_body() {
        let handler = RelayHandler::new(relay_for(None, Some("sk-test")));
        let bodies: [&[u8]; 3] = [b"not json", br#"{"picture":"abc"}"#, br#"{"image":42}"#];
        for body in bodies {
            let reply = handler.handle(&Method::POST, body).await;
            assert_eq!(reply.status, 400);
            assert!(reply.error_message().is_some());
        }
    }

    #[actix_web::test]
    async fn test_upstream_status_mirrored() {
        let addr = spawn_upstream(529, r#"overloaded: try later"#).await;
        let handler = RelayHandler::new(relay_for(Some(addr), Some("sk-test")));

        let reply = handler.handle(&Method::POST, BODY).await;
        assert_eq!(reply.status, 529);
        assert!(reply
            .error_message()
            .unwrap()
            .contains("overloaded: try later"));
        assert_cors(&reply);
    }

    #[actix_web::test]
    async fn test_success_returns_envelope() {
        let envelope = r#"{"content":[{"type":"text","text":"hi"}],"stop_reason":"end_turn"}"#;
        let addr = spawn_upstream(200, envelope).await;
        let handler = RelayHandler::new(relay_for(Some(addr), Some("sk-test")));

        let reply = handler.handle(&Method::POST, BODY).await;
        assert_eq!(reply.status, 200);
        assert_eq!(
            reply.body,
            Some(serde_json::from_str::<serde_json::Value>(envelope).unwrap())
        );
    }

    #[actix_web::test]
    async fn test_transport_failure_is_500() {
        let handler = RelayHandler::new(relay_for(None, Some("sk-test")));
        let reply = handler.handle(&Method::POST, BODY).await;
        assert_eq!(reply.status, 500);
        assert!(reply
            .error_message()
            .unwrap()
            .starts_with("Inference request failed"));
    }
}
