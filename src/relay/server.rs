//! 常驻中继服务
//!
//! 一个路径、一个资源，所有方法都交给 [`RelayHandler`] 处理，
//! 保证与单次调用形态的行为完全一致。

use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer};
use tracing::{info, warn};

use super::{Relay, RelayHandler, RelayReply};
use crate::config::{AppConfig, Credential};

impl From<RelayReply> for HttpResponse {
    fn from(reply: RelayReply) -> Self {
        let status =
            StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = HttpResponse::build(status);
        for header in reply.headers {
            builder.insert_header(header);
        }

        match reply.body {
            Some(body) => builder.json(body),
            None => builder.finish(),
        }
    }
}

/// 请求体上限（字节）
#[derive(Debug, Clone, Copy)]
struct BodyLimit(usize);

async fn analyze(
    req: HttpRequest,
    payload: web::Payload,
    limit: web::Data<BodyLimit>,
    handler: web::Data<RelayHandler>,
) -> HttpResponse {
    // 自己读取请求体，超限时也走 RelayReply，保留 CORS 头和 {"error"} 响应体
    let body = match payload.to_bytes_limited(limit.0).await {
        Ok(Ok(body)) => body,
        Ok(Err(e)) => {
            warn!("Failed to read request body: {}", e);
            return RelayReply::error(400, format!("Failed to read request body: {}", e)).into();
        }
        Err(_) => {
            warn!("Request body exceeds {} bytes", limit.0);
            return RelayReply::error(
                413,
                format!("Request body exceeds the {} byte limit", limit.0),
            )
            .into();
        }
    };

    handler.handle(req.method(), &body).await.into()
}

/// 注册中继路由；`path` 上的所有方法都交给处理器
pub fn configure(cfg: &mut web::ServiceConfig, path: &str, max_body_bytes: usize) {
    cfg.service(
        web::resource(path)
            .app_data(web::Data::new(BodyLimit(max_body_bytes)))
            .route(web::route().to(analyze)),
    );
}

/// 启动常驻中继服务，直到进程退出
pub async fn run(config: AppConfig, credential: Option<Credential>) -> anyhow::Result<()> {
    let relay = Relay::new(config.inference.clone(), credential)?;
    if !relay.has_credential() {
        // 不是致命错误：每个请求会单独返回 500
        warn!(
            "{} is not set; analysis requests will fail until it is configured",
            config.inference.credential_env
        );
    }

    let handler = web::Data::new(RelayHandler::new(relay));
    let server = config.server.clone();
    let path = server.path.clone();
    let max_body_bytes = server.max_body_bytes;

    info!(
        "Relay listening on {}:{}{} (model: {})",
        server.host, server.port, server.path, config.inference.model
    );

    HttpServer::new(move || {
        let path = path.clone();
        App::new()
            .app_data(handler.clone())
            .wrap(middleware::Logger::default())
            .configure(move |cfg| configure(cfg, &path, max_body_bytes))
    })
    .bind((server.host.as_str(), server.port))?
    .run()
    .await?;

    Ok(())
}
