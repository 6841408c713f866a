use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Instant;

/// Request logging middleware.
/// Emits one structured event when a request starts and one when it
/// completes, with status and latency. Bodies are never logged: they carry
/// passwords and tokens.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();

        tracing::info!(method = %method, path = %path, "Request started");

        let service = self.service.clone();

        Box::pin(async move {
            let res = service.call(req).await?;

            let status = res.status();
            let elapsed_ms = start_time.elapsed().as_millis() as u64;

            if status.is_server_error() {
                tracing::error!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    elapsed_ms,
                    "Request failed"
                );
            } else {
                tracing::info!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    elapsed_ms,
                    "Request completed"
                );
            }

            Ok(res)
        })
    }
}
