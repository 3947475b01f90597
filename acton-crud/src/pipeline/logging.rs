//! Method call logging
//!
//! Logs the operation and its arguments before the wrapped call and the
//! result or error afterwards. Errors are always returned unchanged.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};

use crate::entity::Identified;
use crate::error::Error;
use crate::service::{Operation, OperationSet};

/// Logging middleware for CRUD operations
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    name: Arc<str>,
    operations: OperationSet,
}

impl LoggingLayer {
    /// Log every operation under the given service name
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            operations: OperationSet::all(),
        }
    }

    /// Only log the given operations
    #[must_use]
    pub fn only(mut self, operations: OperationSet) -> Self {
        self.operations = operations;
        self
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService {
            inner,
            name: Arc::clone(&self.name),
            operations: self.operations,
        }
    }
}

/// Logging service implementation
#[derive(Debug, Clone)]
pub struct LoggingService<S> {
    inner: S,
    name: Arc<str>,
    operations: OperationSet,
}

impl<S, T, F> Service<Operation<T, F>> for LoggingService<S>
where
    S: Service<Operation<T, F>, Error = Error> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: fmt::Debug,
    T: Identified + fmt::Debug + Send + 'static,
    F: fmt::Debug + Send + 'static,
{
    type Response = S::Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, operation: Operation<T, F>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let method = operation.kind();

        if !self.operations.contains(method) {
            return Box::pin(inner.call(operation));
        }

        let name = Arc::clone(&self.name);
        tracing::debug!(service = %name, method = %method, args = ?operation, "method call");

        Box::pin(async move {
            let start = Instant::now();
            let result = inner.call(operation).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(value) => {
                    tracing::debug!(
                        service = %name,
                        method = %method,
                        result = ?value,
                        duration_ms,
                        "method finish"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        service = %name,
                        method = %method,
                        error = %e,
                        error_code = %e.error_code(),
                        duration_ms,
                        "method failed"
                    );
                }
            }

            result
        })
    }
}
