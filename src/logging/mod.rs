//! Operator log and HTTP access log.
//!
//! The operator log is the merchant-facing log: messages written there are
//! the lines a shop owner reads in the storefront admin (payment method
//! mismatches, unprocessed callbacks, vendor errors in debug mode). It is
//! backed by `slog`; diagnostics for developers go through `tracing`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use slog::{o, Drain, Logger};
use slog_async::Async;
use slog_term::{FullFormat, TermDecorator};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Configuration for setting up the logger
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub async_buffer_size: usize,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            async_buffer_size: 1024,
            use_color: true,
        }
    }
}

/// Sets up a terminal logger with an async drain
pub fn setup_logger(config: LoggerConfig) -> Logger {
    let decorator = {
        let builder = TermDecorator::new();
        let builder = if config.use_color {
            builder.force_color()
        } else {
            builder
        };
        builder.build()
    };

    let drain = FullFormat::new(decorator).build().fuse();

    let drain = Async::new(drain)
        .chan_size(config.async_buffer_size)
        .build()
        .fuse();

    Logger::root(
        drain,
        o!("version" => env!("CARGO_PKG_VERSION"), "log" => "multisafepay"),
    )
}

/// Sink for merchant-visible log lines.
pub trait OperatorLog: Send + Sync {
    fn write(&self, message: &str);
}

/// Operator log backed by a `slog` logger.
#[derive(Clone)]
pub struct SlogOperatorLog {
    logger: Logger,
}

impl SlogOperatorLog {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl OperatorLog for SlogOperatorLog {
    fn write(&self, message: &str) {
        slog::info!(&self.logger, "{}", message);
    }
}

/// Operator log that keeps lines in memory.
#[derive(Default)]
pub struct MemoryOperatorLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryOperatorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl OperatorLog for MemoryOperatorLog {
    fn write(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }
}

/// State struct for logging middleware
#[derive(Clone)]
pub struct LoggingState {
    logger: Logger,
}

impl LoggingState {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

/// Access log middleware
pub async fn logging_middleware(
    axum::extract::State(state): axum::extract::State<Arc<LoggingState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let start_time = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let status = response.status().as_u16();
    let duration_ms: u128 = start_time.elapsed().as_millis();

    slog::info!(
        &state.logger,
        "HTTP request handled";
        "method" => method,
        "path" => path,
        "status" => status,
        "duration_ms" => duration_ms,
    );

    Ok(response)
}
