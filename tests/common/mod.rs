//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use voice_dispatch::{
    CommandHandler, CommandService, CommandValidator, Config, HandlerError, HandlerReply, InitOptions,
    Verdict,
};

/// Config that admits commands without a validator
#[must_use]
pub fn dev_config() -> Config {
    let mut config = Config::default();
    config.security.insecure_dev_mode = true;
    config
}

/// Create and initialize a service
pub fn init_service(config: Config, options: InitOptions) -> CommandService {
    let service = CommandService::new(config);
    service.initialize(options).expect("failed to initialize service");
    service
}

/// Handler that counts invocations and echoes its params
#[derive(Debug, Default)]
pub struct CountingHandler {
    calls: AtomicU32,
}

impl CountingHandler {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandHandler for CountingHandler {
    async fn handle(&self, params: &[String], _context: &str) -> Result<HandlerReply, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HandlerReply::ok(&params.join(" ")))
    }
}

/// Handler that always fails with the same error
#[derive(Debug)]
pub struct FailingHandler {
    message: &'static str,
    calls: AtomicU32,
}

impl FailingHandler {
    #[must_use]
    pub fn new(message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            message,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandHandler for FailingHandler {
    async fn handle(&self, _params: &[String], _context: &str) -> Result<HandlerReply, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(HandlerError::new(self.message))
    }
}

/// Validator that returns a fixed verdict
pub struct FixedValidator(pub Verdict);

#[async_trait]
impl CommandValidator for FixedValidator {
    async fn validate_command(&self, _text: &str) -> anyhow::Result<Verdict> {
        Ok(self.0.clone())
    }
}
