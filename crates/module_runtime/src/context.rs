//! ModuleContext - 模块在总线上的身份与句柄
//!
//! 构造即连接：域不可达时直接返回错误，不会留下半构造的模块。

use std::sync::Arc;

use contracts::{BusConnector, DomainId, MessageBus, ModuleId, ModuleIdentity, Verbosity};
use tracing::{info, instrument};

use crate::{ModuleLogger, Result};

/// 模块构造参数
#[derive(Debug, Clone)]
pub struct ModuleParams {
    pub module_id: ModuleId,
    pub domain_id: DomainId,
    pub verbosity: Verbosity,
}

impl ModuleParams {
    pub fn new(module_id: impl Into<ModuleId>, domain_id: DomainId) -> Self {
        Self {
            module_id: module_id.into(),
            domain_id,
            verbosity: Verbosity::default(),
        }
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}

/// 已连接的模块上下文
#[derive(Clone)]
pub struct ModuleContext {
    identity: ModuleIdentity,
    bus: Arc<dyn MessageBus>,
    logger: ModuleLogger,
}

impl ModuleContext {
    /// 连接到参数指定的域
    ///
    /// # Errors
    /// 域不可达时返回 `ContractError::BusUnreachable`。
    #[instrument(name = "module_connect", skip(connector), fields(module_id = %params.module_id, domain_id = params.domain_id))]
    pub fn connect(params: ModuleParams, connector: &dyn BusConnector) -> Result<Self> {
        let bus = connector.connect(params.domain_id)?;
        info!("Connected to bus domain");
        Ok(Self::with_bus(params, bus))
    }

    /// 使用已有的总线句柄
    pub fn with_bus(params: ModuleParams, bus: Arc<dyn MessageBus>) -> Self {
        let identity = ModuleIdentity::new(params.module_id, params.domain_id);
        let logger = ModuleLogger::new(identity.module_id.clone(), bus.clone(), params.verbosity);
        Self {
            identity,
            bus,
            logger,
        }
    }

    pub fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    pub fn module_id(&self) -> &ModuleId {
        &self.identity.module_id
    }

    pub fn bus(&self) -> &Arc<dyn MessageBus> {
        &self.bus
    }

    pub fn logger(&self) -> &ModuleLogger {
        &self.logger
    }
}
