// ==========================================
// 孵化机产能分配系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{AllocationLedger, CapacityApi, MachineLockRegistry, MasterDataApi, QaApi};
use crate::config::config_manager::ConfigManager;
use crate::db::open_and_init;
use crate::repository::{AllocationRepository, BatchRepository, MachineRepository, QaRepository};

/// 应用状态
///
/// 包含所有API实例和共享资源；各仓储共用一个连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 主数据API（机器/批次登记）
    pub master_data_api: Arc<MasterDataApi>,

    /// 分配账本
    pub allocation_ledger: Arc<AllocationLedger>,

    /// 产能查询API
    pub capacity_api: Arc<CapacityApi>,

    /// QA 追溯API
    pub qa_api: Arc<QaApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并幂等建表
    /// 2. 初始化所有Repository
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_and_init(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let machine_repo = Arc::new(MachineRepository::from_connection(conn.clone()));
        let batch_repo = Arc::new(BatchRepository::from_connection(conn.clone()));
        let allocation_repo = Arc::new(AllocationRepository::from_connection(conn.clone()));
        let qa_repo = Arc::new(QaRepository::from_connection(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let locks = Arc::new(MachineLockRegistry::new());

        let master_data_api = Arc::new(MasterDataApi::new(machine_repo.clone(), batch_repo.clone()));
        let allocation_ledger = Arc::new(AllocationLedger::new(
            machine_repo.clone(),
            batch_repo,
            allocation_repo.clone(),
            locks,
        ));
        let capacity_api = Arc::new(CapacityApi::new(
            machine_repo.clone(),
            allocation_repo.clone(),
            config_manager.clone(),
        ));
        let qa_api = Arc::new(QaApi::new(
            machine_repo,
            allocation_repo,
            qa_repo,
            config_manager.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            master_data_api,
            allocation_ledger,
            capacity_api,
            qa_api,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 HATCHERY_ALLOC_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("HATCHERY_ALLOC_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./hatchery_alloc.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("hatchery-alloc");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("hatchery_alloc.db");
        }
    }

    path.to_string_lossy().to_string()
}
