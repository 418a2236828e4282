// ==========================================
// 孵化机产能分配系统 - 机器写锁注册表
// ==========================================
// 职责: 同一机器（及同一批次）的写入串行化
// 红线: 多把锁一律按键排序后加锁，避免死锁
// 说明: 进程内锁只负责串行化，跨进程的重叠仍由数据库触发器拒绝
// ==========================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 批次键前缀（与机器键共用同一注册表）
const BATCH_KEY_PREFIX: &str = "batch:";

#[derive(Default)]
pub struct MachineLockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MachineLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 批次在注册表中的键
    pub fn batch_key(batch_id: &str) -> String {
        format!("{}{}", BATCH_KEY_PREFIX, batch_id)
    }

    fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        // 锁内只有 ()，中毒不影响数据，直接取回
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 持有全部键的锁执行 f
    pub fn with_locks<T, F>(&self, keys: &[String], f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let mut sorted: Vec<&str> = keys.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let handles: Vec<Arc<Mutex<()>>> = sorted.iter().map(|k| self.handle(k)).collect();
        let guards: Vec<_> = handles
            .iter()
            .map(|h| h.lock().unwrap_or_else(|e| e.into_inner()))
            .collect();

        let result = f();
        drop(guards);
        drop(handles);
        self.release_batch_keys(&sorted);
        result
    }

    /// 批次键用完即删，注册表只常驻机器键
    ///
    /// 引用计数为 1 说明只剩注册表持有，没有线程在等这把锁
    fn release_batch_keys(&self, keys: &[&str]) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        for key in keys.iter().filter(|k| k.starts_with(BATCH_KEY_PREFIX)) {
            if locks.get(*key).is_some_and(|h| Arc::strong_count(h) == 1) {
                locks.remove(*key);
            }
        }
    }

    /// 已登记的键数量
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
