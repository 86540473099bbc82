// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// FileIO 子系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIOConfig {
    /// 任务队列容量（满载时拒绝新任务）
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// 单次提交的数据大小上限（字节）
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
    /// 队列锁获取超时（毫秒），超时即失败关闭
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// 工作线程空闲轮询间隔（毫秒）
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_buffer_size() -> usize {
    64 * 1024 * 1024 // 64MB
}

fn default_lock_timeout_ms() -> u64 {
    250
}

fn default_idle_poll_ms() -> u64 {
    5
}

impl Default for FileIOConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_buffer_size: default_max_buffer_size(),
            lock_timeout_ms: default_lock_timeout_ms(),
            idle_poll_ms: default_idle_poll_ms(),
            log: LogConfig::default(),
        }
    }
}

impl FileIOConfig {
    /// 队列锁获取超时
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// 工作线程空闲轮询间隔
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    /// 从 TOML 文件加载配置
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("解析配置文件失败: {:?}", path))?;
        Ok(config)
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("创建配置目录失败: {:?}", parent))?;
        }
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        std::fs::write(path, content).with_context(|| format!("写入配置文件失败: {:?}", path))?;
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    false
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}
