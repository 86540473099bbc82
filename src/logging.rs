//! 日志系统配置
//!
//! 支持控制台输出和文件持久化（按天滚动），自动清理过期日志。
//!
//! 架构约束：日志设施不依赖 FileIO 子系统（避免循环初始化），
//! 文件落盘由 tracing-appender 直接完成

use crate::config::LogConfig;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "fileio-engine";

/// 初始化日志系统
///
/// 返回的 WorkerGuard 必须在进程生命周期内保持存活，
/// 否则缓冲中的日志会丢失
pub fn init_logging(config: &LogConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string());

    let console_layer = fmt::layer()
        .with_timer(timer.clone())
        .with_target(true)
        .with_thread_names(true);

    // 文件输出（可选）
    let (file_layer, guard) = if config.enabled {
        match fs::create_dir_all(&config.log_dir) {
            Ok(()) => {
                cleanup_expired_logs(&config.log_dir, config.retention_days);

                let appender =
                    tracing_appender::rolling::daily(&config.log_dir, format!("{}.log", LOG_FILE_PREFIX));
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_timer(timer)
                    .with_ansi(false)
                    .with_writer(non_blocking);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("创建日志目录失败，仅输出到控制台: {}", e);
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!(
        "日志系统初始化完成: 级别={}, 文件持久化={}",
        config.level,
        config.enabled
    );

    guard
}

/// 清理超过保留天数的日志文件
///
/// 只处理本组件前缀的文件，目录中的其他文件不受影响
fn cleanup_expired_logs(log_dir: &Path, retention_days: u32) {
    let max_age = Duration::from_secs(u64::from(retention_days) * 24 * 3600);
    let now = SystemTime::now();

    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };

    let mut removed = 0usize;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let is_own_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(LOG_FILE_PREFIX))
            .unwrap_or(false);
        if !is_own_log {
            continue;
        }

        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .map(|age| age > max_age)
            .unwrap_or(false);

        if expired && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }

    if removed > 0 {
        eprintln!("已清理 {} 个过期日志文件", removed);
    }
}
