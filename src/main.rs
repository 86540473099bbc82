// FileIO 引擎演示程序
//
// 加载配置、初始化日志，跑一轮典型的提交 -> 轮询流程

use std::sync::Arc;
use std::time::{Duration, Instant};

use fileio_engine_rust::{
    logging, FileIOConfig, FileIOManager, TaskId, TaskPriority, ZipCompressor,
};
use tracing::{info, warn};

/// 加载配置
///
/// 尝试从配置文件加载，失败时返回默认配置
fn load_config() -> FileIOConfig {
    let config_path = "config/fileio.toml";
    match FileIOConfig::load_from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("加载配置失败（{}），使用默认配置", e);
            FileIOConfig::default()
        }
    }
}

/// 轮询直到任务完成或超时
fn wait_for(manager: &FileIOManager, task_id: TaskId, timeout: Duration) -> Option<bool> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(success) = manager.is_task_completed(task_id) {
            return Some(success);
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    None
}

fn main() -> anyhow::Result<()> {
    let config = load_config();

    // 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&config.log);

    info!("FileIO 引擎演示启动");

    let manager = FileIOManager::new(config, Arc::new(ZipCompressor::new()));
    manager.initialize()?;
    manager.start_worker()?;

    let demo_path = std::env::temp_dir().join("fileio-engine-demo.dat");
    let demo_path = demo_path.to_string_lossy().to_string();
    let payload = "演示数据 demo payload ".repeat(64).into_bytes();

    // 压缩写入
    let write_id = manager
        .stream_write_file(&demo_path, payload.clone(), true, TaskPriority::High)
        .map_err(|e| anyhow::anyhow!("提交写入任务失败: {}", e))?;
    info!("写入任务已提交: task_id={}", write_id);

    // 解压读取
    let read_id = manager
        .stream_read_file(&demo_path, true, TaskPriority::Normal)
        .map_err(|e| anyhow::anyhow!("提交读取任务失败: {}", e))?;

    // 查询当前目录
    let cwd_id = manager
        .get_current_directory(TaskPriority::Low)
        .map_err(|e| anyhow::anyhow!("提交目录查询任务失败: {}", e))?;

    for (name, task_id) in [("写入", write_id), ("读取", read_id), ("目录查询", cwd_id)] {
        match wait_for(&manager, task_id, Duration::from_secs(5)) {
            Some(true) => info!("{}任务完成: task_id={}", name, task_id),
            Some(false) => {
                let detail = manager
                    .get_error_status(task_id)
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "未知错误".to_string());
                warn!("{}任务失败: task_id={}, 错误={}", name, task_id, detail);
            }
            None => warn!("{}任务等待超时: task_id={}", name, task_id),
        }
    }

    if let Some(snapshot) = manager.get_completed_task(read_id) {
        info!(
            "读取结果: {} 字节, 与写入数据一致: {}",
            snapshot.read_buffer.len(),
            snapshot.read_buffer == payload
        );
    }

    if let Some(snapshot) = manager.get_completed_task(cwd_id) {
        info!("当前目录: {}", String::from_utf8_lossy(&snapshot.read_buffer));
    }

    let stats = manager.stats();
    info!(
        "统计: 已处理={}, 读取={} 字节, 写入={} 字节, 失败={}",
        stats.tasks_processed, stats.bytes_read, stats.bytes_written, stats.failures
    );

    // 清理演示文件
    let delete_id = manager
        .delete_file(&demo_path, TaskPriority::Normal)
        .map_err(|e| anyhow::anyhow!("提交删除任务失败: {}", e))?;
    wait_for(&manager, delete_id, Duration::from_secs(5));

    manager.stop_worker();
    manager.cleanup();
    info!("FileIO 引擎演示结束");
    Ok(())
}
