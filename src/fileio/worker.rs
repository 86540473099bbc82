// FileIO 工作线程
//
// 队列的唯一消费者：循环出队、按命令分发到文件系统原语、
// 经压缩协作者打包/解包、把终态写入已完成任务表与错误状态表。
// 单线程串行执行，同一文件的操作在本子系统内不会互相竞争

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::compression::{CompressionService, PackMode};

use super::queue::TaskQueue;
use super::task::FileTask;
use super::types::{
    CompletedTask, FileCommand, FileIOStats, FileType, TaskError, TaskErrorKind, TaskId,
    WritePosition,
};

/// 统计计数器（原子，仅供参考）
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub tasks_processed: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
    pub failures: AtomicU64,
    /// 工作线程当前是否正在执行任务（供排空屏障观测）
    pub worker_busy: AtomicBool,
}

impl StatsCounters {
    pub fn snapshot(&self) -> FileIOStats {
        FileIOStats {
            tasks_processed: self.tasks_processed.load(Ordering::SeqCst),
            bytes_read: self.bytes_read.load(Ordering::SeqCst),
            bytes_written: self.bytes_written.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
        }
    }
}

/// 工作线程共享上下文
pub(crate) struct WorkerContext {
    pub queue: Arc<TaskQueue>,
    pub completed: Arc<DashMap<TaskId, CompletedTask>>,
    pub errors: Arc<DashMap<TaskId, TaskError>>,
    pub compressor: Arc<dyn CompressionService>,
    pub stats: Arc<StatsCounters>,
    pub running: Arc<AtomicBool>,
    pub idle_poll: Duration,
}

/// 工作线程主循环
///
/// 空闲时短暂休眠后重试；收到停止信号后退出，队列中剩余任务被静默丢弃
pub(crate) fn run_worker(ctx: WorkerContext) {
    info!("FileIO 工作线程已启动");

    while ctx.running.load(Ordering::SeqCst) {
        // 先置忙再出队：忙标志为假时队列里不可能有已弹出但未执行的任务，
        // 排空屏障据此判定"队列空且不忙"即无任务在途
        ctx.stats.worker_busy.store(true, Ordering::SeqCst);
        let Some(task) = ctx.queue.dequeue() else {
            ctx.stats.worker_busy.store(false, Ordering::SeqCst);
            std::thread::sleep(ctx.idle_poll);
            continue;
        };

        process_task(&ctx, task);
    }

    ctx.stats.worker_busy.store(false, Ordering::SeqCst);
    info!("FileIO 工作线程已退出");
}

/// 执行单个任务并记录终态
///
/// 处理器主体包裹在 panic 边界内：任何意外运行时故障被就地捕获、
/// 转换为 Unknown 错误并作为任务失败上报，工作线程本身绝不因单个任务而终止
fn process_task(ctx: &WorkerContext, mut task: FileTask) {
    debug!(
        "开始执行任务: task_id={}, 命令={}",
        task.task_id,
        task.command.description()
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        execute_command(&mut task, ctx.compressor.as_ref(), &ctx.stats)
    }))
    .unwrap_or_else(|payload| {
        Err(TaskError::new(TaskErrorKind::Unknown).with_message(panic_message(payload.as_ref())))
    });

    complete_task(ctx, task, outcome);
}

/// 记录任务完成
///
/// 终态快照进入已完成任务表；失败时错误详情额外进入错误状态表。
/// 两张表各自独立加锁，互不阻塞，本子系统内同一时刻最多持有其中一把锁
fn complete_task(ctx: &WorkerContext, mut task: FileTask, outcome: Result<(), TaskError>) {
    match outcome {
        Ok(()) => task.mark_succeeded(),
        Err(err) => {
            warn!(
                "任务执行失败: task_id={}, 命令={}, 错误码={}, 详情={}",
                task.task_id,
                task.command.description(),
                err.kind.code(),
                err
            );
            ctx.stats.failures.fetch_add(1, Ordering::SeqCst);
            task.mark_failed(err);
        }
    }

    let snapshot = task.snapshot();
    match serde_json::to_string(&snapshot) {
        Ok(json) => debug!("任务终态快照: {}", json),
        Err(e) => warn!("序列化任务快照失败: task_id={}, error={}", task.task_id, e),
    }

    if let Some(error) = task.error_status.take() {
        ctx.errors.insert(task.task_id, error);
    }
    ctx.completed.insert(task.task_id, snapshot);
    ctx.stats.tasks_processed.fetch_add(1, Ordering::SeqCst);
}

/// 从 panic 负载中提取错误信息
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "任务执行过程中发生未知运行时故障".to_string()
    }
}

/// 按命令分发到具体处理器
fn execute_command(
    task: &mut FileTask,
    compressor: &dyn CompressionService,
    stats: &StatsCounters,
) -> Result<(), TaskError> {
    match task.command {
        FileCommand::Delete => handle_delete(task),
        FileCommand::GetSize => handle_get_size(task),
        FileCommand::Exists => handle_exists(task),
        FileCommand::AppendToFile => handle_append(task, stats),
        FileCommand::StreamWrite => handle_stream_write(task, compressor, stats),
        FileCommand::StreamRead => handle_stream_read(task, compressor, stats),
        FileCommand::GetCurrentDirectory => handle_current_directory(task),
        FileCommand::Rename => handle_rename(task),
        FileCommand::DeleteLine => handle_delete_line(task, stats),
        FileCommand::CopyTo => handle_copy_to(task, stats),
        FileCommand::MoveTo => handle_move_to(task),
        FileCommand::InjectCustom => handle_inject_custom(task, compressor),
        FileCommand::None => Ok(()),
    }
}

/// 删除文件
fn handle_delete(task: &mut FileTask) -> Result<(), TaskError> {
    fs::remove_file(&task.primary_filename).map_err(|e| {
        TaskError::new(TaskErrorKind::FileNotFound)
            .with_path(&task.primary_filename)
            .with_message(format!("删除文件失败: {}", e))
    })
}

/// 查询文件大小，结果以小端 u64 原始字节写入 read_buffer
fn handle_get_size(task: &mut FileTask) -> Result<(), TaskError> {
    let metadata = fs::metadata(&task.primary_filename)
        .map_err(|_| TaskError::new(TaskErrorKind::FileNotFound).with_path(&task.primary_filename))?;
    task.read_buffer = metadata.len().to_le_bytes().to_vec();
    Ok(())
}

/// 存在性检查
///
/// 处理器层面总是成功：布尔结果本身（而非文件是否存在）才是负载
fn handle_exists(task: &mut FileTask) -> Result<(), TaskError> {
    let exists = Path::new(&task.primary_filename).exists();
    task.read_buffer = vec![u8::from(exists)];
    Ok(())
}

/// 追加写入
///
/// End：以追加模式打开直接写入。
/// Front：读出整个现有文件，写入新数据后再写回旧数据——整文件重写，
/// 不是真正的头部插入（保留原始语义，大文件上的开销是已知行为）
fn handle_append(task: &mut FileTask, stats: &StatsCounters) -> Result<(), TaskError> {
    let path = &task.primary_filename;
    let access_denied = |e: std::io::Error| {
        TaskError::new(TaskErrorKind::AccessDenied)
            .with_path(path)
            .with_message(format!("追加写入失败: {}", e))
    };

    match task.position {
        WritePosition::End => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(access_denied)?;
            file.write_all(&task.write_buffer).map_err(access_denied)?;
        }
        WritePosition::Front => {
            // 现有内容；文件不存在时按空内容处理
            let old_content = match fs::read(path) {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(access_denied(e)),
            };
            let mut file = fs::File::create(path).map_err(access_denied)?;
            file.write_all(&task.write_buffer).map_err(access_denied)?;
            file.write_all(&old_content).map_err(access_denied)?;
        }
    }

    stats
        .bytes_written
        .fetch_add(task.write_buffer.len() as u64, Ordering::SeqCst);
    Ok(())
}

/// 流式整文件写入（截断重写）
///
/// 压缩失败（CompressionFailed）与写入失败（AccessDenied）是两类独立错误
fn handle_stream_write(
    task: &mut FileTask,
    compressor: &dyn CompressionService,
    stats: &StatsCounters,
) -> Result<(), TaskError> {
    let data = if task.should_pack {
        compressor
            .pack(&task.write_buffer, PackMode::Hybrid)
            .map_err(|e| {
                TaskError::new(TaskErrorKind::CompressionFailed)
                    .with_path(&task.primary_filename)
                    .with_message(format!("压缩写入数据失败: {}", e))
            })?
    } else {
        std::mem::take(&mut task.write_buffer)
    };

    fs::write(&task.primary_filename, &data).map_err(|e| {
        TaskError::new(TaskErrorKind::AccessDenied)
            .with_path(&task.primary_filename)
            .with_message(format!("写入文件失败: {}", e))
    })?;

    stats
        .bytes_written
        .fetch_add(data.len() as u64, Ordering::SeqCst);
    Ok(())
}

/// 流式整文件读取
///
/// 空文件是合法结果（空缓冲区），不是错误
fn handle_stream_read(
    task: &mut FileTask,
    compressor: &dyn CompressionService,
    stats: &StatsCounters,
) -> Result<(), TaskError> {
    let raw = fs::read(&task.primary_filename).map_err(|e| {
        TaskError::new(TaskErrorKind::FileNotFound)
            .with_path(&task.primary_filename)
            .with_message(format!("读取文件失败: {}", e))
    })?;

    stats
        .bytes_read
        .fetch_add(raw.len() as u64, Ordering::SeqCst);

    task.read_buffer = if task.should_pack && !raw.is_empty() {
        compressor.unpack(&raw).map_err(|e| {
            TaskError::new(TaskErrorKind::CompressionFailed)
                .with_path(&task.primary_filename)
                .with_message(format!("解压读取数据失败: {}", e))
        })?
    } else {
        raw
    };
    Ok(())
}

/// 查询当前工作目录，路径字节写入 read_buffer
fn handle_current_directory(task: &mut FileTask) -> Result<(), TaskError> {
    let dir = std::env::current_dir().map_err(|e| {
        TaskError::new(TaskErrorKind::PlatformSpecific)
            .with_message(format!("查询当前目录失败: {}", e))
    })?;
    // Windows 上去除 \\?\ 前缀，保持路径可读
    let simplified = dunce::simplified(&dir);
    task.read_buffer = simplified.to_string_lossy().as_bytes().to_vec();
    Ok(())
}

/// 重命名
fn handle_rename(task: &mut FileTask) -> Result<(), TaskError> {
    fs::rename(&task.primary_filename, &task.secondary_filename).map_err(|e| {
        TaskError::new(TaskErrorKind::AccessDenied)
            .with_path(&task.primary_filename)
            .with_message(format!(
                "重命名失败: {} -> {}: {}",
                task.primary_filename, task.secondary_filename, e
            ))
    })
}

/// 删除首行或末行
///
/// 仅接受文本内容：二进制标记或非 UTF-8 内容一律 InvalidParam。
/// 读出全部行、去掉首行（Front）或末行（End）后整文件重写
fn handle_delete_line(task: &mut FileTask, stats: &StatsCounters) -> Result<(), TaskError> {
    if task.file_type != FileType::Ascii {
        return Err(TaskError::new(TaskErrorKind::InvalidParam)
            .with_path(&task.primary_filename)
            .with_message("删除行操作仅支持文本文件"));
    }

    let raw = fs::read(&task.primary_filename).map_err(|e| {
        TaskError::new(TaskErrorKind::FileNotFound)
            .with_path(&task.primary_filename)
            .with_message(format!("读取文件失败: {}", e))
    })?;
    stats
        .bytes_read
        .fetch_add(raw.len() as u64, Ordering::SeqCst);

    let content = String::from_utf8(raw).map_err(|_| {
        TaskError::new(TaskErrorKind::InvalidParam)
            .with_path(&task.primary_filename)
            .with_message("目标不是有效的文本文件")
    })?;

    // 空文件没有可删除的行，视为成功的空操作
    if content.is_empty() {
        return Ok(());
    }

    let had_trailing_newline = content.ends_with('\n');
    let mut lines: Vec<&str> = content.lines().collect();
    match task.position {
        WritePosition::Front => {
            lines.remove(0);
        }
        WritePosition::End => {
            lines.pop();
        }
    }

    let mut rewritten = lines.join("\n");
    if had_trailing_newline && !rewritten.is_empty() {
        rewritten.push('\n');
    }

    fs::write(&task.primary_filename, rewritten.as_bytes()).map_err(|e| {
        TaskError::new(TaskErrorKind::AccessDenied)
            .with_path(&task.primary_filename)
            .with_message(format!("重写文件失败: {}", e))
    })?;
    stats
        .bytes_written
        .fetch_add(rewritten.len() as u64, Ordering::SeqCst);
    Ok(())
}

/// 复制到目标路径
fn handle_copy_to(task: &mut FileTask, stats: &StatsCounters) -> Result<(), TaskError> {
    let copied = fs::copy(&task.primary_filename, &task.secondary_filename).map_err(|e| {
        TaskError::new(TaskErrorKind::AccessDenied)
            .with_path(&task.primary_filename)
            .with_message(format!(
                "复制失败: {} -> {}: {}",
                task.primary_filename, task.secondary_filename, e
            ))
    })?;
    stats.bytes_written.fetch_add(copied, Ordering::SeqCst);
    Ok(())
}

/// 移动到目标目录（保留原文件名）
///
/// 优先使用 rename；跨文件系统时回退为复制后删除
fn handle_move_to(task: &mut FileTask) -> Result<(), TaskError> {
    let src = PathBuf::from(&task.primary_filename);
    let dest_dir = task.directory_path.as_ref().ok_or_else(|| {
        TaskError::new(TaskErrorKind::InvalidParam).with_message("移动操作缺少目标目录")
    })?;
    let file_name = src.file_name().ok_or_else(|| {
        TaskError::new(TaskErrorKind::InvalidParam)
            .with_path(&task.primary_filename)
            .with_message("源路径缺少文件名")
    })?;
    let dest = dest_dir.join(file_name);

    if fs::rename(&src, &dest).is_ok() {
        return Ok(());
    }

    // rename 跨设备会失败，改走复制 + 删除
    fs::copy(&src, &dest)
        .and_then(|_| fs::remove_file(&src))
        .map_err(|e| {
            TaskError::new(TaskErrorKind::AccessDenied)
                .with_path(&task.primary_filename)
                .with_message(format!(
                    "移动失败: {} -> {}: {}",
                    src.display(),
                    dest.display(),
                    e
                ))
        })?;
    Ok(())
}

/// 自定义命令
///
/// 不触碰文件系统：调用方提供的缓冲区（可选打包后）原样回流到
/// read_buffer，走与其他命令相同的完成路径
fn handle_inject_custom(
    task: &mut FileTask,
    compressor: &dyn CompressionService,
) -> Result<(), TaskError> {
    let tag = task.custom_tag.as_deref().unwrap_or("(未命名)");
    debug!("执行自定义命令: task_id={}, 标签={}", task.task_id, tag);

    if task.should_pack {
        task.read_buffer = compressor
            .pack(&task.write_buffer, PackMode::Hybrid)
            .map_err(|e| {
                TaskError::new(TaskErrorKind::CompressionFailed)
                    .with_message(format!("自定义命令打包失败: {}", e))
            })?;
    } else {
        task.read_buffer = std::mem::take(&mut task.write_buffer);
    }
    Ok(())
}
