// FileIO 管理器
//
// 对引擎其余子系统暴露的唯一文件操作入口：所有文件工作都通过
// 本接口异步提交并以任务 ID 轮询完成，任何子系统都不得绕过它
// 直接触碰文件系统。提交接口从不为真实 I/O 阻塞，只在有限超时的
// 锁获取上短暂等待

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::compression::CompressionService;
use crate::config::FileIOConfig;

use super::queue::TaskQueue;
use super::task::{FileTask, TaskFactory};
use super::types::{
    CompletedTask, FileCommand, FileIOStats, FileType, SubmitError, TaskError, TaskId,
    TaskPriority, WritePosition,
};
use super::worker::{run_worker, StatsCounters, WorkerContext};

/// FileIO 管理器
///
/// 压缩协作者通过构造参数注入，测试中可替换
pub struct FileIOManager {
    config: FileIOConfig,
    factory: TaskFactory,
    queue: Arc<TaskQueue>,
    /// 已完成任务表（按任务 ID 查询，显式清理前持续增长）
    completed: Arc<DashMap<TaskId, CompletedTask>>,
    /// 错误状态表（与已完成任务表独立加锁，读取错误不阻塞生产与消费）
    errors: Arc<DashMap<TaskId, TaskError>>,
    compressor: Arc<dyn CompressionService>,
    stats: Arc<StatsCounters>,
    initialized: AtomicBool,
    worker_running: Arc<AtomicBool>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl FileIOManager {
    /// 创建新的 FileIO 管理器
    pub fn new(config: FileIOConfig, compressor: Arc<dyn CompressionService>) -> Self {
        let queue = Arc::new(TaskQueue::new(config.queue_capacity, config.lock_timeout()));
        Self {
            config,
            factory: TaskFactory::new(),
            queue,
            completed: Arc::new(DashMap::new()),
            errors: Arc::new(DashMap::new()),
            compressor,
            stats: Arc::new(StatsCounters::default()),
            initialized: AtomicBool::new(false),
            worker_running: Arc::new(AtomicBool::new(false)),
            worker_handle: Mutex::new(None),
        }
    }

    // =====================================================
    // 生命周期
    // =====================================================

    /// 初始化子系统
    pub fn initialize(&self) -> anyhow::Result<()> {
        if self.config.queue_capacity == 0 {
            anyhow::bail!("队列容量必须大于 0");
        }
        if self.config.max_buffer_size == 0 {
            anyhow::bail!("缓冲区上限必须大于 0");
        }
        self.initialized.store(true, Ordering::SeqCst);
        info!(
            "FileIO 子系统初始化完成: 队列容量={}, 缓冲区上限={} 字节, 锁超时={:?}",
            self.config.queue_capacity,
            self.config.max_buffer_size,
            self.config.lock_timeout()
        );
        Ok(())
    }

    /// 清理子系统
    ///
    /// 停止工作线程、清空队列与两张结果表。
    /// 未执行的任务被静默丢弃，不产生完成通知
    pub fn cleanup(&self) {
        self.stop_worker();
        let discarded = self.queue.clear();
        self.completed.clear();
        self.errors.clear();
        self.initialized.store(false, Ordering::SeqCst);
        info!("FileIO 子系统已清理，丢弃未执行任务 {} 个", discarded);
    }

    /// 启动工作线程
    pub fn start_worker(&self) -> anyhow::Result<()> {
        if !self.initialized.load(Ordering::SeqCst) {
            anyhow::bail!("FileIO 子系统尚未初始化");
        }
        if self.worker_running.swap(true, Ordering::SeqCst) {
            anyhow::bail!("FileIO 工作线程已在运行");
        }

        let ctx = WorkerContext {
            queue: self.queue.clone(),
            completed: self.completed.clone(),
            errors: self.errors.clone(),
            compressor: self.compressor.clone(),
            stats: self.stats.clone(),
            running: self.worker_running.clone(),
            idle_poll: self.config.idle_poll(),
        };

        let handle = std::thread::Builder::new()
            .name("fileio-worker".to_string())
            .spawn(move || run_worker(ctx))
            .map_err(|e| {
                self.worker_running.store(false, Ordering::SeqCst);
                anyhow::anyhow!("启动工作线程失败: {}", e)
            })?;

        *self.worker_handle.lock() = Some(handle);
        Ok(())
    }

    /// 停止工作线程（等待当前任务执行完毕后退出）
    pub fn stop_worker(&self) {
        if !self.worker_running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.worker_handle.lock().take() {
            if handle.join().is_err() {
                warn!("FileIO 工作线程异常退出");
            }
        }
        info!("FileIO 工作线程已停止");
    }

    // =====================================================
    // 提交接口（非阻塞，返回任务 ID 供轮询）
    // =====================================================

    /// 删除文件
    pub fn delete_file(
        &self,
        filename: &str,
        priority: TaskPriority,
    ) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(Some(filename), None)?;
        let mut task = self.factory.create_task(FileCommand::Delete, priority);
        task.primary_filename = filename.to_string();
        self.submit(task)
    }

    /// 查询文件大小（结果为小端 u64 字节，位于完成快照的 read_buffer）
    pub fn get_file_size(
        &self,
        filename: &str,
        priority: TaskPriority,
    ) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(Some(filename), None)?;
        let mut task = self.factory.create_task(FileCommand::GetSize, priority);
        task.primary_filename = filename.to_string();
        self.submit(task)
    }

    /// 检查文件是否存在（结果为单字节布尔负载）
    pub fn file_exists(
        &self,
        filename: &str,
        priority: TaskPriority,
    ) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(Some(filename), None)?;
        let mut task = self.factory.create_task(FileCommand::Exists, priority);
        task.primary_filename = filename.to_string();
        self.submit(task)
    }

    /// 追加写入
    ///
    /// position 为 Front 时执行整文件重写（读出旧内容，先写新数据再写回），
    /// 不是真正的头部插入
    pub fn append_to_file(
        &self,
        filename: &str,
        data: Vec<u8>,
        file_type: FileType,
        position: WritePosition,
        priority: TaskPriority,
    ) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(Some(filename), Some(&data))?;
        let mut task = self
            .factory
            .create_task(FileCommand::AppendToFile, priority);
        task.primary_filename = filename.to_string();
        task.write_buffer = data;
        task.file_type = file_type;
        task.position = position;
        self.submit(task)
    }

    /// 流式整文件写入（可选压缩）
    pub fn stream_write_file(
        &self,
        filename: &str,
        data: Vec<u8>,
        should_compress: bool,
        priority: TaskPriority,
    ) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(Some(filename), Some(&data))?;
        let mut task = self.factory.create_task(FileCommand::StreamWrite, priority);
        task.primary_filename = filename.to_string();
        task.write_buffer = data;
        task.should_pack = should_compress;
        self.submit(task)
    }

    /// 流式整文件读取（可选解压），结果位于完成快照的 read_buffer
    pub fn stream_read_file(
        &self,
        filename: &str,
        should_decompress: bool,
        priority: TaskPriority,
    ) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(Some(filename), None)?;
        let mut task = self.factory.create_task(FileCommand::StreamRead, priority);
        task.primary_filename = filename.to_string();
        task.should_pack = should_decompress;
        self.submit(task)
    }

    /// 查询当前工作目录，路径字节位于完成快照的 read_buffer
    pub fn get_current_directory(&self, priority: TaskPriority) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(None, None)?;
        let task = self
            .factory
            .create_task(FileCommand::GetCurrentDirectory, priority);
        self.submit(task)
    }

    /// 重命名文件
    pub fn rename_file(
        &self,
        old_filename: &str,
        new_filename: &str,
        priority: TaskPriority,
    ) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(Some(old_filename), None)?;
        if new_filename.is_empty() {
            return Err(SubmitError::EmptyFilename);
        }
        let mut task = self.factory.create_task(FileCommand::Rename, priority);
        task.primary_filename = old_filename.to_string();
        task.secondary_filename = new_filename.to_string();
        self.submit(task)
    }

    /// 删除文件首行或末行（仅文本文件）
    pub fn delete_line_in_file(
        &self,
        filename: &str,
        position: WritePosition,
        priority: TaskPriority,
    ) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(Some(filename), None)?;
        let mut task = self.factory.create_task(FileCommand::DeleteLine, priority);
        task.primary_filename = filename.to_string();
        task.file_type = FileType::Ascii;
        task.position = position;
        self.submit(task)
    }

    /// 复制文件到目标路径
    pub fn copy_file_to(
        &self,
        src: &str,
        dst: &str,
        priority: TaskPriority,
    ) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(Some(src), None)?;
        if dst.is_empty() {
            return Err(SubmitError::EmptyFilename);
        }
        let mut task = self.factory.create_task(FileCommand::CopyTo, priority);
        task.primary_filename = src.to_string();
        task.secondary_filename = dst.to_string();
        self.submit(task)
    }

    /// 移动文件到目标目录（保留原文件名）
    pub fn move_file_to(
        &self,
        src: &str,
        dest_dir: impl Into<PathBuf>,
        priority: TaskPriority,
    ) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(Some(src), None)?;
        let dest_dir = dest_dir.into();
        if dest_dir.as_os_str().is_empty() {
            return Err(SubmitError::EmptyFilename);
        }
        let mut task = self.factory.create_task(FileCommand::MoveTo, priority);
        task.primary_filename = src.to_string();
        task.directory_path = Some(dest_dir);
        self.submit(task)
    }

    /// 注入自定义任务（逃生舱）
    ///
    /// 缓冲区（可选打包后）经由相同的完成路径回流；允许空缓冲区
    pub fn inject_task(
        &self,
        tag: &str,
        buffer: Vec<u8>,
        should_compress: bool,
        priority: TaskPriority,
    ) -> Result<TaskId, SubmitError> {
        self.check_submit_preconditions(None, None)?;
        if buffer.len() > self.config.max_buffer_size {
            return Err(SubmitError::BufferTooLarge {
                size: buffer.len(),
                max: self.config.max_buffer_size,
            });
        }
        let mut task = self
            .factory
            .create_task(FileCommand::InjectCustom, priority);
        task.custom_tag = Some(tag.to_string());
        task.write_buffer = buffer;
        task.should_pack = should_compress;
        self.submit(task)
    }

    // =====================================================
    // 轮询接口
    // =====================================================

    /// 查询任务是否完成
    ///
    /// None 表示未找到（仍在排队/执行中，或从未存在、或已被丢弃/回收）；
    /// Some(success) 表示任务已终态，重复轮询结果永远稳定
    pub fn is_task_completed(&self, task_id: TaskId) -> Option<bool> {
        self.completed
            .get(&task_id)
            .map(|entry| entry.was_successful)
    }

    /// 获取已完成任务的终态快照（含读取结果负载）
    pub fn get_completed_task(&self, task_id: TaskId) -> Option<CompletedTask> {
        self.completed
            .get(&task_id)
            .map(|entry| entry.value().clone())
    }

    /// 获取任务的错误详情（仅失败任务存在）
    pub fn get_error_status(&self, task_id: TaskId) -> Option<TaskError> {
        self.errors.get(&task_id).map(|entry| entry.value().clone())
    }

    // =====================================================
    // 结果表清理（调用方持有清理策略，无自动淘汰）
    // =====================================================

    /// 回收单个任务的完成记录与错误记录
    pub fn reap_task(&self, task_id: TaskId) -> bool {
        let removed = self.completed.remove(&task_id).is_some();
        self.errors.remove(&task_id);
        removed
    }

    /// 回收完成时间早于指定时长的所有记录，返回回收数量
    pub fn reap_older_than(&self, age: Duration) -> usize {
        let cutoff = chrono::Utc::now().timestamp_millis() - age.as_millis() as i64;
        let stale: Vec<TaskId> = self
            .completed
            .iter()
            .filter(|entry| entry.complete_time < cutoff)
            .map(|entry| entry.task_id)
            .collect();
        for task_id in &stale {
            self.completed.remove(task_id);
            self.errors.remove(task_id);
        }
        if !stale.is_empty() {
            debug!("回收过期任务记录 {} 条", stale.len());
        }
        stale.len()
    }

    // =====================================================
    // 队列观测与排空
    // =====================================================

    /// 当前排队任务数
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    /// 是否存在未执行的写任务
    pub fn has_pending_write_tasks(&self) -> bool {
        self.queue.has_pending_write_tasks()
    }

    /// 未执行的写任务数
    pub fn pending_write_task_count(&self) -> usize {
        self.queue.pending_write_task_count()
    }

    /// 清空队列（未执行任务静默丢弃），返回丢弃数量
    pub fn clear_queue(&self) -> usize {
        self.queue.clear()
    }

    /// 排空屏障：等待队列清空且工作线程空闲
    ///
    /// 超时返回 false。仅观测本子系统的队列状态，不等待调用方轮询
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            // 先看队列再看忙标志：工作线程弹出任务前必先置忙，
            // 因此"队列空之后才观测到不忙"保证弹出的任务都已执行完毕
            if self.queue.is_empty() && !self.stats.worker_busy.load(Ordering::SeqCst) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(self.config.idle_poll());
        }
    }

    /// 统计快照
    pub fn stats(&self) -> FileIOStats {
        self.stats.snapshot()
    }

    // =====================================================
    // 内部辅助
    // =====================================================

    /// 提交前置条件检查（违规任务被同步拒绝，从未入队）
    fn check_submit_preconditions(
        &self,
        filename: Option<&str>,
        buffer: Option<&[u8]>,
    ) -> Result<(), SubmitError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(SubmitError::NotInitialized);
        }
        if let Some(name) = filename {
            if name.is_empty() {
                return Err(SubmitError::EmptyFilename);
            }
        }
        if let Some(data) = buffer {
            if data.is_empty() {
                return Err(SubmitError::EmptyBuffer);
            }
            if data.len() > self.config.max_buffer_size {
                return Err(SubmitError::BufferTooLarge {
                    size: data.len(),
                    max: self.config.max_buffer_size,
                });
            }
        }
        Ok(())
    }

    fn submit(&self, task: FileTask) -> Result<TaskId, SubmitError> {
        let task_id = task.task_id;
        self.queue.enqueue(task)?;
        Ok(task_id)
    }
}

impl Drop for FileIOManager {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{CompressionError, PackMode, ZipCompressor};
    use crate::fileio::types::TaskErrorKind;
    use tempfile::tempdir;

    /// 打包时恐慌的压缩桩，用于验证工作线程的故障隔离
    struct PanickyCompressor;

    impl CompressionService for PanickyCompressor {
        fn pack(&self, _data: &[u8], _mode: PackMode) -> Result<Vec<u8>, CompressionError> {
            panic!("打包服务崩溃");
        }

        fn unpack(&self, _data: &[u8]) -> Result<Vec<u8>, CompressionError> {
            Err(CompressionError::new("桩实现不支持解包"))
        }
    }

    /// 进入打包后阻塞直至放行的压缩桩，用于制造"任务在途"的观测窗口
    struct GatedCompressor {
        entered: Arc<AtomicBool>,
        release: Arc<AtomicBool>,
    }

    impl CompressionService for GatedCompressor {
        fn pack(&self, data: &[u8], _mode: PackMode) -> Result<Vec<u8>, CompressionError> {
            self.entered.store(true, Ordering::SeqCst);
            while !self.release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(data.to_vec())
        }

        fn unpack(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
            Ok(data.to_vec())
        }
    }

    fn manager_with(config: FileIOConfig) -> FileIOManager {
        let manager = FileIOManager::new(config, Arc::new(ZipCompressor::new()));
        manager.initialize().unwrap();
        manager
    }

    fn manager() -> FileIOManager {
        manager_with(FileIOConfig::default())
    }

    /// 轮询直到任务完成或超时
    fn wait_complete(manager: &FileIOManager, task_id: TaskId) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(success) = manager.is_task_completed(task_id) {
                return success;
            }
            assert!(Instant::now() < deadline, "任务 {} 等待超时", task_id);
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_submit_requires_initialization() {
        let manager = FileIOManager::new(FileIOConfig::default(), Arc::new(ZipCompressor::new()));
        let result = manager.delete_file("whatever.txt", TaskPriority::Normal);
        assert_eq!(result, Err(SubmitError::NotInitialized));
    }

    #[test]
    fn test_submit_validation() {
        let mut config = FileIOConfig::default();
        config.max_buffer_size = 8;
        let manager = manager_with(config);

        assert_eq!(
            manager.delete_file("", TaskPriority::Normal),
            Err(SubmitError::EmptyFilename)
        );
        assert_eq!(
            manager.stream_write_file("a.txt", Vec::new(), false, TaskPriority::Normal),
            Err(SubmitError::EmptyBuffer)
        );
        assert_eq!(
            manager.stream_write_file("a.txt", vec![0u8; 16], false, TaskPriority::Normal),
            Err(SubmitError::BufferTooLarge { size: 16, max: 8 })
        );
        assert_eq!(
            manager.rename_file("a.txt", "", TaskPriority::Normal),
            Err(SubmitError::EmptyFilename)
        );
        assert_eq!(
            manager.move_file_to("a.txt", "", TaskPriority::Normal),
            Err(SubmitError::EmptyFilename)
        );
    }

    #[test]
    fn test_queue_full_rejection() {
        let mut config = FileIOConfig::default();
        config.queue_capacity = 1;
        let manager = manager_with(config);

        // 不启动工作线程，队列不会被消费
        manager
            .file_exists("one.txt", TaskPriority::Normal)
            .unwrap();
        let result = manager.file_exists("two.txt", TaskPriority::Normal);
        assert_eq!(result, Err(SubmitError::QueueFull { capacity: 1 }));
        assert_eq!(manager.queue_size(), 1);
    }

    #[test]
    fn test_stream_roundtrip_with_compression() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roundtrip.dat");
        let path_str = path.to_string_lossy().to_string();
        let payload = "引擎存档数据".repeat(128).into_bytes();

        let manager = manager();
        manager.start_worker().unwrap();

        let write_id = manager
            .stream_write_file(&path_str, payload.clone(), true, TaskPriority::High)
            .unwrap();
        assert!(wait_complete(&manager, write_id));

        let read_id = manager
            .stream_read_file(&path_str, true, TaskPriority::Normal)
            .unwrap();
        assert!(wait_complete(&manager, read_id));

        let snapshot = manager.get_completed_task(read_id).unwrap();
        assert_eq!(snapshot.read_buffer, payload);

        let stats = manager.stats();
        assert_eq!(stats.tasks_processed, 2);
        assert_eq!(stats.failures, 0);
        assert!(stats.bytes_written > 0);
        assert!(stats.bytes_read > 0);

        manager.stop_worker();
    }

    #[test]
    fn test_error_surfacing_file_not_found() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.bin");

        let manager = manager();
        manager.start_worker().unwrap();

        let task_id = manager
            .get_file_size(&missing.to_string_lossy(), TaskPriority::Normal)
            .unwrap();
        assert!(!wait_complete(&manager, task_id));

        let error = manager.get_error_status(task_id).unwrap();
        assert_eq!(error.kind, TaskErrorKind::FileNotFound);
        assert_eq!(manager.stats().failures, 1);

        manager.stop_worker();
    }

    #[test]
    fn test_repolling_is_stable() {
        let manager = manager();
        manager.start_worker().unwrap();

        let task_id = manager
            .inject_task("stable", b"payload".to_vec(), false, TaskPriority::Normal)
            .unwrap();
        assert!(wait_complete(&manager, task_id));

        // 重复轮询永远返回相同的终态
        for _ in 0..10 {
            assert_eq!(manager.is_task_completed(task_id), Some(true));
        }

        manager.stop_worker();
    }

    #[test]
    fn test_clear_discards_silently() {
        let manager = manager();
        // 工作线程未启动，任务停留在队列里

        let task_id = manager
            .file_exists("pending.txt", TaskPriority::Normal)
            .unwrap();
        assert_eq!(manager.clear_queue(), 1);

        // 被丢弃的任务永远轮询不到
        assert_eq!(manager.is_task_completed(task_id), None);
        assert!(manager.get_completed_task(task_id).is_none());
        assert!(manager.get_error_status(task_id).is_none());
    }

    #[test]
    fn test_append_and_delete_line_through_manager() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.txt");
        let path_str = path.to_string_lossy().to_string();
        std::fs::write(&path, "L1\nL2\nL3\n").unwrap();

        let manager = manager();
        manager.start_worker().unwrap();

        let append_id = manager
            .append_to_file(
                &path_str,
                b"L4\n".to_vec(),
                FileType::Ascii,
                WritePosition::End,
                TaskPriority::Normal,
            )
            .unwrap();
        assert!(wait_complete(&manager, append_id));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "L1\nL2\nL3\nL4\n");

        let delete_id = manager
            .delete_line_in_file(&path_str, WritePosition::Front, TaskPriority::Normal)
            .unwrap();
        assert!(wait_complete(&manager, delete_id));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "L2\nL3\nL4\n");

        manager.stop_worker();
    }

    #[test]
    fn test_reap_operations() {
        let manager = manager();
        manager.start_worker().unwrap();

        let keep_id = manager
            .inject_task("keep", b"a".to_vec(), false, TaskPriority::Normal)
            .unwrap();
        let reap_id = manager
            .inject_task("reap", b"b".to_vec(), false, TaskPriority::Normal)
            .unwrap();
        wait_complete(&manager, keep_id);
        wait_complete(&manager, reap_id);

        assert!(manager.reap_task(reap_id));
        assert!(manager.is_task_completed(reap_id).is_none());
        assert!(manager.is_task_completed(keep_id).is_some());

        // 所有已完成记录都早于"现在"，零时长回收应清空剩余记录
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(manager.reap_older_than(Duration::ZERO), 1);
        assert!(manager.is_task_completed(keep_id).is_none());

        manager.stop_worker();
    }

    #[test]
    fn test_wait_until_idle_drain_barrier() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drain.dat");
        let path_str = path.to_string_lossy().to_string();

        let manager = manager();
        manager.start_worker().unwrap();

        for _ in 0..8 {
            manager
                .stream_write_file(&path_str, vec![1u8; 1024], false, TaskPriority::Normal)
                .unwrap();
        }
        assert!(manager.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(manager.queue_size(), 0);
        assert!(!manager.has_pending_write_tasks());

        manager.stop_worker();
    }

    #[test]
    fn test_wait_until_idle_sees_in_flight_task() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inflight.dat");
        let path_str = path.to_string_lossy().to_string();

        let entered = Arc::new(AtomicBool::new(false));
        let release = Arc::new(AtomicBool::new(false));
        let compressor = Arc::new(GatedCompressor {
            entered: entered.clone(),
            release: release.clone(),
        });

        let manager = FileIOManager::new(FileIOConfig::default(), compressor);
        manager.initialize().unwrap();
        manager.start_worker().unwrap();

        let task_id = manager
            .stream_write_file(&path_str, b"slow payload".to_vec(), true, TaskPriority::Normal)
            .unwrap();

        // 等到任务已被弹出并正在执行（阻塞在压缩桩内）
        let deadline = Instant::now() + Duration::from_secs(5);
        while !entered.load(Ordering::SeqCst) {
            assert!(Instant::now() < deadline, "任务未进入执行");
            std::thread::sleep(Duration::from_millis(1));
        }

        // 队列此刻已空，但任务尚在执行，屏障不得放行
        assert_eq!(manager.queue_size(), 0);
        assert!(!manager.wait_until_idle(Duration::from_millis(50)));

        release.store(true, Ordering::SeqCst);
        assert!(manager.wait_until_idle(Duration::from_secs(5)));
        assert!(wait_complete(&manager, task_id));

        manager.stop_worker();
    }

    #[test]
    fn test_worker_survives_panicking_task() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doomed.dat");
        let path_str = path.to_string_lossy().to_string();

        let manager = FileIOManager::new(FileIOConfig::default(), Arc::new(PanickyCompressor));
        manager.initialize().unwrap();
        manager.start_worker().unwrap();

        // 压缩桩在打包时恐慌，任务应以 Unknown 错误失败
        let doomed_id = manager
            .stream_write_file(&path_str, b"data".to_vec(), true, TaskPriority::Normal)
            .unwrap();
        assert!(!wait_complete(&manager, doomed_id));

        let error = manager.get_error_status(doomed_id).unwrap();
        assert_eq!(error.kind, TaskErrorKind::Unknown);
        assert!(error.to_string().contains("打包服务崩溃"));
        assert_eq!(manager.stats().failures, 1);

        // 工作线程存活，后续任务照常执行
        let follow_up = manager
            .file_exists(&path_str, TaskPriority::Normal)
            .unwrap();
        assert!(wait_complete(&manager, follow_up));

        manager.stop_worker();
    }

    #[test]
    fn test_start_worker_twice_fails() {
        let manager = manager();
        manager.start_worker().unwrap();
        assert!(manager.start_worker().is_err());
        manager.stop_worker();
        // 停止后可以再次启动
        manager.start_worker().unwrap();
        manager.stop_worker();
    }

    #[test]
    fn test_cleanup_resets_everything() {
        let manager = manager();
        manager.start_worker().unwrap();

        let task_id = manager
            .inject_task("temp", b"x".to_vec(), false, TaskPriority::Normal)
            .unwrap();
        wait_complete(&manager, task_id);

        manager.cleanup();
        assert!(manager.is_task_completed(task_id).is_none());
        // 清理后子系统回到未初始化状态
        assert_eq!(
            manager.file_exists("x.txt", TaskPriority::Normal),
            Err(SubmitError::NotInitialized)
        );
    }
}
