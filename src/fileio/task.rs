// FileIO 任务记录与任务工厂

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use super::types::{
    CompletedTask, FileCommand, FileType, TaskError, TaskId, TaskPriority, WritePosition,
};

/// 文件任务记录
///
/// 任务的完整生命周期：工厂创建 -> 入队（队列独占持有）->
/// 工作线程执行 -> 终态快照写入已完成任务表，原节点丢弃
#[derive(Debug, Clone)]
pub struct FileTask {
    /// 任务 ID
    pub task_id: TaskId,
    /// 命令
    pub command: FileCommand,
    /// 优先级
    pub priority: TaskPriority,
    /// 主文件路径
    pub primary_filename: String,
    /// 次文件路径（重命名/复制的目标路径）
    pub secondary_filename: String,
    /// 目录路径（移动操作的目标目录）
    pub directory_path: Option<PathBuf>,
    /// 写入数据
    pub write_buffer: Vec<u8>,
    /// 读取结果
    pub read_buffer: Vec<u8>,
    /// 文件内容类型
    pub file_type: FileType,
    /// 写入位置
    pub position: WritePosition,
    /// 是否压缩写入数据 / 解压读取数据
    pub should_pack: bool,
    /// 自定义命令标签（仅 InjectCustom 使用）
    pub custom_tag: Option<String>,
    /// 创建时间 (Unix 毫秒)
    pub create_time: i64,
    /// 完成时间 (Unix 毫秒)
    pub complete_time: Option<i64>,
    /// 是否已完成（恰好翻转一次）
    pub is_completed: bool,
    /// 是否成功
    pub was_successful: bool,
    /// 错误详情（仅失败时填充）
    pub error_status: Option<TaskError>,
}

impl FileTask {
    /// 标记任务成功完成
    pub fn mark_succeeded(&mut self) {
        debug_assert!(!self.is_completed, "任务终态只允许设置一次");
        self.is_completed = true;
        self.was_successful = true;
        self.complete_time = Some(chrono::Utc::now().timestamp_millis());
    }

    /// 标记任务失败
    pub fn mark_failed(&mut self, error: TaskError) {
        debug_assert!(!self.is_completed, "任务终态只允许设置一次");
        self.is_completed = true;
        self.was_successful = false;
        self.error_status = Some(error);
        self.complete_time = Some(chrono::Utc::now().timestamp_millis());
    }

    /// 生成终态快照（读取负载随快照转移给调用方）
    pub fn snapshot(&self) -> CompletedTask {
        CompletedTask {
            task_id: self.task_id,
            command: self.command,
            priority: self.priority,
            was_successful: self.was_successful,
            create_time: self.create_time,
            complete_time: self.complete_time.unwrap_or(self.create_time),
            read_buffer: self.read_buffer.clone(),
        }
    }
}

// 队列排序：优先级高者先出队；同优先级按任务 ID 从小到大（即提交顺序）出队。
// 任务 ID 单调递增，天然充当次级排序键，保证同级 FIFO。
impl PartialEq for FileTask {
    fn eq(&self, other: &Self) -> bool {
        self.task_id == other.task_id
    }
}

impl Eq for FileTask {}

impl PartialOrd for FileTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.task_id.cmp(&self.task_id))
    }
}

/// 任务工厂
///
/// 负责分配任务记录并打上全局唯一、单调递增的任务 ID。
/// ID 从 1 开始，无上限，仅在整数溢出时回绕（已知限制，不做处理）
#[derive(Debug)]
pub struct TaskFactory {
    next_id: AtomicU64,
}

impl TaskFactory {
    /// 创建新的任务工厂
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// 创建新任务（仅分配，尚未入队，对工作线程不可见）
    pub fn create_task(&self, command: FileCommand, priority: TaskPriority) -> FileTask {
        let task_id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        FileTask {
            task_id,
            command,
            priority,
            primary_filename: String::new(),
            secondary_filename: String::new(),
            directory_path: None,
            write_buffer: Vec::new(),
            read_buffer: Vec::new(),
            file_type: FileType::default(),
            position: WritePosition::default(),
            should_pack: false,
            custom_tag: None,
            create_time: chrono::Utc::now().timestamp_millis(),
            complete_time: None,
            is_completed: false,
            was_successful: false,
            error_status: None,
        }
    }
}

impl Default for TaskFactory {
    fn default() -> Self {
        Self::new()
    }
}
