// FileIO 模块数据类型定义

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 任务 ID（进程内唯一，从 1 开始单调递增，永不复用）
pub type TaskId = u64;

/// 文件操作命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCommand {
    /// 空命令（占位）
    None,
    /// 删除文件
    Delete,
    /// 查询文件大小
    GetSize,
    /// 文件存在性检查
    Exists,
    /// 追加写入（支持头部/尾部）
    AppendToFile,
    /// 流式整文件写入
    StreamWrite,
    /// 流式整文件读取
    StreamRead,
    /// 查询当前工作目录
    GetCurrentDirectory,
    /// 重命名
    Rename,
    /// 删除首行/末行
    DeleteLine,
    /// 复制到目标路径
    CopyTo,
    /// 移动到目标目录
    MoveTo,
    /// 调用方自定义命令（逃生舱）
    InjectCustom,
}

impl FileCommand {
    /// 获取命令的中文描述
    pub fn description(&self) -> &'static str {
        match self {
            FileCommand::None => "空命令",
            FileCommand::Delete => "删除文件",
            FileCommand::GetSize => "查询文件大小",
            FileCommand::Exists => "检查文件存在",
            FileCommand::AppendToFile => "追加写入",
            FileCommand::StreamWrite => "流式写入",
            FileCommand::StreamRead => "流式读取",
            FileCommand::GetCurrentDirectory => "查询当前目录",
            FileCommand::Rename => "重命名",
            FileCommand::DeleteLine => "删除行",
            FileCommand::CopyTo => "复制文件",
            FileCommand::MoveTo => "移动文件",
            FileCommand::InjectCustom => "自定义命令",
        }
    }

    /// 是否属于写操作
    ///
    /// 固定分类表，供调用方实现"写任务排空"屏障：
    /// Delete / GetSize / Exists / GetCurrentDirectory 归为非写操作，
    /// AppendToFile / StreamWrite / CopyTo / MoveTo / Rename / DeleteLine 归为写操作。
    /// None 与 InjectCustom 归为非写操作。
    pub fn is_write_operation(&self) -> bool {
        matches!(
            self,
            FileCommand::AppendToFile
                | FileCommand::StreamWrite
                | FileCommand::CopyTo
                | FileCommand::MoveTo
                | FileCommand::Rename
                | FileCommand::DeleteLine
        )
    }
}

/// 任务优先级（队列中高优先级先出队）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// 低
    Low,
    /// 普通
    #[default]
    Normal,
    /// 高
    High,
    /// 紧急
    Critical,
}

impl TaskPriority {
    /// 获取优先级的中文描述
    pub fn description(&self) -> &'static str {
        match self {
            TaskPriority::Low => "低",
            TaskPriority::Normal => "普通",
            TaskPriority::High => "高",
            TaskPriority::Critical => "紧急",
        }
    }
}

/// 文件内容类型（决定追加/行操作的打开语义）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// 文本文件
    #[default]
    Ascii,
    /// 二进制文件
    Binary,
}

/// 写入位置（追加/删除行作用于文件头还是文件尾）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WritePosition {
    /// 文件头
    Front,
    /// 文件尾
    #[default]
    End,
}

/// 任务错误码
/// 错误码范围：60001 - 60099
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// 文件不存在
    FileNotFound = 60001,
    /// 访问被拒绝
    AccessDenied = 60002,
    /// 参数无效
    InvalidParam = 60003,
    /// 平台不支持
    PlatformSpecific = 60004,
    /// 压缩/解压失败
    CompressionFailed = 60005,
    /// 未知运行时错误
    Unknown = 60006,
}

impl TaskErrorKind {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::FileNotFound => "文件不存在",
            Self::AccessDenied => "访问被拒绝",
            Self::InvalidParam => "参数无效",
            Self::PlatformSpecific => "当前平台不支持该操作",
            Self::CompressionFailed => "压缩或解压失败",
            Self::Unknown => "未知运行时错误",
        }
    }
}

/// 任务执行错误
///
/// 仅在任务失败时产生，按任务 ID 存入错误状态表供调用方查询
#[derive(Debug, Clone)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub message: String,
    pub path: Option<String>,
}

impl TaskError {
    pub fn new(kind: TaskErrorKind) -> Self {
        Self {
            message: kind.message().to_string(),
            kind,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {}", self.message, path)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for TaskError {}

/// 任务提交错误
///
/// 提交接口在入队前同步拒绝的前置条件违规，此类任务从未存在过，
/// 没有任务 ID 可供轮询
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// 子系统未初始化
    #[error("FileIO 子系统尚未初始化")]
    NotInitialized,
    /// 必填文件名为空
    #[error("文件名不能为空")]
    EmptyFilename,
    /// 写入数据为空
    #[error("写入数据不能为空")]
    EmptyBuffer,
    /// 数据超过配置上限
    #[error("数据大小 {size} 字节超过上限 {max} 字节")]
    BufferTooLarge { size: usize, max: usize },
    /// 队列已满（有界背压，任务被拒绝而非阻塞）
    #[error("任务队列已满（容量 {capacity}）")]
    QueueFull { capacity: usize },
    /// 队列锁获取超时（失败关闭，任务未入队）
    #[error("获取队列锁超时，任务未入队")]
    LockTimeout,
}

/// 已完成任务的终态快照
///
/// 任务完成后由工作线程写入已完成任务表，原队列节点随即丢弃。
/// 读取类命令的结果负载位于 `read_buffer`
#[derive(Debug, Clone, Serialize)]
pub struct CompletedTask {
    /// 任务 ID
    pub task_id: TaskId,
    /// 命令
    pub command: FileCommand,
    /// 优先级
    pub priority: TaskPriority,
    /// 是否成功
    pub was_successful: bool,
    /// 创建时间 (Unix 毫秒)
    pub create_time: i64,
    /// 完成时间 (Unix 毫秒)
    pub complete_time: i64,
    /// 读取结果负载
    #[serde(skip)]
    pub read_buffer: Vec<u8>,
}

/// 统计快照（仅供参考，不承载正确性语义）
#[derive(Debug, Clone, Serialize)]
pub struct FileIOStats {
    /// 已处理任务总数
    pub tasks_processed: u64,
    /// 已读取字节数
    pub bytes_read: u64,
    /// 已写入字节数
    pub bytes_written: u64,
    /// 失败任务数
    pub failures: u64,
}
