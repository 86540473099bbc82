// FileIO Engine Rust Library
// 异步文件任务队列引擎核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 压缩协作者模块
pub mod compression;

// FileIO 任务队列模块
pub mod fileio;

// 导出常用类型
pub use compression::{CompressionError, CompressionService, PackMode, ZipCompressor};
pub use config::{FileIOConfig, LogConfig};
pub use fileio::{
    CompletedTask, FileCommand, FileIOManager, FileIOStats, FileTask, FileType, SubmitError,
    TaskError, TaskErrorKind, TaskFactory, TaskId, TaskPriority, TaskQueue, WritePosition,
};
