// FileIO 模块
//
// 优先级有序的异步文件任务队列：
// 任务工厂（分配 + 打 ID）-> 优先级队列（有界入队）->
// 工作线程（出队、执行、压缩协作、完成登记）-> 调用方按任务 ID 轮询

pub mod manager;
pub mod queue;
pub mod task;
pub mod types;

pub(crate) mod worker;

pub use manager::FileIOManager;
pub use queue::TaskQueue;
pub use task::{FileTask, TaskFactory};
pub use types::{
    CompletedTask, FileCommand, FileIOStats, FileType, SubmitError, TaskError, TaskErrorKind,
    TaskId, TaskPriority, WritePosition,
};
