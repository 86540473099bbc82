// 有界任务优先级队列
//
// 多生产者、单消费者之间的线程安全缓冲区。
// 锁获取带超时，超时即失败关闭（任务被丢弃并告知调用方），绝不无限等待

use std::collections::BinaryHeap;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::task::FileTask;
use super::types::SubmitError;

/// 任务优先级队列
///
/// 固定容量，满载时拒绝新任务而非阻塞或无界增长（显式背压策略）。
/// 出队顺序：优先级高者在前，同优先级按任务 ID 保持提交顺序
pub struct TaskQueue {
    /// 底层堆（互斥锁保护）
    heap: Mutex<BinaryHeap<FileTask>>,
    /// 最大容量
    capacity: usize,
    /// 锁获取超时
    lock_timeout: Duration,
}

impl TaskQueue {
    /// 创建新的任务队列
    pub fn new(capacity: usize, lock_timeout: Duration) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::with_capacity(capacity.min(1024))),
            capacity,
            lock_timeout,
        }
    }

    /// 入队
    ///
    /// 锁超时或队列满载时返回错误，任务被丢弃。
    /// 调用方必须检查返回值，失败意味着"任务未被调度"
    pub fn enqueue(&self, task: FileTask) -> Result<(), SubmitError> {
        let mut heap = self
            .heap
            .try_lock_for(self.lock_timeout)
            .ok_or(SubmitError::LockTimeout)?;

        if heap.len() >= self.capacity {
            warn!(
                "任务队列已满，拒绝任务: task_id={}, 命令={}, 容量={}",
                task.task_id,
                task.command.description(),
                self.capacity
            );
            return Err(SubmitError::QueueFull {
                capacity: self.capacity,
            });
        }

        debug!(
            "任务入队: task_id={}, 命令={}, 优先级={}",
            task.task_id,
            task.command.description(),
            task.priority.description()
        );
        heap.push(task);
        Ok(())
    }

    /// 出队最高优先级任务
    ///
    /// 队列为空或锁超时返回 None，从不阻塞等待新任务
    /// （空转等待由工作线程自身的 sleep/poll 负责）
    pub fn dequeue(&self) -> Option<FileTask> {
        let mut heap = self.heap.try_lock_for(self.lock_timeout)?;
        heap.pop()
    }

    /// 清空队列
    ///
    /// 原子地替换为空队列，未执行的任务被静默丢弃，不产生任何完成通知
    /// （等待这些任务 ID 的调用方将永远轮询到"未找到"）。
    /// 返回被丢弃的任务数
    pub fn clear(&self) -> usize {
        let Some(mut heap) = self.heap.try_lock_for(self.lock_timeout) else {
            warn!("清空队列失败：锁获取超时");
            return 0;
        };
        let discarded = heap.len();
        *heap = BinaryHeap::new();
        if discarded > 0 {
            warn!("队列已清空，{} 个未执行任务被丢弃（无完成通知）", discarded);
        }
        discarded
    }

    /// 当前队列长度（锁超时返回 0）
    pub fn len(&self) -> usize {
        self.heap
            .try_lock_for(self.lock_timeout)
            .map(|heap| heap.len())
            .unwrap_or(0)
    }

    /// 队列是否为空（锁超时视为空）
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 是否存在未执行的写任务
    pub fn has_pending_write_tasks(&self) -> bool {
        self.pending_write_task_count() > 0
    }

    /// 未执行的写任务数量
    ///
    /// 依据 FileCommand::is_write_operation 的固定分类表统计，
    /// 供调用方实现关闭前排空或刷写屏障
    pub fn pending_write_task_count(&self) -> usize {
        let Some(heap) = self.heap.try_lock_for(self.lock_timeout) else {
            debug!("统计写任务失败：锁获取超时");
            return 0;
        };
        heap.iter()
            .filter(|task| task.command.is_write_operation())
            .count()
    }

    /// 队列容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
