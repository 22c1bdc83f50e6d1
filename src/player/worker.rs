use crate::core::{log_ctx, PlayerError, Result};
use crossbeam_channel::{bounded, unbounded, Sender};
use log::{debug, error, info};
use std::future::Future;
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::oneshot;

type Task<S> = Box<dyn FnOnce(&mut S) + Send>;

/// 单线程执行器
///
/// 状态 `S` 只在工作线程里被访问，外部通过投递闭包读写它：
/// - `invoke`: 同步等待结果
/// - `begin_invoke`: 返回一个 future，适合在 async 代码里等待
/// - `post`: 不关心结果
///
/// 闭包按投递顺序串行执行。
pub struct Worker<S> {
    name: String,
    task_tx: Option<Sender<Task<S>>>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl<S: Send + 'static> Worker<S> {
    pub fn spawn(name: &str, state: S) -> Result<Self> {
        let (task_tx, task_rx) = unbounded::<Task<S>>();
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(format!("worker-{}", name))
            .spawn(move || {
                debug!("{} ⚙️ 工作线程启动: {}", log_ctx(), thread_name);
                let mut state = state;
                let mut executed: u64 = 0;
                for task in task_rx.iter() {
                    task(&mut state);
                    executed += 1;
                }
                debug!(
                    "{} 工作线程退出: {}（执行 {} 个任务）",
                    log_ctx(),
                    thread_name,
                    executed
                );
            })?;

        let thread_id = handle.thread().id();
        info!("{} ⚙️ 创建工作线程: {}", log_ctx(), name);

        Ok(Self {
            name: name.to_string(),
            task_tx: Some(task_tx),
            handle: Some(handle),
            thread_id,
        })
    }

    fn send(&self, task: Task<S>) -> Result<()> {
        let tx = self
            .task_tx
            .as_ref()
            .ok_or_else(|| PlayerError::WorkerStopped(self.name.clone()))?;
        tx.send(task)
            .map_err(|_| PlayerError::WorkerStopped(self.name.clone()))
    }

    /// 在工作线程上执行并等待结果
    pub fn invoke<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        if thread::current().id() == self.thread_id {
            return Err(PlayerError::Other(format!(
                "不能在工作线程 {} 内同步等待自身",
                self.name
            )));
        }
        let (reply_tx, reply_rx) = bounded(1);
        self.send(Box::new(move |state| {
            let _ = reply_tx.send(f(state));
        }))?;
        reply_rx
            .recv()
            .map_err(|_| PlayerError::WorkerStopped(self.name.clone()))
    }

    /// 在工作线程上执行，返回等待结果的 future
    pub fn begin_invoke<R, F>(&self, f: F) -> impl Future<Output = Result<R>> + Send + 'static
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let sent = self.send(Box::new(move |state| {
            let _ = reply_tx.send(f(state));
        }));
        let name = self.name.clone();
        async move {
            sent?;
            reply_rx.await.map_err(|_| PlayerError::WorkerStopped(name))
        }
    }

    /// 投递一个不需要结果的任务
    pub fn post<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.send(Box::new(f))
    }

    /// 队列中尚未执行的任务数
    pub fn pending(&self) -> usize {
        self.task_tx.as_ref().map(|tx| tx.len()).unwrap_or(0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S> Drop for Worker<S> {
    fn drop(&mut self) {
        // 关闭任务通道，工作线程执行完剩余任务后退出
        self.task_tx = None;
        if let Some(handle) = self.handle.take() {
            if thread::current().id() == self.thread_id {
                return;
            }
            if handle.join().is_err() {
                error!("{} ❌ 工作线程异常退出: {}", log_ctx(), self.name);
            }
        }
    }
}
