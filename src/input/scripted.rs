//! 测试用脚本化帧源

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use parking_lot::Mutex;

use super::source::{Connector, FrameSource};
use crate::detection::DetectionFrame;

/// 脚本中的一步
#[derive(Clone, Debug)]
pub enum Step {
    Frame(DetectionFrame),
    Fail,
}

#[derive(Default)]
pub struct Counters {
    pub connects: AtomicUsize,
    pub open: AtomicUsize,
    pub max_open: AtomicUsize,
}

/// 每次连接从队列取一段脚本; 队列为空时连接失败
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    scripts: Arc<Mutex<VecDeque<Vec<Step>>>>,
    pub counters: Arc<Counters>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            counters: Arc::new(Counters::default()),
        }
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _uri: &str) -> anyhow::Result<Box<dyn FrameSource>> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        let Some(steps) = self.scripts.lock().pop_front() else {
            bail!("connection refused");
        };
        let open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(ScriptedSource {
            steps: steps.into(),
            counters: self.counters.clone(),
        }))
    }
}

struct ScriptedSource {
    steps: VecDeque<Step>,
    counters: Arc<Counters>,
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<DetectionFrame>> {
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => Ok(Some(frame)),
            Some(Step::Fail) => bail!("frame read failed"),
            None => {
                // 脚本读完: 模拟等待下一帧
                std::thread::sleep(Duration::from_millis(5));
                Ok(None)
            }
        }
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}
