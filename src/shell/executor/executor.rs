use log::{debug, info, warn};

use super::pipeline;
use crate::shell::parser::ast::Program;
use crate::shell::session::Session;

/// 标记输入结束的保留命令名。
pub const END_SENTINEL: &str = "end";

/// 一轮执行之后解释器该怎么做。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// 遇到了以 `end` 开头的管道
    End,
}

pub struct Executor {
    session: Session,
}

impl Executor {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// 依次执行每条管道，前一条完全结束（子进程全部回收）后才开始下一条。
    ///
    /// 单条管道的失败只报告，不影响后面的管道。
    pub fn execute(&mut self, program: Program) -> Flow {
        for pipeline in program.pipelines {
            if pipeline.head().name() == END_SENTINEL {
                info!("遇到 {}，停止执行", END_SENTINEL);
                return Flow::End;
            }

            match pipeline::execute(&pipeline, &mut self.session) {
                Ok(status) => debug!(
                    "管道结束: 状态 {}，回收 {} 个子进程",
                    status.code, status.spawned
                ),
                Err(e) => {
                    eprintln!("{}", e);
                    warn!("放弃管道 {:?}: {}", pipeline.head().arguments, e);
                }
            }
        }
        Flow::Continue
    }
}
