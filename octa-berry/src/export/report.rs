use crate::Result;
use std::time::Duration;

/// 单个受试者成功处理后的结果.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome {
    /// 全部输出文件已写入.
    Exported,

    /// 此前已完成导出, 本次未做任何改动.
    Skipped,
}

/// 单个受试者的处理报告.
#[derive(Debug)]
pub struct SubjectReport {
    /// 受试者编号.
    pub id: u32,

    /// 处理结果. `Err` 表示该受试者失败, 且没有写入完成标记 (分层标签).
    /// 加载阶段失败时不会写入任何文件, 写入阶段失败时可能留下部分输出, 下次运行会重新导出.
    pub result: Result<Outcome>,

    /// 处理耗时.
    pub elapsed: Duration,
}

impl SubjectReport {
    /// 是否成功导出或跳过.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// 成功时的结果.
    #[inline]
    pub fn outcome(&self) -> Option<Outcome> {
        self.result.as_ref().ok().copied()
    }

    /// 是否被跳过.
    #[inline]
    pub fn is_skipped(&self) -> bool {
        self.outcome() == Some(Outcome::Skipped)
    }
}
