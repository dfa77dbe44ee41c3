//! 导出结果.

use octa_berry::export::{Outcome, SubjectReport};
use std::io::{self, Write};
use std::time::Duration;

/// 一次批量导出的全部结果.
pub struct ExportResult {
    reports: Vec<SubjectReport>,
    total: Duration,
}

impl ExportResult {
    pub fn new(reports: Vec<SubjectReport>, total: Duration) -> Self {
        Self { reports, total }
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome() == Some(outcome))
            .count()
    }

    /// 是否没有失败的受试者.
    pub fn all_ok(&self) -> bool {
        self.reports.iter().all(SubjectReport::is_ok)
    }

    /// 将统计结果写进 `w` 中.
    fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        let exported: Vec<&SubjectReport> = self
            .reports
            .iter()
            .filter(|r| r.outcome() == Some(Outcome::Exported))
            .collect();
        let export_time: Duration = exported.iter().map(|r| r.elapsed).sum();

        writeln!(w, "Processed subjects: {}", self.reports.len())?;
        writeln!(w, "{S4}Exported: {}", exported.len())?;
        writeln!(w, "{S4}Skipped: {}", self.count(Outcome::Skipped))?;
        let failed = self.reports.iter().filter(|r| !r.is_ok()).count();
        writeln!(w, "{S4}Failed: {failed}")?;
        writeln!(w, "Total time: {} ms", self.total.as_millis())?;
        match exported.len() {
            0 => writeln!(w, "Average export time: /")?,
            n => {
                let avg = export_time.as_millis() / n as u128;
                writeln!(w, "Average export time: {avg} ms")?
            }
        }
        if let Some(slowest) = exported.iter().max_by_key(|r| r.elapsed) {
            writeln!(
                w,
                "Slowest subject: {} ({} ms)",
                slowest.id,
                slowest.elapsed.as_millis()
            )?;
        }

        for r in &self.reports {
            if let Err(e) = &r.result {
                writeln!(w, "{S4}subject {}: {e}", r.id)?;
            }
        }
        Ok(())
    }

    /// 分析运行结果.
    pub fn analyze(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        utils::sep_to(&mut out)?;
        self.describe_into(&mut out)?;
        utils::sep_to(&mut out)
    }
}
