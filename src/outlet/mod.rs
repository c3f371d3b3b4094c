use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// 报告输出
pub trait Outlet {
    async fn save(&self, report: &str) -> Result<()>;
}

/// 将报告写入本地文件
pub struct DiskOutlet {
    output_path: PathBuf,
}

impl DiskOutlet {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl Outlet for DiskOutlet {
    async fn save(&self, report: &str) -> Result<()> {
        // 确保父目录存在
        if let Some(parent_dir) = self.output_path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir).with_context(|| {
                    format!("Failed to create output directory: {}", parent_dir.display())
                })?;
            }
        }

        fs::write(&self.output_path, report).with_context(|| {
            format!("Failed to write report: {}", self.output_path.display())
        })?;

        tracing::info!(path = %self.output_path.display(), "report saved");
        Ok(())
    }
}
