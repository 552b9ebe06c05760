use std::fmt;

/// 执行流水线的阶段，只会向前推进
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    ResolveContext,
    PreScript,
    Render,
    Dispatch,
    PostScript,
    Flush,
    Assert,
    Persist,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::ResolveContext => "resolve-context",
            PipelineStage::PreScript => "pre-script",
            PipelineStage::Render => "render",
            PipelineStage::Dispatch => "dispatch",
            PipelineStage::PostScript => "post-script",
            PipelineStage::Flush => "flush",
            PipelineStage::Assert => "assert",
            PipelineStage::Persist => "persist",
            PipelineStage::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
