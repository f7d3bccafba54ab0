use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum Progress {
    BatchStart { total_residues: u64 },
    ResidueStart { index: usize, path: PathBuf },
    StageStart { name: &'static str },
    ResidueFinish { succeeded: bool },
    BatchFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    pub(crate) fn stage(&self, name: &'static str) {
        self.report(Progress::StageStart { name });
    }
}
