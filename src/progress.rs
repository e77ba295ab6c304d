/// Progress update emitted while the pipeline walks its samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineProgress {
    /// Stage name (`"features"`, `"evaluate"`).
    pub stage: &'static str,
    /// Samples handled so far, including skipped ones.
    pub processed: usize,
    /// Total samples in the stage.
    pub total: usize,
    /// Samples skipped so far.
    pub skipped: usize,
}

/// Optional progress sink passed down the pipeline.
pub type ProgressCallback<'a> = Option<&'a mut dyn FnMut(PipelineProgress)>;

pub(crate) fn progress_tick(
    progress: &mut ProgressCallback<'_>,
    stage: &'static str,
    processed: usize,
    total: usize,
    skipped: usize,
) {
    if let Some(callback) = progress.as_deref_mut() {
        callback(PipelineProgress {
            stage,
            processed,
            total,
            skipped,
        });
    }
}
