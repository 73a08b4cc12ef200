use crate::driver::ContextReport;

/// Checkpoint callbacks invoked synchronously by the driver
pub trait Progress {
    /// A context is about to be connected and enumerated
    fn context_started(&self, _context: &str) {}

    /// A context's report is about to be rendered (success or failure)
    fn context_finished(&self, _report: &ContextReport) {}
}

impl<T: Progress + ?Sized> Progress for &T {
    fn context_started(&self, context: &str) {
        (**self).context_started(context);
    }

    fn context_finished(&self, report: &ContextReport) {
        (**self).context_finished(report);
    }
}

/// Progress sink that ignores every checkpoint
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {}
