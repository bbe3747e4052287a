/// A cancellable progress indicator shown while a batch runs.
pub trait Progress {
    /// Replace the message line, e.g. with the current item's name
    fn update_message(&mut self, text: &str);
    /// True once the operator asked to stop
    fn is_cancelled(&self) -> bool;
    /// Remove the indicator
    fn close(&mut self);
}

/// Lifecycle of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// What a finished run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Items visited before the run ended
    pub processed: usize,
    pub aborted: bool,
}

/// Visits work items one at a time behind a progress indicator.
///
/// Cancellation is checked before each item: the item in flight always
/// finishes, and no further items are dispatched. Cancellation is a normal
/// ending, never an error.
pub struct BatchRunner<P: Progress> {
    progress: P,
    state: BatchState,
    processed: usize,
}

impl<P: Progress> BatchRunner<P> {
    pub fn new(progress: P) -> Self {
        BatchRunner {
            progress,
            state: BatchState::Idle,
            processed: 0,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Run `visit` over `items`, labelling each in the progress message.
    pub fn run<T, L, V>(&mut self, items: impl IntoIterator<Item = T>, label: L, mut visit: V) -> BatchReport
    where
        L: Fn(&T) -> String,
        V: FnMut(T),
    {
        self.state = BatchState::Running;
        self.processed = 0;

        for item in items {
            if self.progress.is_cancelled() {
                self.state = BatchState::Aborted;
                break;
            }
            self.progress.update_message(&label(&item));
            visit(item);
            self.processed += 1;
        }

        if self.state == BatchState::Running {
            self.state = BatchState::Completed;
        }
        self.progress.close();

        BatchReport {
            processed: self.processed,
            aborted: self.state == BatchState::Aborted,
        }
    }
}
