//! Derived-view invalidation.
//!
//! Every write names the views it makes stale; subscribers decide how to
//! refresh them.

use course_core::model::{ExamId, ModuleId, StudentId, SubjectId};
use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// A derived view that may need to be re-fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum CacheKey {
    SubjectProgress {
        student_id: StudentId,
        subject_id: SubjectId,
    },
    /// The multi-subject progress aggregate of one student.
    SubjectProgressList { student_id: StudentId },
    ExamForModule { module_id: ModuleId },
    ExamResults {
        student_id: StudentId,
        exam_id: ExamId,
    },
    /// Every student's results for an exam.
    AllExamResults { exam_id: ExamId },
}

#[derive(Debug, Clone)]
pub struct InvalidationBus {
    sender: broadcast::Sender<CacheKey>,
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InvalidationBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.sender.subscribe()
    }

    /// Announce stale views. Returns how many subscribers were notified.
    pub fn publish<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = CacheKey>,
    {
        let mut delivered = 0;
        for key in keys {
            match self.sender.send(key) {
                Ok(n) => delivered = delivered.max(n),
                Err(_) => tracing::trace!(?key, "no invalidation subscribers"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_keys_in_order() {
        let bus = InvalidationBus::default();
        let mut rx = bus.subscribe();
        let student_id = StudentId::new(1);

        let notified = bus.publish([
            CacheKey::SubjectProgress {
                student_id,
                subject_id: SubjectId::new(2),
            },
            CacheKey::SubjectProgressList { student_id },
        ]);
        assert_eq!(notified, 1);

        assert_eq!(
            rx.recv().await.unwrap(),
            CacheKey::SubjectProgress {
                student_id,
                subject_id: SubjectId::new(2)
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            CacheKey::SubjectProgressList { student_id }
        );
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = InvalidationBus::new(4);
        assert_eq!(
            bus.publish([CacheKey::ExamForModule {
                module_id: ModuleId::new(1)
            }]),
            0
        );
    }
}
