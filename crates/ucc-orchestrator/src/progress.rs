//! `ProgressBus` (`spec.md` §4.11): pub/sub with per-`job_id` topics. This is
//! the redesign `spec.md` §9 calls for in place of the source's callback/
//! WebSocket-handler coupling — a `tokio::sync::broadcast` channel per job,
//! with the last frame cached so a late subscriber still gets an `initial`
//! snapshot before live frames.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use ucc_core::types::JobStatus;

const TOPIC_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    Initial,
    Progress,
    Final,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressFrame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressFrame {
    pub fn progress(job_id: Uuid, segment: u8, segment_name: impl Into<String>, pct: u8) -> Self {
        Self {
            frame_type: FrameType::Progress,
            job_id,
            status: JobStatus::Running,
            segment: Some(segment),
            segment_name: Some(segment_name.into()),
            progress_pct: Some(pct),
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn retrying(job_id: Uuid, error_message: impl Into<String>) -> Self {
        Self {
            frame_type: FrameType::Error,
            job_id,
            status: JobStatus::Retrying,
            segment: None,
            segment_name: None,
            progress_pct: None,
            error_message: Some(error_message.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn terminal(job_id: Uuid, status: JobStatus, error_message: Option<String>) -> Self {
        Self {
            frame_type: if status == JobStatus::Completed {
                FrameType::Final
            } else {
                FrameType::Error
            },
            job_id,
            status,
            segment: None,
            segment_name: None,
            progress_pct: if status == JobStatus::Completed {
                Some(100)
            } else {
                None
            },
            error_message,
            timestamp: Utc::now(),
        }
    }
}

struct Topic {
    sender: broadcast::Sender<ProgressFrame>,
    last: ProgressFrame,
}

/// Many publishers are permitted by the type system, but `spec.md` §5 limits
/// this to one in practice: only the worker owning a `job_id` ever publishes
/// to it.
#[derive(Default)]
pub struct ProgressBus {
    topics: RwLock<HashMap<Uuid, Topic>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a frame, creating the topic if this is the first one for
    /// `job_id`. At-least-once: a `broadcast::send` with no subscribers is
    /// not an error, it's simply a frame nobody was listening for yet — the
    /// cached `last` frame is what makes a later subscriber catch up.
    pub async fn publish(&self, frame: ProgressFrame) {
        let mut topics = self.topics.write().await;
        match topics.get_mut(&frame.job_id) {
            Some(topic) => {
                topic.last = frame.clone();
                let _ = topic.sender.send(frame);
            }
            None => {
                let (sender, _rx) = broadcast::channel(TOPIC_CAPACITY);
                let _ = sender.send(frame.clone());
                topics.insert(
                    frame.job_id,
                    Topic {
                        sender,
                        last: frame,
                    },
                );
            }
        }
    }

    /// Subscribe to `job_id`'s topic. Always returns an `initial` snapshot
    /// first — either the topic's last published frame (retyped as
    /// `initial`) or, if nothing has published yet, `fallback` (typically
    /// derived from the caller's own `JobStore::get`).
    pub async fn subscribe(
        &self,
        job_id: Uuid,
        fallback: ProgressFrame,
    ) -> (ProgressFrame, broadcast::Receiver<ProgressFrame>) {
        let mut topics = self.topics.write().await;
        let topic = topics.entry(job_id).or_insert_with(|| {
            let (sender, _rx) = broadcast::channel(TOPIC_CAPACITY);
            Topic {
                sender,
                last: fallback,
            }
        });
        let mut initial = topic.last.clone();
        initial.frame_type = FrameType::Initial;
        (initial, topic.sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback(job_id: Uuid) -> ProgressFrame {
        ProgressFrame {
            frame_type: FrameType::Initial,
            job_id,
            status: JobStatus::Pending,
            segment: None,
            segment_name: None,
            progress_pct: None,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn late_subscriber_gets_last_frame_as_initial() {
        let bus = ProgressBus::new();
        let job_id = Uuid::new_v4();
        bus.publish(ProgressFrame::progress(job_id, 3, "A: Classification", 27))
            .await;

        let (initial, _rx) = bus.subscribe(job_id, fallback(job_id)).await;
        assert_eq!(initial.frame_type, FrameType::Initial);
        assert_eq!(initial.segment, Some(3));
    }

    #[tokio::test]
    async fn subscriber_before_any_publish_gets_fallback() {
        let bus = ProgressBus::new();
        let job_id = Uuid::new_v4();
        let (initial, _rx) = bus.subscribe(job_id, fallback(job_id)).await;
        assert_eq!(initial.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn subscriber_receives_subsequent_live_frames() {
        let bus = ProgressBus::new();
        let job_id = Uuid::new_v4();
        let (_initial, mut rx) = bus.subscribe(job_id, fallback(job_id)).await;
        bus.publish(ProgressFrame::progress(job_id, 1, "A: Layout", 9))
            .await;
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.frame_type, FrameType::Progress);
        assert_eq!(frame.segment, Some(1));
    }
}
