//! Dummy device for testing and development.
//!
//! This device doesn't perform any GPU work. Submissions complete the moment
//! they are made, and every submission and GPU wait is appended to an event
//! log so tests can check what a real queue would have been asked to do.

use parking_lot::Mutex;

use super::{CommandManager, GfxDevice, SyncPoint};
use crate::command::{CommandContext, RecordedCommand};
use crate::error::GraphicsError;
use crate::types::QueueType;

/// Something the dummy device was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A command list was submitted.
    Submit {
        /// Queue the list ran on.
        queue: QueueType,
        /// Sync point issued for the list.
        sync_point: SyncPoint,
        /// Recorded commands.
        commands: Vec<RecordedCommand>,
    },
    /// A queue was made to wait on another queue's sync point.
    GpuWait {
        /// Waiting queue.
        queue: QueueType,
        /// Awaited sync point.
        sync_point: SyncPoint,
    },
}

impl DeviceEvent {
    /// Queue the event happened on.
    pub fn queue(&self) -> QueueType {
        match self {
            Self::Submit { queue, .. } | Self::GpuWait { queue, .. } => *queue,
        }
    }
}

/// Recording device.
#[derive(Debug, Default)]
pub struct DummyDevice {
    manager: Mutex<CommandManager>,
    events: Mutex<Vec<DeviceEvent>>,
}

impl DummyDevice {
    /// Create a new dummy device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the device name.
    pub fn name(&self) -> &'static str {
        "Dummy Device"
    }

    /// Snapshot of the event log.
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().clone()
    }

    /// Drain the event log.
    pub fn take_events(&self) -> Vec<DeviceEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Submitted command lists for `queue`, in submission order.
    pub fn submissions(&self, queue: QueueType) -> Vec<(SyncPoint, Vec<RecordedCommand>)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                DeviceEvent::Submit {
                    queue: q,
                    sync_point,
                    commands,
                } if *q == queue => Some((*sync_point, commands.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of contexts `queue` has created so far.
    pub fn contexts_created(&self, queue: QueueType) -> usize {
        self.manager.lock().queue(queue).contexts_created()
    }

    /// Block until every queue has finished its submitted work.
    pub fn wait_for_idle(&self) {
        let manager = self.manager.lock();
        for queue in QueueType::ALL {
            let fence = manager.queue(queue).fence();
            fence.signal(fence.last_issued());
        }
        log::trace!("DummyDevice: idle");
    }
}

impl GfxDevice for DummyDevice {
    fn request_context(&self, queue: QueueType) -> Result<CommandContext, GraphicsError> {
        Ok(self.manager.lock().queue_mut(queue).request_context())
    }

    fn submit_and_recycle(&self, context: CommandContext) -> Result<SyncPoint, GraphicsError> {
        let queue = context.queue();
        let submission = {
            let mut manager = self.manager.lock();
            let submission = manager.submit(context)?;
            // Nothing runs, so the work is complete as soon as it is queued.
            manager
                .queue(queue)
                .fence()
                .signal(submission.sync_point.value());
            submission
        };

        log::trace!(
            "DummyDevice: submitted {} commands to {} ({})",
            submission.commands.len(),
            queue,
            submission.sync_point
        );

        let mut events = self.events.lock();
        events.extend(
            submission
                .waits
                .iter()
                .map(|sync_point| DeviceEvent::GpuWait {
                    queue,
                    sync_point: *sync_point,
                }),
        );
        events.push(DeviceEvent::Submit {
            queue,
            sync_point: submission.sync_point,
            commands: submission.commands,
        });
        Ok(submission.sync_point)
    }

    fn wait_on_gpu(&self, queue: QueueType, sync_point: SyncPoint) -> Result<(), GraphicsError> {
        self.manager.lock().validate_sync_point(sync_point)?;
        log::trace!("DummyDevice: {queue} waits on {sync_point}");
        self.events
            .lock()
            .push(DeviceEvent::GpuWait { queue, sync_point });
        Ok(())
    }

    fn completed_sync_point(&self, queue: QueueType) -> SyncPoint {
        let value = self.manager.lock().queue(queue).fence().completed_value();
        SyncPoint::new(queue, value)
    }
}

static_assertions::assert_impl_all!(DummyDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_records_event() {
        let device = DummyDevice::new();
        let mut ctx = device.request_context(QueueType::Direct).unwrap();
        ctx.begin_event("Frame");
        ctx.end_event();
        let sp = device.submit_and_recycle(ctx).unwrap();

        let events = device.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            DeviceEvent::Submit {
                queue,
                sync_point,
                commands,
            } => {
                assert_eq!(*queue, QueueType::Direct);
                assert_eq!(*sync_point, sp);
                assert_eq!(commands.len(), 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(device.completed_sync_point(QueueType::Direct), sp);
    }

    #[test]
    fn test_context_waits_logged_before_submit() {
        let device = DummyDevice::new();
        let compute = device.request_context(QueueType::AsyncCompute).unwrap();
        let sp = device.submit_and_recycle(compute).unwrap();

        let mut direct = device.request_context(QueueType::Direct).unwrap();
        direct.wait_on_gpu(sp);
        device.submit_and_recycle(direct).unwrap();

        let events = device.take_events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            DeviceEvent::GpuWait {
                queue: QueueType::Direct,
                sync_point: sp
            }
        );
        assert!(matches!(events[2], DeviceEvent::Submit { .. }));
        assert!(device.events().is_empty());
    }

    #[test]
    fn test_wait_on_unissued_sync_point_fails() {
        let device = DummyDevice::new();
        let result = device.wait_on_gpu(QueueType::Direct, SyncPoint::new(QueueType::AsyncCompute, 4));
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_contexts_reused_across_submissions() {
        let device = DummyDevice::new();
        for _ in 0..3 {
            let ctx = device.request_context(QueueType::Direct).unwrap();
            device.submit_and_recycle(ctx).unwrap();
        }
        assert_eq!(device.contexts_created(QueueType::Direct), 1);
        assert_eq!(device.submissions(QueueType::Direct).len(), 3);
        device.wait_for_idle();
    }
}
