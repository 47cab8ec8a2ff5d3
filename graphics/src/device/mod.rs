//! Device abstraction.
//!
//! The render graph talks to the GPU through four primitives collected in
//! [`GfxDevice`]: request a context for a queue, submit it, make a queue wait
//! on a sync point, and read back how far a queue has progressed.
//!
//! # Available Devices
//!
//! - `dummy` (default): [`DummyDevice`], which executes nothing but records
//!   every submission and wait for inspection
//!
//! Backends share [`CommandManager`], which owns one [`CommandQueue`] per
//! queue kind: its timeline fence and its pool of recycled contexts.

#[cfg(feature = "dummy")]
mod dummy;
mod sync;

#[cfg(feature = "dummy")]
pub use dummy::{DeviceEvent, DummyDevice};
pub use sync::{Fence, SyncPoint};

use crate::command::{CommandContext, RecordedCommand};
use crate::error::GraphicsError;
use crate::types::QueueType;

/// GPU device primitives used by the render graph.
pub trait GfxDevice {
    /// Take an open context for `queue`.
    fn request_context(&self, queue: QueueType) -> Result<CommandContext, GraphicsError>;

    /// Close and submit `context`, returning it to its queue's pool.
    ///
    /// The returned sync point is reached when the submitted work completes.
    fn submit_and_recycle(&self, context: CommandContext) -> Result<SyncPoint, GraphicsError>;

    /// Make `queue` wait on the GPU until `sync_point` is reached.
    fn wait_on_gpu(&self, queue: QueueType, sync_point: SyncPoint) -> Result<(), GraphicsError>;

    /// Latest sync point `queue` has completed.
    fn completed_sync_point(&self, queue: QueueType) -> SyncPoint;
}

/// Work handed to a queue by one submission.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Sync point signaled when the work completes.
    pub sync_point: SyncPoint,
    /// Sync points the queue waits on before running the commands.
    pub waits: Vec<SyncPoint>,
    /// Recorded commands.
    pub commands: Vec<RecordedCommand>,
}

/// One GPU queue: its timeline fence and its recycled contexts.
#[derive(Debug)]
pub struct CommandQueue {
    queue_type: QueueType,
    fence: Fence,
    free_contexts: Vec<CommandContext>,
    contexts_created: usize,
}

impl CommandQueue {
    /// Create a queue with an empty context pool.
    pub fn new(queue_type: QueueType) -> Self {
        Self {
            queue_type,
            fence: Fence::new(queue_type),
            free_contexts: Vec::new(),
            contexts_created: 0,
        }
    }

    /// Kind of this queue.
    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// Timeline fence of this queue.
    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    /// Take a recycled context, or create one if the pool is empty.
    pub fn request_context(&mut self) -> CommandContext {
        match self.free_contexts.pop() {
            Some(mut context) => {
                context.reset();
                context
            }
            None => {
                self.contexts_created += 1;
                log::trace!(
                    "Creating command context #{} for {}",
                    self.contexts_created,
                    self.queue_type
                );
                CommandContext::new(self.queue_type)
            }
        }
    }

    /// Close `context`, issue the next fence value and recycle the context.
    pub fn submit(&mut self, mut context: CommandContext) -> Result<Submission, GraphicsError> {
        if context.queue() != self.queue_type {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} context submitted to the {} queue",
                context.queue(),
                self.queue_type
            )));
        }
        if context.is_open() {
            context.close()?;
        }

        let (commands, waits) = context.take_recording();
        let sync_point = self.fence.issue();
        context.reset();
        self.free_contexts.push(context);

        Ok(Submission {
            sync_point,
            waits,
            commands,
        })
    }

    /// Contexts waiting in the pool.
    pub fn free_context_count(&self) -> usize {
        self.free_contexts.len()
    }

    /// Contexts created over the queue's lifetime.
    pub fn contexts_created(&self) -> usize {
        self.contexts_created
    }
}

/// The queues of one device.
#[derive(Debug)]
pub struct CommandManager {
    queues: [CommandQueue; 3],
}

impl CommandManager {
    /// Create a manager with one queue per [`QueueType`].
    pub fn new() -> Self {
        Self {
            queues: QueueType::ALL.map(CommandQueue::new),
        }
    }

    /// Queue of the given kind.
    pub fn queue(&self, queue: QueueType) -> &CommandQueue {
        &self.queues[queue.index()]
    }

    /// Mutable queue of the given kind.
    pub fn queue_mut(&mut self, queue: QueueType) -> &mut CommandQueue {
        &mut self.queues[queue.index()]
    }

    /// Fail unless `sync_point` has been issued by its queue.
    pub fn validate_sync_point(&self, sync_point: SyncPoint) -> Result<(), GraphicsError> {
        if self.queue(sync_point.queue()).fence().has_issued(sync_point) {
            Ok(())
        } else {
            Err(GraphicsError::InvalidParameter(format!(
                "sync point {sync_point} was never issued"
            )))
        }
    }

    /// Submit `context` to its own queue after validating its waits.
    pub fn submit(&mut self, context: CommandContext) -> Result<Submission, GraphicsError> {
        for wait in context.pending_waits() {
            self.validate_sync_point(*wait)?;
        }
        self.queue_mut(context.queue()).submit(context)
    }
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_recycled() {
        let mut queue = CommandQueue::new(QueueType::Direct);
        let mut ctx = queue.request_context();
        ctx.set_stencil_ref(2);
        let submission = queue.submit(ctx).unwrap();
        assert_eq!(submission.commands.len(), 1);
        assert_eq!(queue.free_context_count(), 1);

        let ctx = queue.request_context();
        assert!(ctx.is_open());
        assert!(ctx.commands().is_empty());
        assert_eq!(queue.contexts_created(), 1);
        assert_eq!(queue.free_context_count(), 0);
    }

    #[test]
    fn test_submission_values_increase() {
        let mut queue = CommandQueue::new(QueueType::AsyncCompute);
        let ctx = queue.request_context();
        let a = queue.submit(ctx).unwrap();
        let ctx = queue.request_context();
        let b = queue.submit(ctx).unwrap();
        assert!(a.sync_point < b.sync_point);
        assert_eq!(b.sync_point.queue(), QueueType::AsyncCompute);
    }

    #[test]
    fn test_wrong_queue_rejected() {
        let mut queue = CommandQueue::new(QueueType::Direct);
        let ctx = CommandContext::new(QueueType::AsyncCompute);
        assert!(matches!(
            queue.submit(ctx),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_unissued_wait_rejected() {
        let mut manager = CommandManager::new();
        let mut ctx = manager.queue_mut(QueueType::Direct).request_context();
        ctx.wait_on_gpu(SyncPoint::new(QueueType::AsyncCompute, 1));
        assert!(manager.submit(ctx).is_err());

        let compute = manager.queue_mut(QueueType::AsyncCompute).request_context();
        let sp = manager.submit(compute).unwrap().sync_point;
        let mut ctx = manager.queue_mut(QueueType::Direct).request_context();
        ctx.wait_on_gpu(sp);
        let submission = manager.submit(ctx).unwrap();
        assert_eq!(submission.waits, vec![sp]);
    }
}
