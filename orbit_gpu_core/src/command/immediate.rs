//! Blocking one-off GPU submissions outside the frame pipeline
//!
//! Used for uploads at load time. Each call blocks the caller until the GPU
//! has finished, so it must stay off latency-sensitive per-frame paths.

use crate::command::command_buffer::CommandBuffer;
use crate::error::Result;
use crate::gpu_device::{
    CommandBufferLevel, GpuDevice, QueueType, RawCommandPool, RawFence, SubmitInfo,
};
use crate::{engine_error, engine_info};
use std::sync::{Arc, Mutex, PoisonError};

struct ImmediateContext {
    queue: QueueType,
    pool: RawCommandPool,
    command_buffer: CommandBuffer,
    fence: RawFence,
}

impl ImmediateContext {
    fn new(device: &Arc<dyn GpuDevice>, queue: QueueType) -> Result<Self> {
        let pool = device.create_command_pool(queue, true)?;
        let raw = match device.allocate_command_buffers(pool, CommandBufferLevel::Primary, 1) {
            Ok(buffers) => buffers[0],
            Err(e) => {
                device.destroy_command_pool(pool);
                return Err(e);
            }
        };
        // Signaled so the first wait returns immediately
        let fence = match device.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                device.destroy_command_pool(pool);
                return Err(e);
            }
        };

        Ok(Self {
            queue,
            pool,
            command_buffer: CommandBuffer::new(Arc::clone(device), raw, CommandBufferLevel::Primary, queue),
            fence,
        })
    }
}

/// One command buffer and fence per target queue
pub struct ImmediateSubmitter {
    device: Arc<dyn GpuDevice>,
    graphics: Mutex<ImmediateContext>,
    transfer: Option<Mutex<ImmediateContext>>,
}

impl ImmediateSubmitter {
    pub fn new(device: Arc<dyn GpuDevice>) -> Result<Self> {
        let graphics = ImmediateContext::new(&device, QueueType::Graphics)?;
        let transfer = if device.has_dedicated_transfer_queue() {
            Some(Mutex::new(ImmediateContext::new(&device, QueueType::Transfer)?))
        } else {
            None
        };

        engine_info!(
            "orbit::ImmediateSubmitter",
            "Immediate submit ready (dedicated transfer queue: {})",
            transfer.is_some()
        );

        Ok(Self {
            device,
            graphics: Mutex::new(graphics),
            transfer,
        })
    }

    /// True if transfer submissions go to their own queue
    pub fn has_dedicated_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    /// Queue that work requested on `queue` actually runs on
    pub fn resolve_queue(&self, queue: QueueType) -> QueueType {
        match queue {
            QueueType::Transfer if self.transfer.is_some() => QueueType::Transfer,
            _ => QueueType::Graphics,
        }
    }

    /// Record with `record`, submit on `queue` and block until the GPU is done
    ///
    /// Transfer requests fall back to the graphics queue when the device has
    /// no dedicated transfer queue. Concurrent callers targeting the same
    /// queue are serialized.
    pub fn submit<F>(&self, queue: QueueType, record: F) -> Result<()>
    where
        F: FnOnce(&mut CommandBuffer) -> Result<()>,
    {
        let context = match (queue, &self.transfer) {
            (QueueType::Transfer, Some(transfer)) => transfer,
            _ => &self.graphics,
        };
        let mut ctx = context.lock().unwrap_or_else(PoisonError::into_inner);
        let fence = ctx.fence;
        let target = ctx.queue;

        self.device.wait_for_fence(fence, u64::MAX)?;

        ctx.command_buffer.reset()?;
        ctx.command_buffer.begin()?;
        record(&mut ctx.command_buffer)?;
        ctx.command_buffer.end()?;

        let command_buffers = [ctx.command_buffer.raw()];
        let info = SubmitInfo {
            command_buffers: &command_buffers,
            wait_semaphores: &[],
            signal_semaphores: &[],
        };

        self.device.reset_fence(fence)?;
        if let Err(e) = self.device.submit(target, &info, Some(fence)) {
            engine_error!(
                "orbit::ImmediateSubmitter",
                "Immediate submit on {:?} queue failed: {}",
                target,
                e
            );
            return Err(e);
        }
        self.device.wait_for_fence(fence, u64::MAX)
    }
}

impl Drop for ImmediateSubmitter {
    fn drop(&mut self) {
        let contexts = std::iter::once(&mut self.graphics).chain(self.transfer.as_mut());
        for context in contexts {
            let ctx = context.get_mut().unwrap_or_else(PoisonError::into_inner);
            self.device.destroy_fence(ctx.fence);
            self.device.destroy_command_pool(ctx.pool);
        }
    }
}

#[cfg(test)]
#[path = "immediate_tests.rs"]
mod tests;
