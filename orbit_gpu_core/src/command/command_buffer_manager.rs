//! Per-frame, per-thread command buffer pools
//!
//! The grid holds `frames_in_flight × num_threads` cells. Each cell owns one
//! native command pool with a fixed set of pre-allocated primary and
//! secondary command buffers plus "next free" cursors. Cursors are zeroed by
//! `reset_pools` once per frame, after the frame's fence has been waited on.

use crate::command::command_buffer::CommandBuffer;
use crate::command::immediate::ImmediateSubmitter;
use crate::error::Result;
use crate::gpu_device::{
    CommandBufferLevel, GpuDevice, InheritanceInfo, QueueType, RawCommandBuffer, RawCommandPool,
};
use crate::{engine_debug, engine_info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Primary command buffers available per (frame slot, thread) cell
pub const MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD: u32 = 4;

/// Secondary command buffers available per (frame slot, thread) cell
pub const MAX_SECONDARY_COMMAND_BUFFERS_PER_THREAD: u32 = 16;

/// Command buffers handed out from one frame slot since its last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandBufferStats {
    pub primary_in_use: u32,
    pub secondary_in_use: u32,
    /// Number of pool resets performed on this slot
    pub resets: u64,
}

struct CommandPoolCell {
    pool: RawCommandPool,
    primary: Vec<RawCommandBuffer>,
    secondary: Vec<RawCommandBuffer>,
    next_primary: u32,
    next_secondary: u32,
    resets: u64,
}

pub struct CommandBufferManager {
    device: Arc<dyn GpuDevice>,
    frames_in_flight: u32,
    num_threads: u32,
    cells: Vec<Mutex<CommandPoolCell>>,
    immediate: Arc<ImmediateSubmitter>,
}

impl CommandBufferManager {
    /// Allocate the full command pool grid and the immediate-submit contexts
    ///
    /// Native failures here indicate device loss or gross misconfiguration
    /// and are returned to the caller as fatal.
    pub fn new(device: Arc<dyn GpuDevice>, frames_in_flight: u32, num_threads: u32) -> Result<Self> {
        assert!(frames_in_flight > 0, "frames_in_flight must be greater than zero");
        assert!(num_threads > 0, "num_threads must be greater than zero");

        let immediate = Arc::new(ImmediateSubmitter::new(Arc::clone(&device))?);

        let mut manager = Self {
            device: Arc::clone(&device),
            frames_in_flight,
            num_threads,
            cells: Vec::with_capacity((frames_in_flight * num_threads) as usize),
            immediate,
        };

        // Cells pushed so far are released by Drop if a later allocation fails
        for _ in 0..frames_in_flight * num_threads {
            let pool = device.create_command_pool(QueueType::Graphics, false)?;
            let buffers = device
                .allocate_command_buffers(pool, CommandBufferLevel::Primary, MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD)
                .and_then(|primary| {
                    let secondary = device.allocate_command_buffers(
                        pool,
                        CommandBufferLevel::Secondary,
                        MAX_SECONDARY_COMMAND_BUFFERS_PER_THREAD,
                    )?;
                    Ok((primary, secondary))
                });
            let (primary, secondary) = match buffers {
                Ok(buffers) => buffers,
                Err(e) => {
                    device.destroy_command_pool(pool);
                    return Err(e);
                }
            };

            manager.cells.push(Mutex::new(CommandPoolCell {
                pool,
                primary,
                secondary,
                next_primary: 0,
                next_secondary: 0,
                resets: 0,
            }));
        }

        engine_info!(
            "orbit::CommandBufferManager",
            "Created {} command pools ({} frames x {} threads, {} primary + {} secondary each)",
            frames_in_flight * num_threads,
            frames_in_flight,
            num_threads,
            MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD,
            MAX_SECONDARY_COMMAND_BUFFERS_PER_THREAD
        );

        Ok(manager)
    }

    pub fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    pub fn num_threads(&self) -> u32 {
        self.num_threads
    }

    /// Shared immediate-submit path
    pub fn immediate(&self) -> &Arc<ImmediateSubmitter> {
        &self.immediate
    }

    fn cell(&self, frame_slot: u32, thread_index: u32) -> MutexGuard<'_, CommandPoolCell> {
        assert!(
            frame_slot < self.frames_in_flight,
            "frame slot {} out of range (frames in flight: {})",
            frame_slot,
            self.frames_in_flight
        );
        assert!(
            thread_index < self.num_threads,
            "thread index {} out of range (threads: {})",
            thread_index,
            self.num_threads
        );
        let index = (frame_slot * self.num_threads + thread_index) as usize;
        self.cells[index].lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset every pool of `frame_slot` and zero its cursors
    ///
    /// Must run once per frame, after the slot's fence has been waited on.
    pub fn reset_pools(&self, frame_slot: u32) -> Result<()> {
        for thread_index in 0..self.num_threads {
            let mut cell = self.cell(frame_slot, thread_index);
            self.device.reset_command_pool(cell.pool)?;
            cell.next_primary = 0;
            cell.next_secondary = 0;
            cell.resets += 1;
        }
        engine_debug!("orbit::CommandBufferManager", "Reset command pools of frame slot {}", frame_slot);
        Ok(())
    }

    /// Next unused primary command buffer of a cell, optionally reset and begun
    ///
    /// # Panics
    ///
    /// Panics when the cell's `MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD` buffers
    /// have all been handed out since the last `reset_pools`.
    pub fn get_command_buffer(&self, frame_slot: u32, thread_index: u32, begin: bool) -> Result<CommandBuffer> {
        let raw = {
            let mut cell = self.cell(frame_slot, thread_index);
            assert!(
                cell.next_primary < MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD,
                "primary command buffer budget exhausted for frame slot {} thread {} ({} per frame)",
                frame_slot,
                thread_index,
                MAX_PRIMARY_COMMAND_BUFFERS_PER_THREAD
            );
            let raw = cell.primary[cell.next_primary as usize];
            cell.next_primary += 1;
            raw
        };

        let mut command_buffer = CommandBuffer::new(
            Arc::clone(&self.device),
            raw,
            CommandBufferLevel::Primary,
            QueueType::Graphics,
        );
        if begin {
            command_buffer.reset()?;
            command_buffer.begin()?;
        }
        Ok(command_buffer)
    }

    /// Next unused secondary command buffer of a cell
    ///
    /// With `inheritance` the buffer is begun for recording inside a
    /// primary buffer's rendering scope.
    ///
    /// # Panics
    ///
    /// Panics when the cell's secondary budget is exhausted.
    pub fn get_secondary_command_buffer(
        &self,
        frame_slot: u32,
        thread_index: u32,
        inheritance: Option<&InheritanceInfo>,
    ) -> Result<CommandBuffer> {
        let raw = {
            let mut cell = self.cell(frame_slot, thread_index);
            assert!(
                cell.next_secondary < MAX_SECONDARY_COMMAND_BUFFERS_PER_THREAD,
                "secondary command buffer budget exhausted for frame slot {} thread {} ({} per frame)",
                frame_slot,
                thread_index,
                MAX_SECONDARY_COMMAND_BUFFERS_PER_THREAD
            );
            let raw = cell.secondary[cell.next_secondary as usize];
            cell.next_secondary += 1;
            raw
        };

        let mut command_buffer = CommandBuffer::new(
            Arc::clone(&self.device),
            raw,
            CommandBufferLevel::Secondary,
            QueueType::Graphics,
        );
        if let Some(inheritance) = inheritance {
            command_buffer.reset()?;
            command_buffer.begin_secondary(inheritance)?;
        }
        Ok(command_buffer)
    }

    /// Blocking one-off submission (see [`ImmediateSubmitter::submit`])
    pub fn immediate_submit<F>(&self, queue: QueueType, record: F) -> Result<()>
    where
        F: FnOnce(&mut CommandBuffer) -> Result<()>,
    {
        self.immediate.submit(queue, record)
    }

    /// Buffers handed out from `frame_slot` across all threads
    pub fn stats(&self, frame_slot: u32) -> CommandBufferStats {
        (0..self.num_threads).fold(CommandBufferStats::default(), |mut stats, thread_index| {
            let cell = self.cell(frame_slot, thread_index);
            stats.primary_in_use += cell.next_primary;
            stats.secondary_in_use += cell.next_secondary;
            stats.resets = stats.resets.max(cell.resets);
            stats
        })
    }
}

impl Drop for CommandBufferManager {
    fn drop(&mut self) {
        for cell in &mut self.cells {
            let cell = cell.get_mut().unwrap_or_else(PoisonError::into_inner);
            self.device.destroy_command_pool(cell.pool);
        }
    }
}

#[cfg(test)]
#[path = "command_buffer_manager_tests.rs"]
mod tests;
