//! One-shot command buffer submission.

use crate::device::DeviceHandlePair;
use crate::error::{GpuError, Result};
use ash::prelude::VkResult;
use ash::vk;
use ash::vk::Handle;

/// The device entry points a [`QueueClosure`] needs.
///
/// Implemented for [`ash::Device`]; other implementations exist to drive the
/// helper without a driver.
pub trait CommandDevice {
    /// Create a command pool for `family`.
    ///
    /// # Safety
    /// `family` must be a valid queue family of the device.
    unsafe fn create_command_pool(
        &self,
        family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool>;

    /// Destroy `pool` and every buffer allocated from it.
    ///
    /// # Safety
    /// No buffer allocated from `pool` may be pending execution.
    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool);

    /// Allocate one primary command buffer from `pool`.
    ///
    /// # Safety
    /// `pool` must be valid.
    unsafe fn allocate_primary_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer>;

    /// Return `buffer` to `pool`.
    ///
    /// # Safety
    /// `buffer` must have been allocated from `pool` and not be pending.
    unsafe fn free_command_buffer(&self, pool: vk::CommandPool, buffer: vk::CommandBuffer);

    /// Begin recording `buffer`.
    ///
    /// # Safety
    /// `buffer` must be in the initial state.
    unsafe fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()>;

    /// End recording `buffer`.
    ///
    /// # Safety
    /// `buffer` must be recording.
    unsafe fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()>;

    /// Submit a single batch to `queue`.
    ///
    /// # Safety
    /// Every handle referenced by `submit` must be valid.
    unsafe fn queue_submit(
        &self,
        queue: vk::Queue,
        submit: &vk::SubmitInfo<'_>,
        fence: vk::Fence,
    ) -> VkResult<()>;

    /// Block until `queue` has no pending work.
    ///
    /// # Safety
    /// `queue` must be valid.
    unsafe fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()>;

    /// Block until `fence` is signaled.
    ///
    /// # Safety
    /// `fence` must be valid and part of a pending submission.
    unsafe fn wait_for_fence(&self, fence: vk::Fence) -> VkResult<()>;
}

impl CommandDevice for ash::Device {
    unsafe fn create_command_pool(
        &self,
        family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(family)
            .flags(flags);
        ash::Device::create_command_pool(self, &create_info, None)
    }

    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool) {
        ash::Device::destroy_command_pool(self, pool, None);
    }

    unsafe fn allocate_primary_buffer(&self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = self.allocate_command_buffers(&alloc_info)?;
        buffers
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    unsafe fn free_command_buffer(&self, pool: vk::CommandPool, buffer: vk::CommandBuffer) {
        self.free_command_buffers(pool, &[buffer]);
    }

    unsafe fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> VkResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        ash::Device::begin_command_buffer(self, buffer, &begin_info)
    }

    unsafe fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        ash::Device::end_command_buffer(self, buffer)
    }

    unsafe fn queue_submit(
        &self,
        queue: vk::Queue,
        submit: &vk::SubmitInfo<'_>,
        fence: vk::Fence,
    ) -> VkResult<()> {
        ash::Device::queue_submit(self, queue, std::slice::from_ref(submit), fence)
    }

    unsafe fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()> {
        ash::Device::queue_wait_idle(self, queue)
    }

    unsafe fn wait_for_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.wait_for_fences(&[fence], true, u64::MAX)
    }
}

/// Synchronization attached to a one-shot submission.
#[derive(Debug, Clone, Copy)]
pub struct SubmitSync<'a> {
    /// Semaphores waited on before execution.
    pub wait_semaphores: &'a [vk::Semaphore],
    /// One stage mask per wait semaphore.
    pub wait_stages: &'a [vk::PipelineStageFlags],
    /// Semaphores signaled on completion.
    pub signal_semaphores: &'a [vk::Semaphore],
    /// Fence signaled on completion, or null.
    pub fence: vk::Fence,
    /// Block until the queue is idle after a successful submit.
    ///
    /// A buffer from the internal pool is always waited on before the pool
    /// is released: on `fence` when one is set, on the queue otherwise.
    pub wait_idle: bool,
}

impl Default for SubmitSync<'_> {
    fn default() -> Self {
        Self {
            wait_semaphores: &[],
            wait_stages: &[],
            signal_semaphores: &[],
            fence: vk::Fence::null(),
            wait_idle: true,
        }
    }
}

/// Pool created by the closure and the buffer begun on it.
#[derive(Debug, Clone, Copy)]
struct InternalPool {
    pool: vk::CommandPool,
    buffer: Option<vk::CommandBuffer>,
}

/// Records and submits short-lived command buffers on one queue.
///
/// When no pool is supplied to [`begin_one_submit_commands`], a transient pool
/// is created for the queue's family and destroyed again once its buffer has
/// been submitted and completed, or when the closure is dropped. Buffers
/// begun on a caller pool are never freed by the closure.
///
/// [`begin_one_submit_commands`]: QueueClosure::begin_one_submit_commands
pub struct QueueClosure<'d, D: CommandDevice = ash::Device> {
    device: &'d D,
    pair: DeviceHandlePair,
    queue: vk::Queue,
    family: u32,
    internal: Option<InternalPool>,
}

impl<'d, D: CommandDevice> QueueClosure<'d, D> {
    /// Bind a queue of `family` on `device`.
    ///
    /// # Safety
    /// `queue` must belong to `family` on `device`, and the device must stay
    /// valid until the closure is dropped.
    pub unsafe fn new(
        device: &'d D,
        pair: DeviceHandlePair,
        queue: vk::Queue,
        family: u32,
    ) -> Self {
        Self {
            device,
            pair,
            queue,
            family,
            internal: None,
        }
    }

    /// Get the queue commands are submitted to.
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Get the queue family index.
    pub fn family(&self) -> u32 {
        self.family
    }

    /// Get the (device, physical device) pair the queue belongs to.
    pub fn device_pair(&self) -> DeviceHandlePair {
        self.pair
    }

    /// Whether a pool created by [`Self::begin_one_submit_commands`] is live.
    pub fn owns_internal_pool(&self) -> bool {
        self.internal.is_some()
    }

    fn owns_buffer(&self, cmd: vk::CommandBuffer) -> bool {
        self.internal
            .is_some_and(|internal| internal.buffer == Some(cmd))
    }

    /// Allocate a primary command buffer and begin it for one submission.
    ///
    /// Without `pool` a transient pool is created and owned by the closure.
    /// Only one such pool may be live at a time.
    ///
    /// # Safety
    /// `pool`, if given, must belong to this closure's device and family.
    pub unsafe fn begin_one_submit_commands(
        &mut self,
        pool: Option<vk::CommandPool>,
    ) -> Result<vk::CommandBuffer> {
        match pool {
            Some(pool) => self.begin_on_caller_pool(pool),
            None => self.begin_on_internal_pool(),
        }
    }

    unsafe fn begin_on_caller_pool(&self, pool: vk::CommandPool) -> Result<vk::CommandBuffer> {
        let cmd = self.device.allocate_primary_buffer(pool)?;
        if let Err(e) = self
            .device
            .begin_command_buffer(cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
        {
            self.device.free_command_buffer(pool, cmd);
            return Err(e.into());
        }
        Ok(cmd)
    }

    unsafe fn begin_on_internal_pool(&mut self) -> Result<vk::CommandBuffer> {
        if self.internal.is_some() {
            return Err(GpuError::InvalidState(
                "one-shot commands already begun on an internal pool".into(),
            ));
        }

        let pool = self
            .device
            .create_command_pool(self.family, vk::CommandPoolCreateFlags::TRANSIENT)?;
        self.internal = Some(InternalPool { pool, buffer: None });

        let cmd = match self.device.allocate_primary_buffer(pool) {
            Ok(cmd) => cmd,
            Err(e) => {
                self.release_internal_pool();
                return Err(e.into());
            }
        };
        self.internal = Some(InternalPool {
            pool,
            buffer: Some(cmd),
        });

        if let Err(e) = self
            .device
            .begin_command_buffer(cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
        {
            self.release_internal_pool();
            return Err(e.into());
        }

        Ok(cmd)
    }

    /// End `cmd`, submit it alone and wait for the queue to go idle.
    ///
    /// # Safety
    /// `cmd` must come from [`Self::begin_one_submit_commands`] on this closure.
    pub unsafe fn finish_one_submit_commands(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
        self.finish_one_submit_commands_with(cmd, &SubmitSync::default())
    }

    /// End `cmd` and submit it with the given synchronization.
    ///
    /// Returns the outcome of ending and submitting the buffer. A failed wait
    /// after a successful submit is logged, not returned. If `cmd` came from
    /// the internal pool, the pool is released whatever the outcome.
    ///
    /// # Safety
    /// `cmd` must come from [`Self::begin_one_submit_commands`] on this
    /// closure, and every handle in `sync` must be valid.
    pub unsafe fn finish_one_submit_commands_with(
        &mut self,
        cmd: vk::CommandBuffer,
        sync: &SubmitSync<'_>,
    ) -> Result<()> {
        let guard = ReleaseGuard { closure: self, cmd };
        let closure = &*guard.closure;
        let owned = closure.owns_buffer(cmd);

        closure.device.end_command_buffer(cmd)?;

        let buffers = [cmd];
        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&buffers)
            .wait_semaphores(sync.wait_semaphores)
            .wait_dst_stage_mask(sync.wait_stages)
            .signal_semaphores(sync.signal_semaphores);

        closure
            .device
            .queue_submit(closure.queue, &submit_info, sync.fence)?;

        // An internal pool is released below, so its buffer must complete first
        let waited = if sync.wait_idle || (owned && sync.fence.is_null()) {
            closure.device.queue_wait_idle(closure.queue)
        } else if owned {
            closure.device.wait_for_fence(sync.fence)
        } else {
            Ok(())
        };
        if let Err(e) = waited {
            tracing::error!("Waiting for one-shot submission failed: {}", e);
        }

        Ok(())
    }

    /// Record `record` into a one-shot buffer on an internal pool and submit it.
    ///
    /// # Safety
    /// Commands recorded by `record` must be valid for this queue.
    pub unsafe fn execute<F>(&mut self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let cmd = self.begin_one_submit_commands(None)?;
        record(cmd);
        self.finish_one_submit_commands(cmd)
    }

    /// Release the internal pool if `cmd` was begun on it.
    unsafe fn release_buffer(&mut self, cmd: vk::CommandBuffer) {
        if self.owns_buffer(cmd) {
            self.release_internal_pool();
        }
    }

    unsafe fn release_internal_pool(&mut self) {
        if let Some(internal) = self.internal.take() {
            if let Some(buffer) = internal.buffer {
                self.device.free_command_buffer(internal.pool, buffer);
            }
            self.device.destroy_command_pool(internal.pool);
        }
    }
}

impl<D: CommandDevice> Drop for QueueClosure<'_, D> {
    fn drop(&mut self) {
        // SAFETY: `new` requires the device to outlive the closure, and an
        // unfinished buffer was never submitted.
        unsafe { self.release_internal_pool() };
    }
}

/// Releases the internal pool when a finish call returns, on every path.
struct ReleaseGuard<'c, 'd, D: CommandDevice> {
    closure: &'c mut QueueClosure<'d, D>,
    cmd: vk::CommandBuffer,
}

impl<D: CommandDevice> Drop for ReleaseGuard<'_, '_, D> {
    fn drop(&mut self) {
        // SAFETY: an internal buffer was waited on after submission, or was
        // never submitted.
        unsafe { self.closure.release_buffer(self.cmd) };
    }
}
