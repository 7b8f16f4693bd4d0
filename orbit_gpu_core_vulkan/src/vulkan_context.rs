//! Headless Vulkan bring-up
//!
//! Owns the instance, the optional validation messenger, the logical device,
//! its queues and the memory allocator. No surface is created: presentation
//! belongs to the swapchain layer above the core.

use crate::vulkan_config::VulkanConfig;
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use orbit_gpu_core::orbit::{Error, Result};
use orbit_gpu_core::{engine_error, engine_info, engine_warn};
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::Mutex;

const SOURCE: &str = "orbit::vulkan";

type Messenger = (ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT);

/// Queue family chosen for a queue type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueFamilies {
    pub graphics: u32,
    /// Transfer-capable family without graphics, if the device has one
    pub transfer: Option<u32>,
}

/// Choose the graphics family and a dedicated transfer family
///
/// A transfer-only family is preferred over a compute+transfer one.
pub(crate) fn select_queue_families(families: &[vk::QueueFlags]) -> Option<QueueFamilies> {
    let graphics = families
        .iter()
        .position(|flags| flags.contains(vk::QueueFlags::GRAPHICS))? as u32;

    let dedicated = |flags: &vk::QueueFlags| {
        flags.contains(vk::QueueFlags::TRANSFER) && !flags.contains(vk::QueueFlags::GRAPHICS)
    };
    let transfer = families
        .iter()
        .position(|flags| dedicated(flags) && !flags.contains(vk::QueueFlags::COMPUTE))
        .or_else(|| families.iter().position(dedicated))
        .map(|index| index as u32);

    Some(QueueFamilies { graphics, transfer })
}

/// Native Vulkan objects shared by `VulkanGpuDevice`
pub(crate) struct VulkanContext {
    _entry: ash::Entry,
    pub instance: ash::Instance,
    messenger: Option<Messenger>,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub families: QueueFamilies,
    pub graphics_queue: Mutex<vk::Queue>,
    pub transfer_queue: Option<Mutex<vk::Queue>>,
    /// Dropped before the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,
}

impl VulkanContext {
    pub fn new(config: &VulkanConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!(SOURCE, "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let validation = cfg!(feature = "vulkan-validation") && config.enable_validation;
            if config.enable_validation && !validation {
                engine_warn!(
                    SOURCE,
                    "Validation requested but the crate was built without the vulkan-validation feature"
                );
            }

            let instance = Self::create_instance(&entry, config, validation)?;

            let messenger = if validation {
                match Self::create_messenger(&entry, &instance, config) {
                    Ok(messenger) => messenger,
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            match Self::create_device(&instance) {
                Ok((physical_device, device, families)) => {
                    let allocator = Allocator::new(&AllocatorCreateDesc {
                        instance: instance.clone(),
                        device: device.clone(),
                        physical_device,
                        debug_settings: Default::default(),
                        buffer_device_address: false,
                        allocation_sizes: Default::default(),
                    });

                    let allocator = match allocator {
                        Ok(allocator) => allocator,
                        Err(e) => {
                            engine_error!(SOURCE, "Failed to create GPU allocator: {:?}", e);
                            device.destroy_device(None);
                            Self::destroy_messenger(messenger);
                            instance.destroy_instance(None);
                            return Err(Error::InitializationFailed(format!(
                                "Failed to create allocator: {:?}",
                                e
                            )));
                        }
                    };

                    let graphics_queue = device.get_device_queue(families.graphics, 0);
                    let transfer_queue = families
                        .transfer
                        .map(|family| Mutex::new(device.get_device_queue(family, 0)));

                    Ok(Self {
                        _entry: entry,
                        instance,
                        messenger,
                        physical_device,
                        device,
                        families,
                        graphics_queue: Mutex::new(graphics_queue),
                        transfer_queue,
                        allocator: ManuallyDrop::new(Mutex::new(allocator)),
                    })
                }
                Err(e) => {
                    Self::destroy_messenger(messenger);
                    instance.destroy_instance(None);
                    Err(e)
                }
            }
        }
    }

    unsafe fn create_instance(
        entry: &ash::Entry,
        config: &VulkanConfig,
        validation: bool,
    ) -> Result<ash::Instance> {
        let app_name = CString::new(config.app_name.clone()).unwrap_or_default();
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Orbit")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extension_names = Vec::new();
        let mut layer_names = Vec::new();
        if validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        entry.create_instance(&create_info, None).map_err(|e| {
            engine_error!(SOURCE, "Failed to create Vulkan instance: {:?}", e);
            Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
        })
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &VulkanConfig,
    ) -> Result<Option<Messenger>> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        crate::debug::init_debug_config(crate::debug::Config {
            severity: config.debug_severity,
            output: config.debug_output.clone(),
            message_filter: config.debug_message_filter,
            break_on_error: config.break_on_validation_error,
            panic_on_error: config.panic_on_error,
            enable_stats: config.enable_validation_stats,
        });

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(crate::debug::severity_flags(config.debug_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        let messenger = debug_utils
            .create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| {
                crate::debug::cleanup_debug_config();
                engine_error!(SOURCE, "Failed to create debug messenger: {:?}", e);
                Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
            })?;

        Ok(Some((debug_utils, messenger)))
    }

    #[cfg(not(feature = "vulkan-validation"))]
    unsafe fn create_messenger(
        _entry: &ash::Entry,
        _instance: &ash::Instance,
        _config: &VulkanConfig,
    ) -> Result<Option<Messenger>> {
        Ok(None)
    }

    unsafe fn destroy_messenger(messenger: Option<Messenger>) {
        #[cfg(feature = "vulkan-validation")]
        crate::debug::cleanup_debug_config();

        if let Some((debug_utils, messenger)) = messenger {
            debug_utils.destroy_debug_utils_messenger(messenger, None);
        }
    }

    /// Features the descriptor cache and secondary recording rely on
    unsafe fn supports_required_features(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> bool {
        let properties = instance.get_physical_device_properties(physical_device);
        if properties.api_version < vk::API_VERSION_1_3 {
            return false;
        }

        let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
        {
            let mut features2 = vk::PhysicalDeviceFeatures2::default()
                .push_next(&mut features12)
                .push_next(&mut features13);
            instance.get_physical_device_features2(physical_device, &mut features2);
        }

        features12.descriptor_binding_partially_bound == vk::TRUE
            && features12.descriptor_binding_sampled_image_update_after_bind == vk::TRUE
            && features12.runtime_descriptor_array == vk::TRUE
            && features12.separate_depth_stencil_layouts == vk::TRUE
            && features13.dynamic_rendering == vk::TRUE
    }

    unsafe fn pick_physical_device(instance: &ash::Instance) -> Result<vk::PhysicalDevice> {
        let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
            engine_error!(SOURCE, "Failed to enumerate physical devices: {:?}", e);
            Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
        })?;

        let candidates: Vec<vk::PhysicalDevice> = physical_devices
            .into_iter()
            .filter(|&pd| Self::supports_required_features(instance, pd))
            .collect();

        let discrete = candidates.iter().copied().find(|&pd| {
            instance.get_physical_device_properties(pd).device_type
                == vk::PhysicalDeviceType::DISCRETE_GPU
        });

        discrete.or_else(|| candidates.first().copied()).ok_or_else(|| {
            engine_error!(SOURCE, "No Vulkan 1.3 GPU with descriptor indexing found");
            Error::InitializationFailed(
                "No Vulkan 1.3 GPU with descriptor indexing found".to_string(),
            )
        })
    }

    unsafe fn create_device(
        instance: &ash::Instance,
    ) -> Result<(vk::PhysicalDevice, ash::Device, QueueFamilies)> {
        let physical_device = Self::pick_physical_device(instance)?;

        let properties = instance.get_physical_device_properties(physical_device);
        let device_name = CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy();

        let family_flags: Vec<vk::QueueFlags> = instance
            .get_physical_device_queue_family_properties(physical_device)
            .iter()
            .map(|family| family.queue_flags)
            .collect();

        let families = select_queue_families(&family_flags).ok_or_else(|| {
            engine_error!(SOURCE, "No graphics queue family found");
            Error::InitializationFailed("No graphics queue family found".to_string())
        })?;

        let queue_priorities = [1.0];
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
            .queue_family_index(families.graphics)
            .queue_priorities(&queue_priorities)];
        if let Some(transfer) = families.transfer {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(transfer)
                    .queue_priorities(&queue_priorities),
            );
        }

        let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
            .descriptor_binding_partially_bound(true)
            .descriptor_binding_sampled_image_update_after_bind(true)
            .runtime_descriptor_array(true)
            .separate_depth_stencil_layouts(true);
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .push_next(&mut features12)
            .push_next(&mut features13);

        let device = instance
            .create_device(physical_device, &device_create_info, None)
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to create logical device: {:?}", e);
                Error::InitializationFailed(format!("Failed to create device: {:?}", e))
            })?;

        engine_info!(
            SOURCE,
            "Using '{}' (graphics family {}, transfer family {:?})",
            device_name,
            families.graphics,
            families.transfer
        );

        Ok((physical_device, device, families))
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Allocator frees its device memory blocks while the device is alive
            ManuallyDrop::drop(&mut self.allocator);

            Self::destroy_messenger(self.messenger.take());

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_context_tests.rs"]
mod tests;
