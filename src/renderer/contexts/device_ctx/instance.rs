use std::ffi::{c_char, c_void, CStr};
use ash::vk;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use crate::renderer::contexts::device_ctx::device::AshDevice;
use crate::renderer::contexts::device_ctx::queue::{Queue, QueueFamily};

/// Initializes Vulkan without a surface and keeps the instance alive
pub struct RenderInstance {
    // Keeps the loader alive for the lifetime of the instance
    _entry: ash::Entry,
    pub instance: ash::Instance,
    debug_utils: Option<(vk::DebugUtilsMessengerEXT, ash::ext::debug_utils::Instance)>,
}

impl RenderInstance {
    const ENABLE_VALIDATION_LAYERS: bool = cfg!(debug_assertions);
    const REQUIRED_VALIDATION_LAYERS: &'static [&'static CStr] = &[
        c"VK_LAYER_KHRONOS_validation",
    ];

    pub fn new() -> Result<Self> {
        let entry = ash::Entry::linked();

        // Validation is best effort: fall back to a plain instance without the layer
        let validation = Self::ENABLE_VALIDATION_LAYERS
            && match Self::check_validation_layers_supported(&entry) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Running without validation: {}", e);
                    false
                }
            };

        let instance = Self::create_instance(&entry, validation)?;
        let debug_utils = if validation {
            Some(Self::create_debug_utils_messenger(&entry, &instance)?)
        } else {
            None
        };

        Ok(Self {
            _entry: entry,
            instance,
            debug_utils,
        })
    }

    pub fn validation_enabled(&self) -> bool {
        self.debug_utils.is_some()
    }

    /// Pick a physical device with a graphics queue and open it.
    pub fn create_device(&self) -> Result<(AshDevice, Queue)> {
        let (physical_device, graphics_family) = self.select_physical_device()?;

        let queue_priorities = [1.0];
        let queue_create_infos = [
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_family.index)
                .queue_priorities(&queue_priorities),
        ];
        let enabled_extension_names = Self::get_required_device_extensions()
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<*const c_char>>();
        let mut vulkan13_features = vk::PhysicalDeviceVulkan13Features::default()
            .synchronization2(true);
        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&enabled_extension_names)
            .push_next(&mut vulkan13_features);

        let logical = unsafe {
            self.instance.create_device(physical_device, &device_create_info, None)?
        };
        let queue = unsafe {
            logical.get_device_queue(graphics_family.index, 0)
        };
        let queue_family_index = graphics_family.index;

        let device = AshDevice::new(
            &self.instance,
            physical_device,
            logical,
            queue_family_index,
            self.validation_enabled(),
        )?;

        Ok((device, Queue::new(graphics_family, queue)))
    }

    fn select_physical_device(&self) -> Result<(vk::PhysicalDevice, QueueFamily)> {
        let instance = &self.instance;
        unsafe {
            instance
                .enumerate_physical_devices()?
                .into_iter()
                .filter(|device| {
                    let props = instance.get_physical_device_properties(*device);
                    let supported = props.api_version >= vk::API_VERSION_1_3;
                    if !supported {
                        log::debug!("Skipping device without Vulkan 1.3: {:?}", props.device_name_as_c_str());
                    }
                    supported
                })
                .filter_map(|device| {
                    instance
                        .get_physical_device_queue_family_properties(device)
                        .into_iter()
                        .enumerate()
                        .find(|(_, q)| q.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                        .map(|(i, props)| (device, QueueFamily::new(i as u32, props)))
                })
                .min_by_key(|(device, _)| {
                    let props = instance.get_physical_device_properties(*device);
                    match props.device_type {
                        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
                        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
                        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
                        vk::PhysicalDeviceType::CPU => 3,
                        _ => 4,
                    }
                })
                .ok_or_eyre("No suitable physical device found")
        }
    }

    fn create_instance(entry: &ash::Entry, validation: bool) -> Result<ash::Instance> {
        let application_info = vk::ApplicationInfo::default()
            .application_name(c"framebatch")
            .api_version(vk::API_VERSION_1_3);
        let enabled_layer_names = if validation {
            Self::REQUIRED_VALIDATION_LAYERS
                .iter()
                .map(|layer| layer.as_ptr())
                .collect::<Vec<*const c_char>>()
        } else {
            Vec::new()
        };
        let enabled_extension_names = Self::get_required_instance_extensions(validation)
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<*const c_char>>();
        let mut debug_info = debug_utils_messenger_create_info();
        let mut instance_info = vk::InstanceCreateInfo::default()
            .application_info(&application_info)
            .enabled_layer_names(&enabled_layer_names)
            .enabled_extension_names(&enabled_extension_names);
        if validation {
            instance_info = instance_info.push_next(&mut debug_info);
        }

        #[cfg(target_os = "macos")]
        let instance_info = instance_info
            .flags(vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR);

        Ok(unsafe {
            entry.create_instance(&instance_info, None)?
        })
    }

    fn create_debug_utils_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<(vk::DebugUtilsMessengerEXT, ash::ext::debug_utils::Instance)> {
        let debug_utils_loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let debug_utils_info = debug_utils_messenger_create_info();
        let debug_utils_messenger = unsafe {
            debug_utils_loader.create_debug_utils_messenger(&debug_utils_info, None)?
        };
        Ok((debug_utils_messenger, debug_utils_loader))
    }

    fn get_required_instance_extensions(validation: bool) -> Vec<&'static CStr> {
        let mut exts = Vec::new();
        if validation {
            exts.push(ash::ext::debug_utils::NAME);
        }

        #[cfg(target_os = "macos")]
        {
            exts.push(ash::khr::portability_enumeration::NAME);
            exts.push(ash::khr::get_physical_device_properties2::NAME);
        }

        exts
    }

    fn get_required_device_extensions() -> Vec<&'static CStr> {
        vec![
            #[cfg(target_os = "macos")]
            ash::khr::portability_subset::NAME,
        ]
    }

    fn check_validation_layers_supported(entry: &ash::Entry) -> Result<()> {
        let supported_layers = unsafe {
            entry.enumerate_instance_layer_properties()?
        };
        for layer in Self::REQUIRED_VALIDATION_LAYERS {
            let found = supported_layers
                .iter()
                .any(|props| props.layer_name_as_c_str().is_ok_and(|name| name == *layer));
            if !found {
                return Err(eyre!("Validation layer {:?} not supported", layer));
            }
        }
        Ok(())
    }
}

impl Drop for RenderInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((messenger, loader)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn debug_utils_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    let message_severity = vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    let message_type = vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE;
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(message_severity)
        .message_type(message_type)
        .pfn_user_callback(Some(debug_callback))
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let msg_type = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "[General]",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "[Performance]",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "[Validation]",
        _ => "[Unknown]",
    };
    let msg = unsafe {
        if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
            return vk::FALSE;
        }
        CStr::from_ptr((*p_callback_data).p_message)
    };
    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => log::trace!("{} {:?}", msg_type, msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::info!("{} {:?}", msg_type, msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{} {:?}", msg_type, msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{} {:?}", msg_type, msg),
        _ => log::warn!("[Unknown severity]{} {:?}", msg_type, msg),
    }

    vk::FALSE
}
