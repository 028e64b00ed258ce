//! Data-parallel strategy on the GPU
//!
//! One compute invocation per particle. The force pass and the integration
//! pass are recorded as two separate compute passes in one encoder; wgpu
//! does not start a pass until every storage write of the previous pass is
//! visible, which is the barrier between the phases.
//!
//! The caller's slice is written only after the updated particles have been
//! read back successfully, so a failed dispatch leaves it untouched.

use std::sync::mpsc;

use bytemuck::Zeroable;
use nbody_physics::{ForceParams, Particle};
use wgpu::util::DeviceExt;

use crate::config::Backend;
use crate::error::SimulationError;
use crate::params::StepParams;
use crate::strategy::ExecutionStrategy;

/// Invocations per workgroup (must match `@workgroup_size` in both shaders)
pub const WORKGROUP_SIZE: u32 = 256;

const PARTICLE_SIZE: u64 = std::mem::size_of::<Particle>() as u64;
/// One WGSL `vec4<f32>` per particle, `w` unused
const ACCELERATION_SIZE: u64 = 4 * std::mem::size_of::<f32>() as u64;

/// Storage sized for `capacity` particles, rebuilt when a call needs more
struct DeviceBuffers {
    capacity: usize,
    particle_buffer: wgpu::Buffer,
    _acceleration_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
    force_bind_group: wgpu::BindGroup,
    integrate_bind_group: wgpu::BindGroup,
}

/// GPU compute strategy
pub struct ParallelStrategy {
    device: wgpu::Device,
    queue: wgpu::Queue,
    name: String,

    params_buffer: wgpu::Buffer,

    force_bind_group_layout: wgpu::BindGroupLayout,
    integrate_bind_group_layout: wgpu::BindGroupLayout,

    force_pipeline: wgpu::ComputePipeline,
    integrate_pipeline: wgpu::ComputePipeline,

    buffers: Option<DeviceBuffers>,
}

impl ParallelStrategy {
    /// Acquire an adapter and device and build the pipelines.
    pub async fn new_async() -> Result<Self, SimulationError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| SimulationError::Unavailable(format!("no GPU adapter: {e}")))?;

        let adapter_name = adapter.get_info().name;
        log::info!("Using GPU: {}", adapter_name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("N-body Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| SimulationError::Unavailable(format!("failed to create device: {e}")))?;

        let mut strategy = Self::from_device(device, queue);
        strategy.name = format!("parallel (gpu: {adapter_name})");
        Ok(strategy)
    }

    /// Blocking wrapper around [`new_async`](Self::new_async)
    pub fn new() -> Result<Self, SimulationError> {
        pollster::block_on(Self::new_async())
    }

    /// Build pipelines on a device the host already owns.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        log::info!("Initializing ParallelStrategy...");

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Step Params Buffer"),
            contents: bytemuck::bytes_of(&StepParams::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let force_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Force Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/forces.wgsl").into()),
        });

        let integrate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Integration Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/integrate.wgsl").into()),
        });

        log::debug!("Shaders loaded");

        // Force pass reads particles, writes accelerations
        let force_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Force Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        // Integration pass reads accelerations, writes particles
        let integrate_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Integration Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let force_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Force Pipeline Layout"),
                bind_group_layouts: &[&force_bind_group_layout],
                push_constant_ranges: &[],
            });

        let force_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Force Pipeline"),
            layout: Some(&force_pipeline_layout),
            module: &force_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let integrate_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Integration Pipeline Layout"),
                bind_group_layouts: &[&integrate_bind_group_layout],
                push_constant_ranges: &[],
            });

        let integrate_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Integration Pipeline"),
            layout: Some(&integrate_pipeline_layout),
            module: &integrate_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        log::info!("Pipelines created");

        Self {
            device,
            queue,
            name: String::from("parallel (gpu)"),
            params_buffer,
            force_bind_group_layout,
            integrate_bind_group_layout,
            force_pipeline,
            integrate_pipeline,
            buffers: None,
        }
    }

    /// Particle capacity of the current device buffers
    pub fn capacity(&self) -> usize {
        self.buffers.as_ref().map_or(0, |b| b.capacity)
    }

    /// Reject counts the device cannot hold or dispatch.
    fn check_limits(&self, count: usize) -> Result<(), SimulationError> {
        let limits = self.device.limits();
        let particle_bytes = count as u64 * PARTICLE_SIZE;
        let acceleration_bytes = count as u64 * ACCELERATION_SIZE;
        let max_binding = u64::from(limits.max_storage_buffer_binding_size);

        if particle_bytes > max_binding.min(limits.max_buffer_size)
            || acceleration_bytes > max_binding.min(limits.max_buffer_size)
        {
            return Err(SimulationError::Execution(format!(
                "{count} particles exceed the device storage buffer limit of {max_binding} bytes"
            )));
        }

        let workgroups = workgroup_count(count);
        if workgroups > limits.max_compute_workgroups_per_dimension {
            return Err(SimulationError::Execution(format!(
                "{count} particles need {workgroups} workgroups, device allows {}",
                limits.max_compute_workgroups_per_dimension
            )));
        }

        Ok(())
    }

    /// Grow the device buffers to hold `count` particles. On failure the
    /// previous buffers stay in place.
    fn ensure_capacity(&mut self, count: usize) -> Result<(), SimulationError> {
        if self.capacity() >= count {
            return Ok(());
        }
        self.check_limits(count)?;

        log::debug!(
            "Growing device buffers: {} -> {} particles",
            self.capacity(),
            count
        );

        let buffers = with_error_scopes(&self.device, "allocating device buffers", || {
            self.create_buffers(count)
        })?;
        self.buffers = Some(buffers);
        Ok(())
    }

    fn create_buffers(&self, count: usize) -> DeviceBuffers {
        let particle_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Buffer"),
            size: count as u64 * PARTICLE_SIZE,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        // Fully overwritten by the force pass before integration reads it
        let acceleration_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Acceleration Buffer"),
            size: count as u64 * ACCELERATION_SIZE,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Readback Buffer"),
            size: count as u64 * PARTICLE_SIZE,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let force_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Force Bind Group"),
            layout: &self.force_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: particle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: acceleration_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.params_buffer.as_entire_binding(),
                },
            ],
        });

        let integrate_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Integration Bind Group"),
            layout: &self.integrate_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: particle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: acceleration_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.params_buffer.as_entire_binding(),
                },
            ],
        });

        DeviceBuffers {
            capacity: count,
            particle_buffer,
            _acceleration_buffer: acceleration_buffer,
            staging_buffer,
            force_bind_group,
            integrate_bind_group,
        }
    }
}

/// Workgroups needed to cover `count` particles
fn workgroup_count(count: usize) -> u32 {
    (count as u64).div_ceil(WORKGROUP_SIZE as u64).min(u32::MAX as u64) as u32
}

/// Run `f` with out-of-memory and validation errors captured instead of
/// reaching the device's uncaptured-error handler, which panics.
fn with_error_scopes<T>(
    device: &wgpu::Device,
    what: &str,
    f: impl FnOnce() -> T,
) -> Result<T, SimulationError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());

    match validation.or(out_of_memory) {
        Some(e) => Err(SimulationError::Execution(format!("{what}: {e}"))),
        None => Ok(value),
    }
}

impl ExecutionStrategy for ParallelStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> Backend {
        Backend::Parallel
    }

    fn step(
        &mut self,
        particles: &mut [Particle],
        forces: &ForceParams,
        dt: f32,
    ) -> Result<(), SimulationError> {
        let count = particles.len();
        if count == 0 {
            return Ok(());
        }
        let count_u32 = u32::try_from(count).map_err(|_| {
            SimulationError::Execution(format!("{count} particles exceed u32 indexing"))
        })?;

        self.ensure_capacity(count)?;
        let buffers = self
            .buffers
            .as_ref()
            .ok_or_else(|| SimulationError::Execution("device buffers missing".into()))?;

        let byte_len = count as u64 * PARTICLE_SIZE;
        let workgroups = workgroup_count(count);

        with_error_scopes(&self.device, "dispatching the step", || {
            self.queue
                .write_buffer(&buffers.particle_buffer, 0, bytemuck::cast_slice(particles));
            self.queue.write_buffer(
                &self.params_buffer,
                0,
                bytemuck::bytes_of(&StepParams::new(count_u32, forces, dt)),
            );

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("N-body Step Encoder"),
                });

            // Step 1: Compute accelerations from the uploaded snapshot
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Force Compute Pass"),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&self.force_pipeline);
                compute_pass.set_bind_group(0, &buffers.force_bind_group, &[]);
                compute_pass.dispatch_workgroups(workgroups, 1, 1);
            }

            // Step 2: Integrate motion (separate pass, so all of step 1 is visible)
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Integration Compute Pass"),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&self.integrate_pipeline);
                compute_pass.set_bind_group(0, &buffers.integrate_bind_group, &[]);
                compute_pass.dispatch_workgroups(workgroups, 1, 1);
            }

            encoder.copy_buffer_to_buffer(
                &buffers.particle_buffer,
                0,
                &buffers.staging_buffer,
                0,
                byte_len,
            );
            self.queue.submit(std::iter::once(encoder.finish()));
        })?;

        let slice = buffers.staging_buffer.slice(..byte_len);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        let mapped = self
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| SimulationError::Execution(format!("device poll failed: {e}")))
            .and_then(|_| {
                receiver.recv().map_err(|e| {
                    SimulationError::Execution(format!("readback callback dropped: {e}"))
                })
            })
            .and_then(|result| {
                result.map_err(|e| {
                    SimulationError::Execution(format!("readback map failed: {e}"))
                })
            });
        if let Err(e) = mapped {
            // A pending map would block the next copy into the staging buffer
            buffers.staging_buffer.unmap();
            return Err(e);
        }

        let copied = {
            let data = slice.get_mapped_range();
            match bytemuck::try_cast_slice::<u8, Particle>(&data) {
                Ok(updated) if updated.len() == count => {
                    particles.copy_from_slice(updated);
                    Ok(())
                }
                Ok(updated) => Err(SimulationError::Execution(format!(
                    "read back {} particles, expected {count}",
                    updated.len()
                ))),
                Err(e) => Err(SimulationError::Execution(format!("readback layout: {e}"))),
            }
        };
        buffers.staging_buffer.unmap();

        log::trace!("Stepped {} particles on the GPU ({} workgroups)", count, workgroups);
        copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    /// Try to create a ParallelStrategy. Skip the test if no GPU is available.
    fn try_gpu() -> Option<ParallelStrategy> {
        match ParallelStrategy::new() {
            Ok(gpu) => Some(gpu),
            Err(e) => {
                println!("Skipping: {e}");
                None
            }
        }
    }

    #[test]
    fn test_workgroup_count() {
        assert_eq!(workgroup_count(1), 1);
        assert_eq!(workgroup_count(256), 1);
        assert_eq!(workgroup_count(257), 2);
    }

    #[test]
    fn test_acceleration_slot_matches_vec4() {
        assert_eq!(ACCELERATION_SIZE, 16);
        assert_eq!(PARTICLE_SIZE, 28);
    }

    #[test]
    fn test_gpu_two_body() {
        let Some(mut gpu) = try_gpu() else { return };
        assert_eq!(gpu.kind(), Backend::Parallel);

        let mut particles = [
            Particle::at_rest(Vec3::new(-1.0, 0.0, 0.0), 1.0),
            Particle::at_rest(Vec3::new(1.0, 0.0, 0.0), 1.0),
        ];
        gpu.step(&mut particles, &ForceParams::new(1.0, 0.0), 0.01)
            .unwrap();

        assert!((particles[0].vel[0] - 0.0025).abs() < 1e-7);
        assert!((particles[1].vel[0] + 0.0025).abs() < 1e-7);
        assert!((particles[0].pos[0] + 0.999975).abs() < 1e-6);
        assert!((particles[1].pos[0] - 0.999975).abs() < 1e-6);
        assert_eq!(particles[0].weight, 1.0);
    }

    #[test]
    fn test_device_errors_are_returned_not_raised() {
        let Some(gpu) = try_gpu() else { return };

        // MAP_READ may only be combined with COPY_DST
        let result = with_error_scopes(&gpu.device, "creating an invalid buffer", || {
            gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Invalid Buffer"),
                size: 16,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        });
        assert!(matches!(result, Err(SimulationError::Execution(_))));

        let clean = with_error_scopes(&gpu.device, "creating a valid buffer", || {
            gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Valid Buffer"),
                size: 16,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        });
        assert!(clean.is_ok());
    }

    #[test]
    fn test_gpu_buffers_grow_across_calls() {
        let Some(mut gpu) = try_gpu() else { return };
        let forces = ForceParams::default();

        let mut small = vec![Particle::at_rest(Vec3::ZERO, 1.0); 3];
        small[1].set_position(Vec3::X);
        small[2].set_position(Vec3::Y);
        gpu.step(&mut small, &forces, 0.001).unwrap();
        assert_eq!(gpu.capacity(), 3);

        // Spans more than one workgroup and tile
        let mut large: Vec<Particle> = (0..600)
            .map(|i| Particle::at_rest(Vec3::new(i as f32 * 0.1, (i % 7) as f32, 0.0), 1.0))
            .collect();
        gpu.step(&mut large, &forces, 0.001).unwrap();
        assert_eq!(gpu.capacity(), 600);

        // Shrinking reuses the larger buffers
        gpu.step(&mut small, &forces, 0.001).unwrap();
        assert_eq!(gpu.capacity(), 600);
    }
}
