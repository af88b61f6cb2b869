use super::GpuError;
use crate::backend::SolverBackend;
use crate::volume::VolumeModel;

const STRESS_SHADER: &str = include_str!("shaders/stress_update.wgsl");
const VELOCITY_SHADER: &str = include_str!("shaders/velocity_update.wgsl");

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct StressParams {
    width: u32,
    height: u32,
    depth: u32,
    material_id: u32,
    use_elastic: u32,
    use_plastic: u32,
    use_brittle: u32,
    _pad0: u32,
    dx: f32,
    dt: f32,
    lambda0: f32,
    mu0: f32,
    confining_pressure: f32,
    tensile_strength: f32,
    cohesion: f32,
    sin_phi: f32,
    cos_phi: f32,
    _pad1: f32,
    _pad2: f32,
    _pad3: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct VelocityParams {
    width: u32,
    height: u32,
    depth: u32,
    material_id: u32,
    dx: f32,
    dt: f32,
    damping_alpha: f32,
    _pad0: f32,
}

/// GPU-based dual-pass elastodynamic propagator using wgpu compute shaders.
///
/// Every dynamic field is carried on the GPU as `f32` (wgpu has no portable
/// double-precision storage-buffer support); values are widened to `f64`
/// only at readback into [`VolumeModel`]. This mirrors ordinary GPU FDTD
/// practice and is noted as a deliberate precision trade-off in DESIGN.md.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,

    width: u32,
    height: u32,
    depth: u32,
    n: usize,

    stress_pipeline: wgpu::ComputePipeline,
    velocity_pipeline: wgpu::ComputePipeline,
    stress_bind_group_layout: wgpu::BindGroupLayout,
    velocity_bind_group_layout: wgpu::BindGroupLayout,

    material_buf: wgpu::Buffer,
    density_buf: wgpu::Buffer,
    vx_buf: wgpu::Buffer,
    vy_buf: wgpu::Buffer,
    vz_buf: wgpu::Buffer,
    sxx_buf: wgpu::Buffer,
    syy_buf: wgpu::Buffer,
    szz_buf: wgpu::Buffer,
    sxy_buf: wgpu::Buffer,
    sxz_buf: wgpu::Buffer,
    syz_buf: wgpu::Buffer,
    damage_buf: wgpu::Buffer,

    staging_buf: wgpu::Buffer,
}

impl GpuBackend {
    /// Create a new GPU backend sized for `model`'s grid and upload its
    /// current field state.
    pub async fn new(model: &VolumeModel) -> Result<Self, GpuError> {
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
            .map_err(|_| GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("ctwave-core GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let stress_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Stress Update Shader"),
            source: wgpu::ShaderSource::Wgsl(STRESS_SHADER.into()),
        });
        let velocity_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Velocity Update Shader"),
            source: wgpu::ShaderSource::Wgsl(VELOCITY_SHADER.into()),
        });

        let stress_bind_group_layout = stress_bind_group_layout(&device);
        let velocity_bind_group_layout = velocity_bind_group_layout(&device);

        let stress_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Stress Pipeline Layout"),
                bind_group_layouts: &[&stress_bind_group_layout],
                ..Default::default()
            });
        let velocity_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Velocity Pipeline Layout"),
                bind_group_layouts: &[&velocity_bind_group_layout],
                ..Default::default()
            });

        let stress_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Stress Update Pipeline"),
            layout: Some(&stress_pipeline_layout),
            module: &stress_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        let velocity_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Velocity Update Pipeline"),
            layout: Some(&velocity_pipeline_layout),
            module: &velocity_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let n = model.grid.n;
        let scalar_size = (n * std::mem::size_of::<f32>()) as u64;

        let material_u32: Vec<u32> = model.material.iter().map(|&m| m as u32).collect();
        let material_buf = create_storage_buffer(&device, "material", bytemuck::cast_slice(&material_u32));
        let density_buf = create_storage_buffer(&device, "density", bytemuck::cast_slice(&model.density));

        let vx_buf = create_f32_field_buffer(&device, &queue, "vx", &model.vx);
        let vy_buf = create_f32_field_buffer(&device, &queue, "vy", &model.vy);
        let vz_buf = create_f32_field_buffer(&device, &queue, "vz", &model.vz);
        let sxx_buf = create_f32_field_buffer(&device, &queue, "sxx", &model.sxx);
        let syy_buf = create_f32_field_buffer(&device, &queue, "syy", &model.syy);
        let szz_buf = create_f32_field_buffer(&device, &queue, "szz", &model.szz);
        let sxy_buf = create_f32_field_buffer(&device, &queue, "sxy", &model.sxy);
        let sxz_buf = create_f32_field_buffer(&device, &queue, "sxz", &model.sxz);
        let syz_buf = create_f32_field_buffer(&device, &queue, "syz", &model.syz);
        let damage_buf = create_f32_field_buffer(&device, &queue, "damage", &model.damage);

        let staging_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("GPU Readback Staging Buffer"),
            size: scalar_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            width: model.grid.width as u32,
            height: model.grid.height as u32,
            depth: model.grid.depth as u32,
            n,
            stress_pipeline,
            velocity_pipeline,
            stress_bind_group_layout,
            velocity_bind_group_layout,
            material_buf,
            density_buf,
            vx_buf,
            vy_buf,
            vz_buf,
            sxx_buf,
            syy_buf,
            szz_buf,
            sxy_buf,
            sxz_buf,
            syz_buf,
            damage_buf,
            staging_buf,
        })
    }

    fn workgroups(&self) -> (u32, u32, u32) {
        (
            (self.width + 3) / 4,
            (self.height + 3) / 4,
            (self.depth + 3) / 4,
        )
    }

    fn dispatch_stress(&self, model: &VolumeModel, dt: f64) {
        let flags = model.config.flags;
        let p = model.physics;
        let params = StressParams {
            width: self.width,
            height: self.height,
            depth: self.depth,
            material_id: model.config.material_id as u32,
            use_elastic: flags.use_elastic as u32,
            use_plastic: flags.use_plastic as u32,
            use_brittle: flags.use_brittle as u32,
            _pad0: 0,
            dx: model.grid.dx,
            dt: dt as f32,
            lambda0: p.lambda0 as f32,
            mu0: p.mu0 as f32,
            confining_pressure: p.confining_pressure as f32,
            tensile_strength: p.tensile_strength as f32,
            cohesion: p.cohesion as f32,
            sin_phi: p.sin_phi as f32,
            cos_phi: p.cos_phi as f32,
            _pad1: 0.0,
            _pad2: 0.0,
            _pad3: 0.0,
        };
        let params_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Stress Params"),
            size: std::mem::size_of::<StressParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&params_buf, 0, bytemuck::bytes_of(&params));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Stress Bind Group"),
            layout: &self.stress_bind_group_layout,
            entries: &[
                binding(0, params_buf.as_entire_binding()),
                binding(1, self.material_buf.as_entire_binding()),
                binding(2, self.vx_buf.as_entire_binding()),
                binding(3, self.vy_buf.as_entire_binding()),
                binding(4, self.vz_buf.as_entire_binding()),
                binding(5, self.sxx_buf.as_entire_binding()),
                binding(6, self.syy_buf.as_entire_binding()),
                binding(7, self.szz_buf.as_entire_binding()),
                binding(8, self.sxy_buf.as_entire_binding()),
                binding(9, self.sxz_buf.as_entire_binding()),
                binding(10, self.syz_buf.as_entire_binding()),
                binding(11, self.damage_buf.as_entire_binding()),
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Stress Pass Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Stress Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.stress_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (wx, wy, wz) = self.workgroups();
            pass.dispatch_workgroups(wx, wy, wz);
        }
        self.queue.submit(Some(encoder.finish()));
        // Explicit synchronization before the velocity pass may read these
        // writes (spec.md §5, "Ordering guarantees").
        self.device.poll(wgpu::PollType::wait_indefinitely()).ok();
    }

    fn dispatch_velocity(&self, model: &VolumeModel, dt: f64) {
        let params = VelocityParams {
            width: self.width,
            height: self.height,
            depth: self.depth,
            material_id: model.config.material_id as u32,
            dx: model.grid.dx,
            dt: dt as f32,
            damping_alpha: crate::kernels::DAMPING_ALPHA as f32,
            _pad0: 0.0,
        };
        let params_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Velocity Params"),
            size: std::mem::size_of::<VelocityParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&params_buf, 0, bytemuck::bytes_of(&params));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Velocity Bind Group"),
            layout: &self.velocity_bind_group_layout,
            entries: &[
                binding(0, params_buf.as_entire_binding()),
                binding(1, self.material_buf.as_entire_binding()),
                binding(2, self.density_buf.as_entire_binding()),
                binding(3, self.sxx_buf.as_entire_binding()),
                binding(4, self.syy_buf.as_entire_binding()),
                binding(5, self.szz_buf.as_entire_binding()),
                binding(6, self.sxy_buf.as_entire_binding()),
                binding(7, self.sxz_buf.as_entire_binding()),
                binding(8, self.syz_buf.as_entire_binding()),
                binding(9, self.vx_buf.as_entire_binding()),
                binding(10, self.vy_buf.as_entire_binding()),
                binding(11, self.vz_buf.as_entire_binding()),
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Velocity Pass Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Velocity Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.velocity_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (wx, wy, wz) = self.workgroups();
            pass.dispatch_workgroups(wx, wy, wz);
        }
        self.queue.submit(Some(encoder.finish()));
        self.device.poll(wgpu::PollType::wait_indefinitely()).ok();
    }

    /// Read every dynamic field back from the GPU into `model`, widening
    /// `f32 -> f64`.
    fn read_back(&self, model: &mut VolumeModel) -> Result<(), GpuError> {
        self.read_field(&self.vx_buf, &mut model.vx)?;
        self.read_field(&self.vy_buf, &mut model.vy)?;
        self.read_field(&self.vz_buf, &mut model.vz)?;
        self.read_field(&self.sxx_buf, &mut model.sxx)?;
        self.read_field(&self.syy_buf, &mut model.syy)?;
        self.read_field(&self.szz_buf, &mut model.szz)?;
        self.read_field(&self.sxy_buf, &mut model.sxy)?;
        self.read_field(&self.sxz_buf, &mut model.sxz)?;
        self.read_field(&self.syz_buf, &mut model.syz)?;
        self.read_field(&self.damage_buf, &mut model.damage)?;
        Ok(())
    }

    fn read_field(&self, src: &wgpu::Buffer, dest: &mut [f64]) -> Result<(), GpuError> {
        let size = (self.n * std::mem::size_of::<f32>()) as u64;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(src, 0, &self.staging_buf, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = self.staging_buf.slice(..size);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::wait_indefinitely()).ok();
        rx.recv()
            .map_err(|_| GpuError::ReadbackChannelClosed)??;

        {
            let data = slice.get_mapped_range();
            let floats: &[f32] = bytemuck::cast_slice(&data);
            for (d, &f) in dest.iter_mut().zip(floats.iter()) {
                *d = f as f64;
            }
        }
        self.staging_buf.unmap();
        Ok(())
    }
}

impl SolverBackend for GpuBackend {
    fn step(&mut self, model: &mut VolumeModel, dt: f64) -> Result<(), GpuError> {
        self.dispatch_stress(model, dt);
        self.dispatch_velocity(model, dt);
        self.read_back(model)
    }
}

fn create_storage_buffer(device: &wgpu::Device, label: &str, data: &[u8]) -> wgpu::Buffer {
    use wgpu::util::DeviceExt;
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: data,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
    })
}

fn create_f32_field_buffer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    field: &[f64],
) -> wgpu::Buffer {
    let data: Vec<f32> = field.iter().map(|&v| v as f32).collect();
    let buf = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (data.len() * std::mem::size_of::<f32>()) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });
    queue.write_buffer(&buf, 0, bytemuck::cast_slice(&data));
    buf
}

fn binding(index: u32, resource: wgpu::BindingResource) -> wgpu::BindGroupEntry {
    wgpu::BindGroupEntry {
        binding: index,
        resource,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn stress_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Stress Bind Group Layout"),
        entries: &[
            uniform_entry(0),
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, true),
            storage_entry(4, true),
            storage_entry(5, false),
            storage_entry(6, false),
            storage_entry(7, false),
            storage_entry(8, false),
            storage_entry(9, false),
            storage_entry(10, false),
            storage_entry(11, false),
        ],
    })
}

fn velocity_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Velocity Bind Group Layout"),
        entries: &[
            uniform_entry(0),
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, true),
            storage_entry(4, true),
            storage_entry(5, true),
            storage_entry(6, true),
            storage_entry(7, true),
            storage_entry(8, true),
            storage_entry(9, false),
            storage_entry(10, false),
            storage_entry(11, false),
        ],
    })
}
