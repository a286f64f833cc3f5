//! Headless wgpu implementation of the graphics context

use std::collections::HashMap;
use std::sync::mpsc;

use anyhow::anyhow;

use super::pipelines::{self, UniformLayout, WgpuProgram};
use super::{
    BlendFunc, GraphicsContext, MAX_TEXTURE_UNITS, ProgramHandle, ProgramSource, TargetHandle, TextureFormat,
    UniformLocation,
};
use crate::color::RGBA;
use crate::error::{VfxError, VfxResult};
use crate::uniforms::{ParamDecl, UniformValue};

struct WgpuTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: TextureFormat,
}

/// Round up to WebGPU's 256-byte row alignment for buffer copies
fn align_row(bytes: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    bytes.div_ceil(align) * align
}

/// Owns the device and every program and target created through it
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    // Bound to texture units nobody assigned
    fallback_view: wgpu::TextureView,
    programs: HashMap<ProgramHandle, WgpuProgram>,
    targets: HashMap<TargetHandle, WgpuTarget>,
    next_id: u32,
    bound: Option<TargetHandle>,
    units: [Option<TargetHandle>; MAX_TEXTURE_UNITS as usize],
    blend: Option<BlendFunc>,
}

impl WgpuContext {
    /// Create a context on the first available adapter, without a surface
    pub fn new() -> VfxResult<Self> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> VfxResult<Self> {
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
            .ok_or_else(|| anyhow!("Failed to find suitable GPU adapter"))?;

        let info = adapter.get_info();
        log::info!("Using GPU: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Effect Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| anyhow!("Failed to create device: {}", e))?;

        let bind_group_layout = pipelines::create_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pass Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Pass Sampler (Linear)"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let fallback = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Fallback Texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        // Zero-initialised, so unbound units sample transparent black.
        let fallback_view = fallback.create_view(&Default::default());

        Ok(Self {
            device,
            queue,
            bind_group_layout,
            pipeline_layout,
            sampler,
            fallback_view,
            programs: HashMap::new(),
            targets: HashMap::new(),
            next_id: 1,
            bound: None,
            units: [None; MAX_TEXTURE_UNITS as usize],
            blend: None,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn target(&self, target: TargetHandle) -> VfxResult<&WgpuTarget> {
        self.targets.get(&target).ok_or(VfxError::UnknownHandle {
            kind: "target",
            id: target.0,
        })
    }
}

impl GraphicsContext for WgpuContext {
    fn compile_program(&mut self, source: &ProgramSource, params: &[ParamDecl]) -> VfxResult<ProgramHandle> {
        let layout = UniformLayout::from_decls(&source.name, params)?;
        let text = pipelines::assemble_source(source);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.name.as_str()),
            source: wgpu::ShaderSource::Wgsl(text.into()),
        });
        let mut program = WgpuProgram::new(&self.device, source, module, layout);
        // Linking against the shared layout catches binding mismatches up front.
        program.pipeline(&self.device, &self.pipeline_layout, TextureFormat::Rgba8Unorm, None);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(VfxError::ShaderCompile {
                program: source.name.clone(),
                diagnostics: err.to_string(),
            });
        }

        let handle = ProgramHandle(self.next_handle());
        log::debug!("compiled program '{}' as {:?}", source.name, handle);
        self.programs.insert(handle, program);
        Ok(handle)
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if let Some(prog) = self.programs.remove(&program) {
            prog.uniform_buffer.destroy();
        }
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.layout.location(name)
    }

    fn set_uniform(&mut self, program: ProgramHandle, location: UniformLocation, value: &UniformValue) -> VfxResult<()> {
        let prog = self.programs.get_mut(&program).ok_or(VfxError::UnknownHandle {
            kind: "program",
            id: program.0,
        })?;
        let range = prog.layout.write(&mut prog.shadow, location, value)?;
        let offset = (range.start * std::mem::size_of::<f32>()) as wgpu::BufferAddress;
        self.queue
            .write_buffer(&prog.uniform_buffer, offset, bytemuck::cast_slice(&prog.shadow[range]));
        Ok(())
    }

    fn create_target(&mut self, width: u32, height: u32, format: TextureFormat) -> VfxResult<TargetHandle> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(VfxError::allocation(format!(
                "target {}x{} outside 1..={} per side",
                width, height, max
            )));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: pipelines::wgpu_format(format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            texture.destroy();
            return Err(VfxError::allocation(err.to_string()));
        }

        let view = texture.create_view(&Default::default());
        let handle = TargetHandle(self.next_handle());
        self.targets.insert(
            handle,
            WgpuTarget {
                texture,
                view,
                width,
                height,
                format,
            },
        );
        Ok(handle)
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        if let Some(t) = self.targets.remove(&target) {
            t.texture.destroy();
        }
        if self.bound == Some(target) {
            self.bound = None;
        }
        for unit in self.units.iter_mut() {
            if *unit == Some(target) {
                *unit = None;
            }
        }
    }

    fn target_size(&self, target: TargetHandle) -> Option<(u32, u32)> {
        self.targets.get(&target).map(|t| (t.width, t.height))
    }

    fn bind_target(&mut self, target: Option<TargetHandle>) {
        self.bound = target;
    }

    fn bound_target(&self) -> Option<TargetHandle> {
        self.bound
    }

    fn bind_texture(&mut self, unit: u32, target: TargetHandle) -> VfxResult<()> {
        if unit >= MAX_TEXTURE_UNITS {
            return Err(VfxError::invalid(format!("texture unit {} out of range", unit)));
        }
        self.target(target)?;
        self.units[unit as usize] = Some(target);
        Ok(())
    }

    fn unbind_texture(&mut self, unit: u32) {
        if let Some(slot) = self.units.get_mut(unit as usize) {
            *slot = None;
        }
    }

    fn set_blending(&mut self, blend: Option<BlendFunc>) {
        self.blend = blend;
    }

    fn blending(&self) -> Option<BlendFunc> {
        self.blend
    }

    fn draw_quad(&mut self, program: ProgramHandle) -> VfxResult<()> {
        let target = self
            .bound
            .ok_or_else(|| VfxError::invalid("draw with no render target bound"))?;
        if self.units.contains(&Some(target)) {
            return Err(VfxError::invalid(format!(
                "target {} is bound both as input and output",
                target.0
            )));
        }
        let dest = self.targets.get(&target).ok_or(VfxError::UnknownHandle {
            kind: "target",
            id: target.0,
        })?;
        let prog = self.programs.get_mut(&program).ok_or(VfxError::UnknownHandle {
            kind: "program",
            id: program.0,
        })?;

        let views: Vec<&wgpu::TextureView> = self
            .units
            .iter()
            .map(|unit| {
                unit.and_then(|t| self.targets.get(&t))
                    .map(|t| &t.view)
                    .unwrap_or(&self.fallback_view)
            })
            .collect();
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: prog.uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        for (unit, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + unit as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Pass Bind Group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        let pipeline = prog.pipeline(&self.device, &self.pipeline_layout, dest.format, self.blend);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pass Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pass Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dest.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1); // Full-screen triangle
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn write_pixels(&mut self, target: TargetHandle, pixels: &[RGBA]) -> VfxResult<()> {
        let t = self.target(target)?;
        if t.format != TextureFormat::Rgba8Unorm {
            return Err(VfxError::invalid(format!("pixel upload unsupported for {:?}", t.format)));
        }
        let expected = t.width as usize * t.height as usize;
        if pixels.len() != expected {
            return Err(VfxError::invalid(format!(
                "expected {} pixels for a {}x{} target, got {}",
                expected,
                t.width,
                t.height,
                pixels.len()
            )));
        }

        let data: Vec<u8> = pixels.iter().flat_map(|p| p.to_bytes()).collect();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &t.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(t.width * 4),
                rows_per_image: Some(t.height),
            },
            wgpu::Extent3d {
                width: t.width,
                height: t.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn read_pixels(&mut self, target: TargetHandle) -> VfxResult<Vec<RGBA>> {
        let t = self.target(target)?;
        if t.format != TextureFormat::Rgba8Unorm {
            return Err(VfxError::invalid(format!("pixel readback unsupported for {:?}", t.format)));
        }
        let tight_row = t.width * 4;
        let padded_row = align_row(tight_row);

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size: padded_row as wgpu::BufferAddress * t.height as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &t.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(t.height),
                },
            },
            wgpu::Extent3d {
                width: t.width,
                height: t.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| anyhow!("map_async callback channel dropped"))?
            .map_err(|e| anyhow!("readback mapping failed: {}", e))?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity(t.width as usize * t.height as usize);
        for row in data.chunks(padded_row as usize) {
            for px in row[..tight_row as usize].chunks_exact(4) {
                pixels.push(RGBA::from_bytes([px[0], px[1], px[2], px[3]]));
            }
        }
        drop(data);
        staging.unmap();
        Ok(pixels)
    }
}
