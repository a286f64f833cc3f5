//! Linked wgpu programs: shader module, uniform block and pipeline cache

use std::collections::HashMap;

use super::{BlendFactor, BlendFunc, MAX_TEXTURE_UNITS, ProgramSource, TextureFormat, UniformLocation};
use crate::error::{VfxError, VfxResult};
use crate::uniforms::{ParamDecl, UniformValue};

const SLOT_FLOATS: usize = 4;

/// Placement of declared uniforms inside the program's uniform block.
///
/// Every scalar or vector occupies one `vec4<f32>`; array slots occupy one
/// `vec4<f32>` per element up to their capacity.
#[derive(Debug, Clone)]
pub struct UniformLayout {
    decls: Vec<ParamDecl>,
    offsets: Vec<usize>,
    floats: usize,
}

impl UniformLayout {
    pub fn from_decls(program: &str, decls: &[ParamDecl]) -> VfxResult<Self> {
        let mut offsets = Vec::with_capacity(decls.len());
        let mut floats = 0;
        for decl in decls {
            if decl.stride > SLOT_FLOATS {
                return Err(VfxError::invalid(format!(
                    "'{}' in '{}': element stride {} does not fit a vec4",
                    decl.name, program, decl.stride
                )));
            }
            offsets.push(floats);
            floats += SLOT_FLOATS * if decl.is_array() { decl.capacity.max(1) } else { 1 };
        }
        Ok(Self {
            decls: decls.to_vec(),
            offsets,
            // Uniform bindings may not be empty.
            floats: floats.max(SLOT_FLOATS),
        })
    }

    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.decls
            .iter()
            .position(|d| d.name == name)
            .map(|idx| UniformLocation(idx as u32))
    }

    pub fn size_bytes(&self) -> u64 {
        (self.floats * std::mem::size_of::<f32>()) as u64
    }

    /// Writes `value` into the shadow block; returns the dirty float range
    pub fn write(&self, block: &mut [f32], location: UniformLocation, value: &UniformValue) -> VfxResult<std::ops::Range<usize>> {
        let idx = location.0 as usize;
        let decl = self
            .decls
            .get(idx)
            .ok_or_else(|| VfxError::invalid(format!("uniform location {} out of range", idx)))?;
        decl.check(value)?;

        let start = self.offsets[idx];
        let floats = value.as_floats();
        if decl.is_array() {
            let span = SLOT_FLOATS * decl.capacity.max(1);
            block[start..start + span].fill(0.0);
            for (i, element) in floats.chunks(decl.stride).enumerate() {
                let at = start + i * SLOT_FLOATS;
                block[at..at + element.len()].copy_from_slice(element);
            }
            Ok(start..start + span)
        } else {
            block[start..start + SLOT_FLOATS].fill(0.0);
            block[start..start + floats.len()].copy_from_slice(&floats);
            Ok(start..start + SLOT_FLOATS)
        }
    }
}

/// A compiled program plus the GPU state derived from it
pub struct WgpuProgram {
    pub name: String,
    pub layout: UniformLayout,
    pub module: wgpu::ShaderModule,
    pub uniform_buffer: wgpu::Buffer,
    pub shadow: Vec<f32>,
    pipelines: HashMap<(wgpu::TextureFormat, Option<BlendFunc>), wgpu::RenderPipeline>,
}

impl WgpuProgram {
    pub fn new(
        device: &wgpu::Device,
        source: &ProgramSource,
        module: wgpu::ShaderModule,
        layout: UniformLayout,
    ) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(format!("{} Uniforms", source.name).as_str()),
            size: layout.size_bytes(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow = vec![0.0; layout.floats];
        Self {
            name: source.name.clone(),
            layout,
            module,
            uniform_buffer,
            shadow,
            pipelines: HashMap::new(),
        }
    }

    /// Pipeline for a target format and blend state, built on first use
    pub fn pipeline(
        &mut self,
        device: &wgpu::Device,
        pipeline_layout: &wgpu::PipelineLayout,
        format: TextureFormat,
        blend: Option<BlendFunc>,
    ) -> &wgpu::RenderPipeline {
        let format = wgpu_format(format);
        let name = &self.name;
        let module = &self.module;
        self.pipelines.entry((format, blend)).or_insert_with(|| {
            log::debug!("building pipeline '{}' for {:?} blend={:?}", name, format, blend);
            build_pipeline(device, pipeline_layout, module, name, format, blend)
        })
    }
}

/// Full WGSL text of a program: vertex stage, injected defines, fragment stage
pub fn assemble_source(source: &ProgramSource) -> String {
    let mut text = String::with_capacity(source.vertex.len() + source.fragment.len() + 64);
    text.push_str(&source.vertex);
    text.push('\n');
    for define in &source.defines {
        text.push_str(&format!("const {} = {};\n", define.name, define.value));
    }
    text.push_str(&source.fragment);
    text
}

pub fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

fn wgpu_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

fn blend_state(blend: Option<BlendFunc>) -> wgpu::BlendState {
    match blend {
        None => wgpu::BlendState::REPLACE,
        Some(func) => {
            let component = wgpu::BlendComponent {
                src_factor: wgpu_factor(func.src),
                dst_factor: wgpu_factor(func.dst),
                operation: wgpu::BlendOperation::Add,
            };
            wgpu::BlendState {
                color: component,
                alpha: component,
            }
        }
    }
}

/// Layout shared by every program: uniforms, sampler, texture units
pub fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ];
    for unit in 0..MAX_TEXTURE_UNITS {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 2 + unit,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Pass Bind Group Layout"),
        entries: &entries,
    })
}

pub fn build_pipeline(
    device: &wgpu::Device,
    pipeline_layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    name: &str,
    format: wgpu::TextureFormat,
    blend: Option<BlendFunc>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(name),
        layout: Some(pipeline_layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[], // No vertex buffers - coords come from the vertex index
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend_state(blend)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_packs_one_vec4_per_slot() {
        let decls = [
            ParamDecl::array("u_points", 2, 3),
            ParamDecl::value("u_viewport"),
            ParamDecl::value("u_count"),
        ];
        let layout = UniformLayout::from_decls("p", &decls).unwrap();
        assert_eq!(layout.size_bytes(), 5 * 16);
        assert_eq!(layout.location("u_count"), Some(UniformLocation(2)));
        assert_eq!(layout.location("u_missing"), None);

        let mut block = vec![0.0; 20];
        let range = layout
            .write(&mut block, UniformLocation(0), &UniformValue::FloatArray(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        assert_eq!(range, 0..12);
        assert_eq!(&block[0..8], &[1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 0.0, 0.0]);

        layout.write(&mut block, UniformLocation(2), &UniformValue::Int(7)).unwrap();
        assert_eq!(block[16], 7.0);
    }

    #[test]
    fn test_empty_layout_still_has_a_block() {
        let layout = UniformLayout::from_decls("copy", &[]).unwrap();
        assert_eq!(layout.size_bytes(), 16);
    }

    #[test]
    fn test_defines_precede_fragment() {
        let source = ProgramSource::new("p", "// vert", "// frag").with_define("SUPPORT_ALPHA", "true");
        let text = assemble_source(&source);
        let define = text.find("const SUPPORT_ALPHA = true;").unwrap();
        assert!(define > text.find("// vert").unwrap());
        assert!(define < text.find("// frag").unwrap());
    }
}
